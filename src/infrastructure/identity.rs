use crate::domain::identity::{Email, Identity};
use crate::domain::ports::IdentityProvider;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Verifies tokens against a fixed table of issued tokens.
#[derive(Default, Clone)]
pub struct StaticTokenProvider {
    tokens: Arc<RwLock<HashMap<String, Email>>>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self, token: impl Into<String>, email: Email) {
        self.tokens.write().await.insert(token.into(), email);
    }

    pub async fn revoke(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn verify(&self, token: &str) -> Result<Identity> {
        let tokens = self.tokens.read().await;
        tokens
            .get(token.trim())
            .cloned()
            .map(Identity::new)
            .ok_or_else(|| ServiceError::Unauthorized("invalid or expired token".to_string()))
    }
}

/// Accepts the token as the caller's email.
///
/// Only for local operator tooling, where whoever runs the binary is trusted.
#[derive(Default, Clone, Copy)]
pub struct OperatorIdentityProvider;

#[async_trait]
impl IdentityProvider for OperatorIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Identity> {
        Email::parse(token)
            .map(Identity::new)
            .map_err(|_| ServiceError::Unauthorized(format!("{:?} is not an email", token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_tokens() {
        let provider = StaticTokenProvider::new();
        provider
            .issue("tok-a", Email::parse("a@example.com").unwrap())
            .await;

        let identity = provider.verify("tok-a").await.unwrap();
        assert_eq!(identity.email().as_str(), "a@example.com");

        provider.revoke("tok-a").await;
        assert!(matches!(
            provider.verify("tok-a").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_operator_identity() {
        let identity = OperatorIdentityProvider.verify("Ops@Example.com").await.unwrap();
        assert_eq!(identity.email().as_str(), "ops@example.com");
        assert!(matches!(
            OperatorIdentityProvider.verify("ops").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
