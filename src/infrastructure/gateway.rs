use crate::domain::payment::{CheckoutRequest, CheckoutSession, PaymentStatus, SessionState};
use crate::domain::ports::PaymentGateway;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Session {
    request: CheckoutRequest,
    payment_intent: Option<String>,
}

/// An in-process stand-in for a hosted checkout provider.
///
/// Sessions start unpaid; [`InMemoryGateway::mark_paid`] plays the part of
/// the donor completing payment on the provider's page.
#[derive(Default, Clone)]
pub struct InMemoryGateway {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a session as paid under the given payment intent.
    pub async fn mark_paid(&self, session_id: &str, payment_intent: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| unknown_session(session_id))?;
        session.payment_intent = Some(payment_intent.to_string());
        Ok(())
    }

    /// The checkout parameters a session was opened with.
    pub async fn request(&self, session_id: &str) -> Option<CheckoutRequest> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|s| s.request.clone())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let session_id = format!("cs_{}", Uuid::new_v4().simple());
        let url = format!("https://checkout.invalid/pay/{}", session_id);
        self.sessions.write().await.insert(
            session_id.clone(),
            Session {
                request,
                payment_intent: None,
            },
        );
        Ok(CheckoutSession { session_id, url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionState> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| unknown_session(session_id))?;
        let state = match &session.payment_intent {
            Some(intent) => SessionState {
                payment_status: PaymentStatus::Paid,
                customer_email: Some(session.request.customer_email.to_string()),
                amount_total: Some(session.request.amount_minor),
                payment_intent: Some(intent.clone()),
            },
            None => SessionState {
                payment_status: PaymentStatus::Unpaid,
                customer_email: Some(session.request.customer_email.to_string()),
                amount_total: Some(session.request.amount_minor),
                payment_intent: None,
            },
        };
        Ok(state)
    }
}

fn unknown_session(session_id: &str) -> ServiceError {
    ServiceError::GatewayError(format!("unknown checkout session {}", session_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Email;

    fn checkout() -> CheckoutRequest {
        CheckoutRequest {
            customer_email: Email::parse("donor@example.com").unwrap(),
            amount_minor: 500,
            currency: "usd".to_string(),
            product_name: "Fund".to_string(),
            success_url: "http://localhost/ok".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let gateway = InMemoryGateway::new();
        let session = gateway.create_session(checkout()).await.unwrap();

        let state = gateway.retrieve_session(&session.session_id).await.unwrap();
        assert_eq!(state.payment_status, PaymentStatus::Unpaid);

        gateway.mark_paid(&session.session_id, "pi_9").await.unwrap();
        let state = gateway.retrieve_session(&session.session_id).await.unwrap();
        assert_eq!(state.payment_status, PaymentStatus::Paid);
        assert_eq!(state.amount_total, Some(500));
        assert_eq!(state.payment_intent.as_deref(), Some("pi_9"));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let gateway = InMemoryGateway::new();
        assert!(matches!(
            gateway.retrieve_session("cs_nope").await,
            Err(ServiceError::GatewayError(_))
        ));
        assert!(gateway.mark_paid("cs_nope", "pi").await.is_err());
    }
}
