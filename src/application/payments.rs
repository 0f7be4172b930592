use super::users::UserDirectory;
use crate::config::CheckoutConfig;
use crate::domain::authorization::Action;
use crate::domain::identity::Identity;
use crate::domain::payment::{Amount, CheckoutRequest, CheckoutSession, Funds, LedgerEntry};
use crate::domain::ports::{LedgerRepositoryRef, PaymentGatewayRef};
use crate::error::{Result, ServiceError};
use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use tracing::{debug, info, warn};

/// Outcome of a settlement confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The session was paid and a new ledger entry was appended.
    Recorded(LedgerEntry),
    /// The session's transaction was already in the ledger; nothing was written.
    AlreadyRecorded(LedgerEntry),
    /// The gateway does not report the session as paid yet.
    Pending,
}

/// Opens checkout sessions and records confirmed payments in the ledger.
#[derive(Clone)]
pub struct PaymentReconciler {
    gateway: PaymentGatewayRef,
    ledger: LedgerRepositoryRef,
    directory: UserDirectory,
    config: CheckoutConfig,
}

impl PaymentReconciler {
    pub fn new(
        gateway: PaymentGatewayRef,
        ledger: LedgerRepositoryRef,
        directory: UserDirectory,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            gateway,
            ledger,
            directory,
            config,
        }
    }

    /// Opens a checkout session for `amount` (major units) and returns the
    /// gateway's redirect target.
    pub async fn create_checkout(
        &self,
        identity: &Identity,
        amount: Decimal,
    ) -> Result<CheckoutSession> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::StartCheckout, None)?;
        let amount_minor = Amount::new(amount)?.to_minor()?;
        let request = CheckoutRequest {
            customer_email: identity.email().clone(),
            amount_minor,
            currency: self.config.currency.clone(),
            product_name: self.config.product_name.clone(),
            success_url: self.config.success_url.clone(),
            cancel_url: self.config.cancel_url.clone(),
        };
        let session = self
            .bounded(self.gateway.create_session(request))
            .await?;
        info!(
            session = %session.session_id,
            donor = %identity.email(),
            amount_minor,
            "Opened checkout session"
        );
        Ok(session)
    }

    /// Records the session's payment if the gateway reports it paid.
    ///
    /// Safe to call repeatedly: a transaction already in the ledger yields
    /// [`Settlement::AlreadyRecorded`] and no second entry.
    pub async fn confirm_settlement(
        &self,
        identity: &Identity,
        session_id: &str,
    ) -> Result<Settlement> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::ConfirmSettlement, None)?;
        if session_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Session id is required".to_string(),
            ));
        }
        let state = self
            .bounded(self.gateway.retrieve_session(session_id))
            .await?;

        let Some(entry) = state.settlement(Utc::now())? else {
            debug!(session = %session_id, status = ?state.payment_status, "Session not settled yet");
            return Ok(Settlement::Pending);
        };

        match self.ledger.append(entry.clone()).await {
            Ok(()) => {
                info!(
                    transaction = %entry.transaction_id,
                    donor = %entry.donor_email,
                    amount = %entry.amount.value(),
                    "Recorded settlement"
                );
                Ok(Settlement::Recorded(entry))
            }
            Err(ServiceError::DuplicateSettlement(transaction_id)) => {
                warn!(transaction = %transaction_id, "Settlement already recorded");
                let existing = self.ledger.find(&transaction_id).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("ledger entry {}", transaction_id))
                })?;
                Ok(Settlement::AlreadyRecorded(existing))
            }
            Err(e) => Err(e),
        }
    }

    /// All ledger entries, newest first. Admins only.
    pub async fn list_payments(&self, identity: &Identity) -> Result<Vec<LedgerEntry>> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::ListPayments, None)?;
        self.ledger.list().await
    }

    pub async fn total_funds(&self) -> Result<Funds> {
        self.ledger.total().await
    }

    /// Runs a gateway call under the configured timeout.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.gateway_timeout, call)
            .await
            .map_err(|_| ServiceError::Timeout("payment gateway"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Email;
    use crate::domain::payment::{PaymentStatus, SessionState};
    use crate::domain::ports::PaymentGateway;
    use crate::domain::user::Profile;
    use crate::infrastructure::gateway::InMemoryGateway;
    use crate::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryUserStore};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    fn identity(email: &str) -> Identity {
        Identity::new(Email::parse(email).unwrap())
    }

    fn reconciler(gateway: PaymentGatewayRef, config: CheckoutConfig) -> PaymentReconciler {
        PaymentReconciler::new(
            gateway,
            Arc::new(InMemoryLedgerStore::new()),
            UserDirectory::new(Arc::new(InMemoryUserStore::new())),
            config,
        )
    }

    #[tokio::test]
    async fn test_checkout_converts_to_minor_units() {
        let gateway = Arc::new(InMemoryGateway::new());
        let payments = reconciler(gateway.clone(), CheckoutConfig::default());
        let donor = identity("donor@example.com");

        let session = payments.create_checkout(&donor, dec!(12.345)).await.unwrap();
        assert!(session.url.contains(&session.session_id));

        let opened = gateway.request(&session.session_id).await.unwrap();
        assert_eq!(opened.amount_minor, 1234);
        assert_eq!(opened.customer_email, *donor.email());
        assert_eq!(opened.product_name, CheckoutConfig::default().product_name);
    }

    #[tokio::test]
    async fn test_checkout_rejects_non_positive_amounts() {
        let payments = reconciler(Arc::new(InMemoryGateway::new()), CheckoutConfig::default());
        let donor = identity("donor@example.com");
        for amount in [dec!(0), dec!(-5), dec!(0.001)] {
            assert!(matches!(
                payments.create_checkout(&donor, amount).await,
                Err(ServiceError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_checkout_rejects_amounts_beyond_minor_unit_range() {
        let gateway = Arc::new(InMemoryGateway::new());
        let payments = reconciler(gateway, CheckoutConfig::default());
        let donor = identity("donor@example.com");

        let outcome = tokio::spawn(async move {
            payments.create_checkout(&donor, Decimal::MAX).await
        })
        .await
        .unwrap();
        assert!(matches!(outcome, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_unpaid_session_writes_nothing() {
        let gateway = Arc::new(InMemoryGateway::new());
        let payments = reconciler(gateway, CheckoutConfig::default());
        let donor = identity("donor@example.com");
        let session = payments.create_checkout(&donor, dec!(5)).await.unwrap();

        let outcome = payments
            .confirm_settlement(&donor, &session.session_id)
            .await
            .unwrap();
        assert_eq!(outcome, Settlement::Pending);
        assert_eq!(payments.total_funds().await.unwrap(), Funds::ZERO);
    }

    #[tokio::test]
    async fn test_confirmation_is_idempotent() {
        let gateway = Arc::new(InMemoryGateway::new());
        let payments = reconciler(gateway.clone(), CheckoutConfig::default());
        let donor = identity("donor@example.com");
        let session = payments.create_checkout(&donor, dec!(20)).await.unwrap();
        gateway.mark_paid(&session.session_id, "pi_1").await.unwrap();

        let first = payments
            .confirm_settlement(&donor, &session.session_id)
            .await
            .unwrap();
        let entry = match first {
            Settlement::Recorded(entry) => entry,
            other => panic!("expected a new ledger entry, got {:?}", other),
        };
        assert_eq!(entry.amount.value(), dec!(20.00));

        let second = payments
            .confirm_settlement(&donor, &session.session_id)
            .await
            .unwrap();
        assert_eq!(second, Settlement::AlreadyRecorded(entry));
        assert_eq!(payments.total_funds().await.unwrap(), Funds(dec!(20.00)));
    }

    struct StalledGateway;

    #[async_trait]
    impl PaymentGateway for StalledGateway {
        async fn create_session(&self, _request: CheckoutRequest) -> Result<CheckoutSession> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(ServiceError::GatewayError("unreachable".to_string()))
        }

        async fn retrieve_session(&self, _session_id: &str) -> Result<SessionState> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SessionState {
                payment_status: PaymentStatus::Unpaid,
                customer_email: None,
                amount_total: None,
                payment_intent: None,
            })
        }
    }

    #[tokio::test]
    async fn test_gateway_timeout_is_retryable() {
        let config = CheckoutConfig {
            gateway_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let payments = reconciler(Arc::new(StalledGateway), config);
        let donor = identity("donor@example.com");

        let err = payments
            .confirm_settlement(&donor, "cs_missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_list_payments_is_admin_only() {
        let users = Arc::new(InMemoryUserStore::new());
        let directory = UserDirectory::new(users);
        let admin = identity("admin@example.com");
        directory
            .register(
                &admin,
                Profile {
                    name: "Admin".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let payments = PaymentReconciler::new(
            Arc::new(InMemoryGateway::new()),
            Arc::new(InMemoryLedgerStore::new()),
            directory.clone(),
            CheckoutConfig::default(),
        );

        assert!(matches!(
            payments.list_payments(&admin).await,
            Err(ServiceError::Forbidden(_))
        ));
        directory.bootstrap_admin(admin.email()).await.unwrap();
        assert!(payments.list_payments(&admin).await.unwrap().is_empty());
    }
}
