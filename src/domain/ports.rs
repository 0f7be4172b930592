use super::identity::{Email, Identity};
use super::payment::{CheckoutRequest, CheckoutSession, Funds, LedgerEntry, SessionState};
use super::request::{DonationRequest, RequestChange, RequestFilter, RequestId, Window};
use super::user::{User, UserChange, UserStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new account. Fails with `Conflict` if the email is taken.
    async fn insert(&self, user: User) -> Result<()>;
    async fn get(&self, email: &Email) -> Result<Option<User>>;
    async fn list(&self, status: Option<UserStatus>) -> Result<Vec<User>>;
    /// Applies `change` atomically. Returns `None` when no such account exists.
    async fn update(
        &self,
        email: &Email,
        change: UserChange,
        now: DateTime<Utc>,
    ) -> Result<Option<User>>;
    async fn count(&self) -> Result<u64>;
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn insert(&self, request: DonationRequest) -> Result<()>;
    async fn get(&self, id: RequestId) -> Result<Option<DonationRequest>>;
    /// Requests matching `filter`, newest first, cut to `window`.
    async fn find(&self, filter: &RequestFilter, window: Window) -> Result<Vec<DonationRequest>>;
    async fn count(&self, filter: &RequestFilter) -> Result<u64>;
    /// Applies `change` only if the request exists and still matches
    /// `precondition`, as one atomic step. Returns whether it was applied.
    async fn update_where(
        &self,
        id: RequestId,
        precondition: &RequestFilter,
        change: RequestChange,
    ) -> Result<bool>;
    /// Returns whether a request was removed.
    async fn delete(&self, id: RequestId) -> Result<bool>;
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Appends an entry. Fails with `DuplicateSettlement` if the transaction
    /// id is already recorded.
    async fn append(&self, entry: LedgerEntry) -> Result<()>;
    async fn find(&self, transaction_id: &str) -> Result<Option<LedgerEntry>>;
    /// All entries, newest first.
    async fn list(&self) -> Result<Vec<LedgerEntry>>;
    async fn total(&self) -> Result<Funds>;
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verifies an access token. Fails with `Unauthorized`.
    async fn verify(&self, token: &str) -> Result<Identity>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession>;
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionState>;
}

pub type UserRepositoryRef = Arc<dyn UserRepository>;
pub type RequestRepositoryRef = Arc<dyn RequestRepository>;
pub type LedgerRepositoryRef = Arc<dyn LedgerRepository>;
pub type IdentityProviderRef = Arc<dyn IdentityProvider>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
