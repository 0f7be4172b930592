//! Application layer containing the business operations.
//!
//! Each service is constructed explicitly from the ports it drives and is
//! cheap to clone. [`App`] wires them together for the lifetime of the
//! process and owns the shutdown path.

pub mod payments;
pub mod requests;
pub mod stats;
pub mod users;

use crate::config::CheckoutConfig;
use crate::domain::identity::Identity;
use crate::domain::ports::{
    IdentityProviderRef, LedgerRepositoryRef, PaymentGatewayRef, RequestRepositoryRef,
    UserRepositoryRef,
};
use crate::error::Result;
use crate::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryRequestStore, InMemoryUserStore};
use payments::PaymentReconciler;
use requests::DonationRequestService;
use stats::StatsAggregator;
use std::sync::Arc;
use tracing::info;
use users::UserDirectory;

/// The repositories backing an [`App`].
#[derive(Clone)]
pub struct Stores {
    pub users: UserRepositoryRef,
    pub requests: RequestRepositoryRef,
    pub ledger: LedgerRepositoryRef,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::new()),
            requests: Arc::new(InMemoryRequestStore::new()),
            ledger: Arc::new(InMemoryLedgerStore::new()),
        }
    }
}

pub struct App {
    pub users: UserDirectory,
    pub requests: DonationRequestService,
    pub payments: PaymentReconciler,
    pub stats: StatsAggregator,
    identity: IdentityProviderRef,
    stores: Stores,
}

impl App {
    pub fn new(
        stores: Stores,
        identity: IdentityProviderRef,
        gateway: PaymentGatewayRef,
        config: CheckoutConfig,
    ) -> Self {
        let users = UserDirectory::new(stores.users.clone());
        let requests = DonationRequestService::new(stores.requests.clone(), users.clone());
        let payments =
            PaymentReconciler::new(gateway, stores.ledger.clone(), users.clone(), config);
        let stats = StatsAggregator::new(users.clone(), requests.clone(), payments.clone());
        Self {
            users,
            requests,
            payments,
            stats,
            identity,
            stores,
        }
    }

    /// Resolves an access token into the caller's identity.
    pub async fn authenticate(&self, token: &str) -> Result<Identity> {
        self.identity.verify(token).await
    }

    /// Flushes every store. The app is unusable afterwards.
    pub async fn shutdown(self) -> Result<()> {
        self.stores.users.flush().await?;
        self.stores.requests.flush().await?;
        self.stores.ledger.flush().await?;
        info!("Stores flushed");
        Ok(())
    }
}
