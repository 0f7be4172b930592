use super::payments::PaymentReconciler;
use super::requests::DonationRequestService;
use super::users::UserDirectory;
use crate::domain::authorization::Action;
use crate::domain::identity::Identity;
use crate::domain::payment::Funds;
use crate::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_users: u64,
    pub total_requests: u64,
    pub total_funds: Funds,
}

/// Read-only dashboard totals.
#[derive(Clone)]
pub struct StatsAggregator {
    directory: UserDirectory,
    requests: DonationRequestService,
    payments: PaymentReconciler,
}

impl StatsAggregator {
    pub fn new(
        directory: UserDirectory,
        requests: DonationRequestService,
        payments: PaymentReconciler,
    ) -> Self {
        Self {
            directory,
            requests,
            payments,
        }
    }

    pub async fn snapshot(&self, identity: &Identity) -> Result<Stats> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::ViewStats, None)?;
        let (total_users, total_requests, total_funds) = tokio::try_join!(
            self.directory.count(),
            self.requests.count(),
            self.payments.total_funds(),
        )?;
        Ok(Stats {
            total_users,
            total_requests,
            total_funds,
        })
    }
}
