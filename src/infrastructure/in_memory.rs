use crate::domain::identity::Email;
use crate::domain::payment::{Funds, LedgerEntry};
use crate::domain::ports::{LedgerRepository, RequestRepository, UserRepository};
use crate::domain::request::{DonationRequest, RequestChange, RequestFilter, RequestId, Window};
use crate::domain::user::{User, UserChange, UserStatus};
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for user accounts.
///
/// Uses `Arc<RwLock<BTreeMap<Email, User>>>` so listings come back in a
/// stable order. Ideal for testing or for running without persistence.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<BTreeMap<Email, User>>>,
}

impl InMemoryUserStore {
    /// Creates a new, empty in-memory user store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserStore {
    async fn insert(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(ServiceError::Conflict(format!(
                "user {} already exists",
                user.email
            )));
        }
        users.insert(user.email.clone(), user);
        Ok(())
    }

    async fn get(&self, email: &Email) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(email).cloned())
    }

    async fn list(&self, status: Option<UserStatus>) -> Result<Vec<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| status.is_none_or(|s| u.status == s))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        email: &Email,
        change: UserChange,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(email).map(|user| {
            user.apply(change, now);
            user.clone()
        }))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.users.read().await.len() as u64)
    }
}

#[derive(Default)]
struct RequestTable {
    next_seq: u64,
    /// Insertion sequence -> request.
    rows: BTreeMap<u64, DonationRequest>,
    index: HashMap<RequestId, u64>,
}

impl RequestTable {
    /// Matching rows, newest first; equal timestamps fall back to insertion order.
    fn newest_first<'a>(
        &'a self,
        filter: &'a RequestFilter,
    ) -> impl Iterator<Item = &'a DonationRequest> + 'a {
        let mut matching: Vec<(u64, &DonationRequest)> = self
            .rows
            .iter()
            .filter(|(_, r)| filter.matches(r))
            .map(|(seq, r)| (*seq, r))
            .collect();
        matching.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });
        matching.into_iter().map(|(_, r)| r)
    }
}

/// A thread-safe in-memory store for donation requests.
///
/// Every conditional write runs under the table's write lock, so the
/// precondition check and the mutation are one atomic step.
#[derive(Default, Clone)]
pub struct InMemoryRequestStore {
    table: Arc<RwLock<RequestTable>>,
}

impl InMemoryRequestStore {
    /// Creates a new, empty in-memory request store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestRepository for InMemoryRequestStore {
    async fn insert(&self, request: DonationRequest) -> Result<()> {
        let mut table = self.table.write().await;
        if table.index.contains_key(&request.id) {
            return Err(ServiceError::Conflict(format!(
                "donation request {} already exists",
                request.id
            )));
        }
        let seq = table.next_seq;
        table.next_seq += 1;
        table.index.insert(request.id, seq);
        table.rows.insert(seq, request);
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<DonationRequest>> {
        let table = self.table.read().await;
        Ok(table
            .index
            .get(&id)
            .and_then(|seq| table.rows.get(seq))
            .cloned())
    }

    async fn find(&self, filter: &RequestFilter, window: Window) -> Result<Vec<DonationRequest>> {
        let table = self.table.read().await;
        Ok(window.apply(table.newest_first(filter).cloned()))
    }

    async fn count(&self, filter: &RequestFilter) -> Result<u64> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn update_where(
        &self,
        id: RequestId,
        precondition: &RequestFilter,
        change: RequestChange,
    ) -> Result<bool> {
        let mut table = self.table.write().await;
        let Some(seq) = table.index.get(&id).copied() else {
            return Ok(false);
        };
        match table.rows.get_mut(&seq) {
            Some(request) if precondition.matches(request) => {
                request.apply(change);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: RequestId) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.index.remove(&id) {
            Some(seq) => Ok(table.rows.remove(&seq).is_some()),
            None => Ok(false),
        }
    }
}

#[derive(Default)]
struct Ledger {
    /// Append order.
    entries: Vec<LedgerEntry>,
    by_transaction: HashMap<String, usize>,
}

/// A thread-safe, append-only in-memory ledger with a uniqueness constraint
/// on transaction ids.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        if ledger.by_transaction.contains_key(&entry.transaction_id) {
            return Err(ServiceError::DuplicateSettlement(entry.transaction_id));
        }
        let position = ledger.entries.len();
        ledger
            .by_transaction
            .insert(entry.transaction_id.clone(), position);
        ledger.entries.push(entry);
        Ok(())
    }

    async fn find(&self, transaction_id: &str) -> Result<Option<LedgerEntry>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .by_transaction
            .get(transaction_id)
            .and_then(|i| ledger.entries.get(*i))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<LedgerEntry>> {
        let ledger = self.ledger.read().await;
        let mut entries: Vec<(usize, &LedgerEntry)> = ledger.entries.iter().enumerate().collect();
        entries.sort_by(|(a_pos, a), (b_pos, b)| b.paid_at.cmp(&a.paid_at).then(b_pos.cmp(a_pos)));
        Ok(entries.into_iter().map(|(_, e)| e.clone()).collect())
    }

    async fn total(&self) -> Result<Funds> {
        let ledger = self.ledger.read().await;
        Ok(ledger.entries.iter().map(|e| Funds::from(e.amount)).sum())
    }
}
