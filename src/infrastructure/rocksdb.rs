use crate::domain::identity::Email;
use crate::domain::payment::{Funds, LedgerEntry};
use crate::domain::ports::{LedgerRepository, RequestRepository, UserRepository};
use crate::domain::request::{DonationRequest, RequestChange, RequestFilter, RequestId, Window};
use crate::domain::user::{User, UserChange, UserStatus};
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for user accounts, keyed by email.
pub const CF_USERS: &str = "users";
/// Column Family for donation requests, keyed by request id.
pub const CF_REQUESTS: &str = "requests";
/// Column Family for the settlement ledger, keyed by transaction id.
pub const CF_LEDGER: &str = "ledger";
/// Column Family for sequence counters.
pub const CF_META: &str = "meta";

const REQUEST_SEQ: &[u8] = b"request_seq";
const LEDGER_SEQ: &[u8] = b"ledger_seq";

/// A row plus its insertion sequence, used to break timestamp ties.
#[derive(Serialize, Deserialize)]
struct Sequenced<T> {
    seq: u64,
    row: T,
}

/// A persistent store implementation using RocksDB.
///
/// Handles users, donation requests, and the ledger in separate Column
/// Families. Read-modify-write operations (conditional updates, uniqueness
/// checks, sequence allocation) are serialised through a single write lock so
/// each is atomic with respect to other writers sharing this store.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_USERS, CF_REQUESTS, CF_LEDGER, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            ServiceError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &'static str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    /// Allocates the next value of a sequence into `batch`.
    fn next_seq(&self, batch: &mut WriteBatch, key: &[u8]) -> Result<u64> {
        let meta = self.cf(CF_META)?;
        let current = match self.db.get_pinned_cf(meta, key)? {
            Some(bytes) => {
                let raw = <[u8; 8]>::try_from(&bytes[..]).map_err(|_| {
                    ServiceError::InternalError(Box::new(std::io::Error::other(
                        "corrupt sequence counter",
                    )))
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        batch.put_cf(meta, key, (current + 1).to_be_bytes());
        Ok(current)
    }

    /// Requests matching `filter`, newest first.
    fn requests_newest_first(&self, filter: &RequestFilter) -> Result<Vec<DonationRequest>> {
        let mut rows: Vec<Sequenced<DonationRequest>> = self
            .scan::<Sequenced<DonationRequest>>(CF_REQUESTS)?
            .into_iter()
            .filter(|r| filter.matches(&r.row))
            .collect();
        rows.sort_by(|a, b| {
            b.row
                .created_at
                .cmp(&a.row.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(rows.into_iter().map(|r| r.row).collect())
    }
}

#[async_trait]
impl UserRepository for RocksDBStore {
    async fn insert(&self, user: User) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = user.email.as_str().as_bytes();
        if self.db.get_pinned_cf(self.cf(CF_USERS)?, key)?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "user {} already exists",
                user.email
            )));
        }
        self.db
            .put_cf(self.cf(CF_USERS)?, key, serde_json::to_vec(&user)?)?;
        Ok(())
    }

    async fn get(&self, email: &Email) -> Result<Option<User>> {
        self.read(CF_USERS, email.as_str().as_bytes())
    }

    async fn list(&self, status: Option<UserStatus>) -> Result<Vec<User>> {
        Ok(self
            .scan::<User>(CF_USERS)?
            .into_iter()
            .filter(|u| status.is_none_or(|s| u.status == s))
            .collect())
    }

    async fn update(
        &self,
        email: &Email,
        change: UserChange,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let _guard = self.write_lock.lock().await;
        let Some(mut user) = self.read::<User>(CF_USERS, email.as_str().as_bytes())? else {
            return Ok(None);
        };
        user.apply(change, now);
        self.db.put_cf(
            self.cf(CF_USERS)?,
            email.as_str().as_bytes(),
            serde_json::to_vec(&user)?,
        )?;
        Ok(Some(user))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self
            .db
            .iterator_cf(self.cf(CF_USERS)?, IteratorMode::Start)
            .count() as u64)
    }

    async fn flush(&self) -> Result<()> {
        self.db.flush_cf(self.cf(CF_USERS)?)?;
        Ok(())
    }
}

#[async_trait]
impl RequestRepository for RocksDBStore {
    async fn insert(&self, request: DonationRequest) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = request.id.0.as_bytes().to_vec();
        if self.db.get_pinned_cf(self.cf(CF_REQUESTS)?, &key)?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "donation request {} already exists",
                request.id
            )));
        }
        let mut batch = WriteBatch::default();
        let seq = self.next_seq(&mut batch, REQUEST_SEQ)?;
        let value = serde_json::to_vec(&Sequenced { seq, row: request })?;
        batch.put_cf(self.cf(CF_REQUESTS)?, key, value);
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<DonationRequest>> {
        Ok(self
            .read::<Sequenced<DonationRequest>>(CF_REQUESTS, id.0.as_bytes())?
            .map(|r| r.row))
    }

    async fn find(&self, filter: &RequestFilter, window: Window) -> Result<Vec<DonationRequest>> {
        Ok(window.apply(self.requests_newest_first(filter)?.into_iter()))
    }

    async fn count(&self, filter: &RequestFilter) -> Result<u64> {
        Ok(self
            .scan::<Sequenced<DonationRequest>>(CF_REQUESTS)?
            .iter()
            .filter(|r| filter.matches(&r.row))
            .count() as u64)
    }

    async fn update_where(
        &self,
        id: RequestId,
        precondition: &RequestFilter,
        change: RequestChange,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = id.0.as_bytes();
        let Some(mut stored) = self.read::<Sequenced<DonationRequest>>(CF_REQUESTS, key)? else {
            return Ok(false);
        };
        if !precondition.matches(&stored.row) {
            return Ok(false);
        }
        stored.row.apply(change);
        self.db
            .put_cf(self.cf(CF_REQUESTS)?, key, serde_json::to_vec(&stored)?)?;
        Ok(true)
    }

    async fn delete(&self, id: RequestId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_REQUESTS)?;
        let key = id.0.as_bytes();
        if self.db.get_pinned_cf(cf, key)?.is_none() {
            return Ok(false);
        }
        self.db.delete_cf(cf, key)?;
        Ok(true)
    }

    async fn flush(&self) -> Result<()> {
        self.db.flush_cf(self.cf(CF_REQUESTS)?)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerRepository for RocksDBStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = entry.transaction_id.as_bytes().to_vec();
        if self.db.get_pinned_cf(self.cf(CF_LEDGER)?, &key)?.is_some() {
            return Err(ServiceError::DuplicateSettlement(entry.transaction_id));
        }
        let mut batch = WriteBatch::default();
        let seq = self.next_seq(&mut batch, LEDGER_SEQ)?;
        let value = serde_json::to_vec(&Sequenced { seq, row: entry })?;
        batch.put_cf(self.cf(CF_LEDGER)?, key, value);
        self.db.write(batch)?;
        Ok(())
    }

    async fn find(&self, transaction_id: &str) -> Result<Option<LedgerEntry>> {
        Ok(self
            .read::<Sequenced<LedgerEntry>>(CF_LEDGER, transaction_id.as_bytes())?
            .map(|e| e.row))
    }

    async fn list(&self) -> Result<Vec<LedgerEntry>> {
        let mut rows = self.scan::<Sequenced<LedgerEntry>>(CF_LEDGER)?;
        rows.sort_by(|a, b| b.row.paid_at.cmp(&a.row.paid_at).then(b.seq.cmp(&a.seq)));
        Ok(rows.into_iter().map(|e| e.row).collect())
    }

    async fn total(&self) -> Result<Funds> {
        Ok(self
            .scan::<Sequenced<LedgerEntry>>(CF_LEDGER)?
            .into_iter()
            .map(|e| Funds::from(e.row.amount))
            .sum())
    }

    async fn flush(&self) -> Result<()> {
        self.db.flush_cf(self.cf(CF_LEDGER)?)?;
        self.db.flush_cf(self.cf(CF_META)?)?;
        Ok(())
    }
}
