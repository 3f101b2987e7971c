use crate::domain::allocation::AllocationSet;
use crate::domain::payment::{CasToken, EmployeeId, PaymentId, PaymentRecord, Period};
use crate::domain::ports::{PaymentStore, RecordUpdate};
use crate::error::{DisbursementError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for payment records, keyed by payment id.
pub const CF_RECORDS: &str = "records";
/// Column Family mapping (employee, year, month) to a payment id.
pub const CF_PERIODS: &str = "periods";
/// Column Family for allocation sets, keyed by (payment id, generation).
pub const CF_ALLOCATIONS: &str = "allocations";

/// A persistent payment store implementation using RocksDB.
///
/// Records, the period uniqueness index and allocation sets live in separate
/// Column Families. Every write goes through one `WriteBatch`, and a
/// process-wide write lock turns read-compare-write into a compare-and-set.
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
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_RECORDS, CF_PERIODS, CF_ALLOCATIONS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            DisbursementError::Storage(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let mode = IteratorMode::From(prefix, Direction::Forward);
        let mut items = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }
}

fn record_key(id: PaymentId) -> [u8; 16] {
    *id.0.as_bytes()
}

fn period_key(employee: EmployeeId, period: Period) -> Vec<u8> {
    let mut key = Vec::with_capacity(7);
    key.extend_from_slice(&employee.0.to_be_bytes());
    key.extend_from_slice(&period.year().to_be_bytes());
    key.push(period.month());
    key
}

fn allocation_key(id: PaymentId, generation: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(id.0.as_bytes());
    key.extend_from_slice(&generation.to_be_bytes());
    key
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert_if_absent(&self, record: PaymentRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let index_key = period_key(record.employee(), record.period());
        if self.db.get_pinned_cf(self.cf(CF_PERIODS)?, &index_key)?.is_some() {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_PERIODS)?, &index_key, record_key(record.id()));
        self.put(&mut batch, CF_RECORDS, &record_key(record.id()), &record)?;
        self.db.write(batch)?;
        Ok(true)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>> {
        self.read(CF_RECORDS, &record_key(id))
    }

    async fn find_by_period(
        &self,
        employee: EmployeeId,
        period: Period,
    ) -> Result<Option<PaymentRecord>> {
        let Some(id) = self
            .db
            .get_cf(self.cf(CF_PERIODS)?, period_key(employee, period))?
        else {
            return Ok(None);
        };
        self.read(CF_RECORDS, &id)
    }

    async fn list_period(&self, period: Period) -> Result<Vec<PaymentRecord>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.period() == period)
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<PaymentRecord>> {
        self.scan(CF_RECORDS, &[])
    }

    async fn allocation(&self, id: PaymentId, generation: u64) -> Result<Option<AllocationSet>> {
        self.read(CF_ALLOCATIONS, &allocation_key(id, generation))
    }

    async fn allocation_history(&self, id: PaymentId) -> Result<Vec<AllocationSet>> {
        self.scan(CF_ALLOCATIONS, id.0.as_bytes())
    }

    async fn compare_and_swap(&self, expected: CasToken, update: RecordUpdate) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let id = update.record.id();
        let current: PaymentRecord = self
            .read(CF_RECORDS, &record_key(id))?
            .ok_or_else(|| DisbursementError::NotFound(format!("payment {id}")))?;

        if current.cas_token() != expected {
            return Err(DisbursementError::StaleState);
        }

        let mut batch = WriteBatch::default();
        if let Some(set) = &update.allocation {
            self.put(&mut batch, CF_ALLOCATIONS, &allocation_key(id, set.generation), set)?;
        }
        self.put(&mut batch, CF_RECORDS, &record_key(id), &update.record)?;
        self.db.write(batch)?;
        Ok(())
    }
}
