use crate::domain::allocation::AllocationSet;
use crate::domain::payment::{
    AccountId, CasToken, EmployeeId, PaymentId, PaymentRecord, Period, ProofRef,
};
use crate::domain::ports::{
    AccountDirectory, FundingAccount, PaymentStore, RecordUpdate, VoucherStore,
};
use crate::error::{DisbursementError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    records: HashMap<PaymentId, PaymentRecord>,
    periods: HashMap<(EmployeeId, Period), PaymentId>,
    allocations: BTreeMap<(PaymentId, u64), AllocationSet>,
}

/// A thread-safe in-memory payment store.
///
/// Records, the (employee, period) index and allocation sets live behind a
/// single `RwLock`, so a compare-and-set sees and writes all three in one
/// critical section. Ideal for tests and single-run CLI use.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_if_absent(&self, record: PaymentRecord) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let key = (record.employee(), record.period());
        if tables.periods.contains_key(&key) {
            return Ok(false);
        }
        tables.periods.insert(key, record.id());
        tables.records.insert(record.id(), record);
        Ok(true)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.records.get(&id).cloned())
    }

    async fn find_by_period(
        &self,
        employee: EmployeeId,
        period: Period,
    ) -> Result<Option<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .periods
            .get(&(employee, period))
            .and_then(|id| tables.records.get(id))
            .cloned())
    }

    async fn list_period(&self, period: Period) -> Result<Vec<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .values()
            .filter(|r| r.period() == period)
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.records.values().cloned().collect())
    }

    async fn allocation(&self, id: PaymentId, generation: u64) -> Result<Option<AllocationSet>> {
        let tables = self.tables.read().await;
        Ok(tables.allocations.get(&(id, generation)).cloned())
    }

    async fn allocation_history(&self, id: PaymentId) -> Result<Vec<AllocationSet>> {
        let tables = self.tables.read().await;
        Ok(tables
            .allocations
            .range((id, 0)..=(id, u64::MAX))
            .map(|(_, set)| set.clone())
            .collect())
    }

    async fn compare_and_swap(&self, expected: CasToken, update: RecordUpdate) -> Result<()> {
        let mut tables = self.tables.write().await;
        let id = update.record.id();
        let current = tables
            .records
            .get(&id)
            .ok_or_else(|| DisbursementError::NotFound(format!("payment {id}")))?;

        if current.cas_token() != expected {
            return Err(DisbursementError::StaleState);
        }

        if let Some(set) = update.allocation {
            tables.allocations.insert((id, set.generation), set);
        }
        tables.records.insert(id, update.record);
        Ok(())
    }
}

/// Account master data held in memory, typically loaded from CSV.
#[derive(Default)]
pub struct InMemoryAccountDirectory {
    accounts: std::sync::RwLock<HashMap<AccountId, FundingAccount>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: FundingAccount) {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        accounts.insert(account.id.clone(), account);
    }

    pub fn len(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn account(&self, id: &AccountId) -> Result<Option<FundingAccount>> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(accounts.get(id).cloned())
    }
}

/// Keeps vouchers in memory under `v-<uuid>` references.
#[derive(Default)]
pub struct InMemoryVoucherStore {
    vouchers: std::sync::RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryVoucherStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, proof: &ProofRef) -> Option<Vec<u8>> {
        let vouchers = self.vouchers.read().unwrap_or_else(PoisonError::into_inner);
        vouchers.get(&proof.0).cloned()
    }
}

#[async_trait]
impl VoucherStore for InMemoryVoucherStore {
    async fn put(&self, voucher: Vec<u8>) -> Result<ProofRef> {
        let reference = format!("v-{}", Uuid::new_v4());
        let mut vouchers = self.vouchers.write().unwrap_or_else(PoisonError::into_inner);
        vouchers.insert(reference.clone(), voucher);
        Ok(ProofRef(reference))
    }

    async fn discard(&self, proof: &ProofRef) -> Result<()> {
        let mut vouchers = self.vouchers.write().unwrap_or_else(PoisonError::into_inner);
        vouchers.remove(&proof.0);
        Ok(())
    }
}
