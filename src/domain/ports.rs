use super::actor::{Action, Actor};
use super::allocation::AllocationSet;
use super::money::{Cents, CurrencyCode};
use super::payment::{AccountId, CasToken, EmployeeId, PaymentId, PaymentRecord, Period, ProofRef};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A guarded write: the new record plus, when the allocation changed, the set
/// that becomes current. Both land together or not at all.
#[derive(Debug, Clone)]
pub struct RecordUpdate {
    pub record: PaymentRecord,
    pub allocation: Option<AllocationSet>,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a record unless one already exists for its employee and period.
    /// Returns `false` when the record was not inserted.
    async fn insert_if_absent(&self, record: PaymentRecord) -> Result<bool>;
    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>>;
    async fn find_by_period(
        &self,
        employee: EmployeeId,
        period: Period,
    ) -> Result<Option<PaymentRecord>>;
    async fn list_period(&self, period: Period) -> Result<Vec<PaymentRecord>>;
    async fn get_all(&self) -> Result<Vec<PaymentRecord>>;
    async fn allocation(&self, id: PaymentId, generation: u64) -> Result<Option<AllocationSet>>;
    async fn allocation_history(&self, id: PaymentId) -> Result<Vec<AllocationSet>>;
    /// Applies `update` only if the stored record still matches `expected`.
    /// Fails with `StaleState` otherwise.
    async fn compare_and_swap(&self, expected: CasToken, update: RecordUpdate) -> Result<()>;
}

pub type PaymentStoreRef = Arc<dyn PaymentStore>;

/// Identity/role provider consulted before every action.
pub trait AccessPolicy: Send + Sync {
    fn allows(&self, actor: &Actor, action: Action) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundingAccount {
    pub id: AccountId,
    pub currency: CurrencyCode,
}

/// Read-only account master data.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn account(&self, id: &AccountId) -> Result<Option<FundingAccount>>;
}

/// Stores payment vouchers and hands back an opaque reference.
#[async_trait]
pub trait VoucherStore: Send + Sync {
    async fn put(&self, voucher: Vec<u8>) -> Result<ProofRef>;
    /// Removes a voucher that no payment ended up referencing.
    async fn discard(&self, proof: &ProofRef) -> Result<()>;
}

/// Supplies precomputed base amounts for a payroll run.
#[async_trait]
pub trait PayrollSource: Send + Sync {
    async fn active_employees(&self, period: Period) -> Result<Vec<EmployeeId>>;
    /// `Ok(None)` means no figure is available for this employee.
    async fn base_amount(&self, employee: EmployeeId, period: Period) -> Result<Option<Cents>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
