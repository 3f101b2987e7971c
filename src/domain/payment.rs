use crate::domain::actor::Actor;
use crate::domain::money::Cents;
use crate::error::{DisbursementError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub Uuid);

impl PaymentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub u32);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payroll period, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: u16,
    month: u8,
}

impl Period {
    pub fn new(year: u16, month: u8) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(DisbursementError::Validation(format!(
                "month out of range: {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }
}

impl FromStr for Period {
    type Err = DisbursementError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid =
            || DisbursementError::Validation(format!("invalid period '{s}', expected YYYY-MM"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = DisbursementError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Treasury account identifier from the account master data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a stored payment voucher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofRef(pub String);

impl fmt::Display for ProofRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingEmployeeConfirmation,
    PendingFinanceApproval,
    PendingPayment,
    PendingPaymentConfirmation,
    Completed,
    Cancelled,
}

impl PaymentStatus {
    /// Position on the lifecycle backbone. `Cancelled` sorts after every
    /// status it can be reached from.
    pub fn rank(&self) -> u8 {
        match self {
            PaymentStatus::PendingEmployeeConfirmation => 0,
            PaymentStatus::PendingFinanceApproval => 1,
            PaymentStatus::PendingPayment => 2,
            PaymentStatus::PendingPaymentConfirmation => 3,
            PaymentStatus::Completed => 4,
            PaymentStatus::Cancelled => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::PendingEmployeeConfirmation => "pending_employee_confirmation",
            PaymentStatus::PendingFinanceApproval => "pending_finance_approval",
            PaymentStatus::PendingPayment => "pending_payment",
            PaymentStatus::PendingPaymentConfirmation => "pending_payment_confirmation",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    #[default]
    None,
    Requested,
    Approved,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::None => "none",
            AllocationStatus::Requested => "requested",
            AllocationStatus::Approved => "approved",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed a step and when.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct AuditStamp {
    pub actor: u32,
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    pub fn new(actor: &Actor, at: DateTime<Utc>) -> Self {
        Self { actor: actor.id, at }
    }
}

/// The part of a record that every guarded write compares against.
///
/// A write only lands if the stored record still carries the same token it
/// was read with.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CasToken {
    pub status: PaymentStatus,
    pub allocation_status: AllocationStatus,
    pub allocation_generation: u64,
}

/// One employee's payroll obligation for one period.
///
/// Fields are read through accessors. The only writers are the transition
/// methods below, which the engine calls on a private copy before committing
/// it with a compare-and-set.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRecord {
    id: PaymentId,
    employee: EmployeeId,
    period: Period,
    amount: Cents,
    status: PaymentStatus,
    allocation_status: AllocationStatus,
    allocation_generation: u64,
    funding_account: Option<AccountId>,
    payment_proof: Option<ProofRef>,
    created_at: DateTime<Utc>,
    employee_confirmed: Option<AuditStamp>,
    finance_approved: Option<AuditStamp>,
    transferred: Option<AuditStamp>,
    payment_confirmed: Option<AuditStamp>,
    cancelled: Option<AuditStamp>,
}

impl PaymentRecord {
    pub fn new(
        employee: EmployeeId,
        period: Period,
        amount: Cents,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::generate(),
            employee,
            period,
            amount,
            status: PaymentStatus::PendingEmployeeConfirmation,
            allocation_status: AllocationStatus::None,
            allocation_generation: 0,
            funding_account: None,
            payment_proof: None,
            created_at,
            employee_confirmed: None,
            finance_approved: None,
            transferred: None,
            payment_confirmed: None,
            cancelled: None,
        }
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn employee(&self) -> EmployeeId {
        self.employee
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn amount(&self) -> Cents {
        self.amount
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn allocation_status(&self) -> AllocationStatus {
        self.allocation_status
    }

    pub fn allocation_generation(&self) -> u64 {
        self.allocation_generation
    }

    pub fn funding_account(&self) -> Option<&AccountId> {
        self.funding_account.as_ref()
    }

    pub fn payment_proof(&self) -> Option<&ProofRef> {
        self.payment_proof.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn employee_confirmed(&self) -> Option<AuditStamp> {
        self.employee_confirmed
    }

    pub fn finance_approved(&self) -> Option<AuditStamp> {
        self.finance_approved
    }

    pub fn transferred(&self) -> Option<AuditStamp> {
        self.transferred
    }

    pub fn payment_confirmed(&self) -> Option<AuditStamp> {
        self.payment_confirmed
    }

    pub fn cancelled(&self) -> Option<AuditStamp> {
        self.cancelled
    }

    pub fn cas_token(&self) -> CasToken {
        CasToken {
            status: self.status,
            allocation_status: self.allocation_status,
            allocation_generation: self.allocation_generation,
        }
    }

    /// Latest moment anything was recorded against this payment.
    pub fn last_activity(&self) -> DateTime<Utc> {
        [
            self.employee_confirmed,
            self.finance_approved,
            self.transferred,
            self.payment_confirmed,
            self.cancelled,
        ]
        .into_iter()
        .flatten()
        .map(|stamp| stamp.at)
        .fold(self.created_at, |latest, at| latest.max(at))
    }

    pub(crate) fn confirm_by_employee(&mut self, stamp: AuditStamp) {
        self.status = PaymentStatus::PendingFinanceApproval;
        self.employee_confirmed = Some(stamp);
    }

    pub(crate) fn approve_by_finance(&mut self, stamp: AuditStamp) {
        self.status = PaymentStatus::PendingPayment;
        self.finance_approved = Some(stamp);
    }

    pub(crate) fn record_transfer(&mut self, account: AccountId, stamp: AuditStamp) {
        self.status = PaymentStatus::PendingPaymentConfirmation;
        self.funding_account = Some(account);
        self.transferred = Some(stamp);
    }

    pub(crate) fn confirm_payment(&mut self, proof: ProofRef, stamp: AuditStamp) {
        self.status = PaymentStatus::Completed;
        self.payment_proof = Some(proof);
        self.payment_confirmed = Some(stamp);
    }

    pub(crate) fn cancel(&mut self, stamp: AuditStamp) {
        self.status = PaymentStatus::Cancelled;
        self.cancelled = Some(stamp);
    }

    /// Opens a new allocation generation and returns its number.
    pub(crate) fn open_allocation(&mut self) -> u64 {
        self.allocation_generation += 1;
        self.allocation_status = AllocationStatus::Requested;
        self.allocation_generation
    }

    pub(crate) fn settle_allocation(&mut self, approved: bool) {
        self.allocation_status = if approved {
            AllocationStatus::Approved
        } else {
            AllocationStatus::None
        };
    }
}
