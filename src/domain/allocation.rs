use crate::domain::money::{Cents, CurrencyCode};
use crate::domain::payment::{AccountId, AuditStamp, PaymentId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    Pending,
    Approved,
    Rejected,
}

/// A split as proposed by the requesting actor, before it is recorded.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ProposedLine {
    pub currency: CurrencyCode,
    /// Share of the payment total, in reference-currency cents.
    pub amount: Cents,
    pub funding_account: Option<AccountId>,
}

impl ProposedLine {
    pub fn new(currency: CurrencyCode, amount: Cents) -> Self {
        Self {
            currency,
            amount,
            funding_account: None,
        }
    }

    pub fn with_account(mut self, account: AccountId) -> Self {
        self.funding_account = Some(account);
        self
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AllocationLine {
    pub currency: CurrencyCode,
    pub amount: Cents,
    pub funding_account: Option<AccountId>,
    pub status: LineStatus,
    pub requested_by: u32,
    pub approved_by: Option<u32>,
}

/// One generation of allocation lines for a payment.
///
/// A new request always produces a new set with the next generation number;
/// older sets stay in the store but are no longer current.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AllocationSet {
    pub payment: PaymentId,
    pub generation: u64,
    pub lines: Vec<AllocationLine>,
    pub requested: AuditStamp,
    pub decided: Option<AuditStamp>,
}

impl AllocationSet {
    pub fn total(&self) -> Cents {
        self.lines.iter().map(|line| line.amount).sum()
    }

    pub fn is_pending(&self) -> bool {
        self.decided.is_none()
    }

    pub fn matches_account(&self, account: &AccountId, currency: &CurrencyCode) -> bool {
        self.lines.iter().any(|line| {
            line.funding_account.as_ref() == Some(account) || &line.currency == currency
        })
    }
}
