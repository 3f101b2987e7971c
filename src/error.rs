use crate::domain::actor::Action;
use crate::domain::payment::PaymentStatus;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DisbursementError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: actor {actor} may not {action} this payment")]
    Forbidden { actor: u32, action: Action },
    #[error("cannot {action} a payment in status {status}: {reason}")]
    InvalidTransition {
        action: Action,
        status: PaymentStatus,
        reason: &'static str,
    },
    #[error("payment was modified concurrently; re-read and retry")]
    #[diagnostic(code(paydesk::stale_state))]
    StaleState,
    #[error("invalid allocation: {0}")]
    InvalidAllocation(String),
    #[error("no pending allocation request to decide")]
    NothingToApprove,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    #[diagnostic(code(paydesk::storage))]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for DisbursementError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}

impl From<serde_json::Error> for DisbursementError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, DisbursementError>;
