use crate::domain::actor::Actor;
use crate::domain::allocation::{AllocationLine, AllocationSet, LineStatus, ProposedLine};
use crate::domain::money::Cents;
use crate::domain::payment::{AuditStamp, PaymentRecord};
use crate::error::{DisbursementError, Result};
use std::collections::HashSet;

/// Builds and decides allocation sets.
///
/// The ledger never touches the store. It turns a request or a decision into
/// the next `AllocationSet`, and the transition engine commits that set
/// together with the record.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocationLedger;

impl AllocationLedger {
    /// Validates `lines` against `record` and builds the set for `generation`.
    pub fn propose(
        &self,
        record: &PaymentRecord,
        generation: u64,
        lines: Vec<ProposedLine>,
        stamp: AuditStamp,
    ) -> Result<AllocationSet> {
        if lines.is_empty() {
            return Err(DisbursementError::InvalidAllocation(
                "at least one line is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut total = Cents::ZERO;
        for line in &lines {
            if !seen.insert(&line.currency) {
                return Err(DisbursementError::InvalidAllocation(format!(
                    "currency {} appears more than once",
                    line.currency
                )));
            }
            total = total.checked_add(line.amount).ok_or_else(|| {
                DisbursementError::InvalidAllocation("line amounts overflow".to_string())
            })?;
        }

        if total > record.amount() {
            return Err(DisbursementError::InvalidAllocation(format!(
                "lines total {total} exceeds payment amount {}",
                record.amount()
            )));
        }

        let lines = lines
            .into_iter()
            .map(|line| AllocationLine {
                currency: line.currency,
                amount: line.amount,
                funding_account: line.funding_account,
                status: LineStatus::Pending,
                requested_by: stamp.actor,
                approved_by: None,
            })
            .collect();

        Ok(AllocationSet {
            payment: record.id(),
            generation,
            lines,
            requested: stamp,
            decided: None,
        })
    }

    /// Decides every line of a pending set at once.
    pub fn decide(
        &self,
        mut set: AllocationSet,
        approve: bool,
        actor: &Actor,
        stamp: AuditStamp,
    ) -> Result<AllocationSet> {
        if !set.is_pending() {
            return Err(DisbursementError::NothingToApprove);
        }
        let status = if approve {
            LineStatus::Approved
        } else {
            LineStatus::Rejected
        };
        for line in &mut set.lines {
            line.status = status;
            line.approved_by = approve.then_some(actor.id);
        }
        set.decided = Some(stamp);
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::CurrencyCode;
    use crate::domain::payment::{EmployeeId, Period};
    use chrono::Utc;

    fn record() -> PaymentRecord {
        PaymentRecord::new(
            EmployeeId(7),
            Period::new(2024, 3).unwrap(),
            Cents::new(500000),
            Utc::now(),
        )
    }

    fn line(currency: &str, cents: u64) -> ProposedLine {
        ProposedLine::new(CurrencyCode::new(currency).unwrap(), Cents::new(cents))
    }

    fn stamp() -> AuditStamp {
        AuditStamp::new(&Actor::employee(7), Utc::now())
    }

    #[test]
    fn test_propose_within_total() {
        let record = record();
        let set = AllocationLedger
            .propose(
                &record,
                1,
                vec![line("CNY", 300000), line("USDT", 150000)],
                stamp(),
            )
            .unwrap();

        assert_eq!(set.generation, 1);
        assert_eq!(set.total(), Cents::new(450000));
        assert!(set.lines.iter().all(|l| l.status == LineStatus::Pending));
        assert!(set.is_pending());
    }

    #[test]
    fn test_propose_exactly_total_is_allowed() {
        let set = AllocationLedger
            .propose(&record(), 1, vec![line("CNY", 500000)], stamp())
            .unwrap();
        assert_eq!(set.total(), Cents::new(500000));
    }

    #[test]
    fn test_propose_over_total_fails() {
        let result = AllocationLedger.propose(
            &record(),
            1,
            vec![line("CNY", 400000), line("USDT", 200000)],
            stamp(),
        );
        assert!(matches!(result, Err(DisbursementError::InvalidAllocation(_))));
    }

    #[test]
    fn test_propose_rejects_duplicate_currency_and_empty() {
        let duplicate = AllocationLedger.propose(
            &record(),
            1,
            vec![line("CNY", 1), line("cny", 1)],
            stamp(),
        );
        assert!(matches!(duplicate, Err(DisbursementError::InvalidAllocation(_))));

        let empty = AllocationLedger.propose(&record(), 1, vec![], stamp());
        assert!(matches!(empty, Err(DisbursementError::InvalidAllocation(_))));
    }

    #[test]
    fn test_propose_overflow_is_invalid() {
        let result = AllocationLedger.propose(
            &record(),
            1,
            vec![line("CNY", u64::MAX), line("USDT", 1)],
            stamp(),
        );
        assert!(matches!(result, Err(DisbursementError::InvalidAllocation(_))));
    }

    #[test]
    fn test_decide_is_all_or_nothing() {
        let finance = Actor::finance(100);
        let set = AllocationLedger
            .propose(
                &record(),
                1,
                vec![line("CNY", 300000), line("USDT", 150000)],
                stamp(),
            )
            .unwrap();

        let approved = AllocationLedger
            .decide(set.clone(), true, &finance, stamp())
            .unwrap();
        assert!(approved.lines.iter().all(|l| l.status == LineStatus::Approved));
        assert!(approved.lines.iter().all(|l| l.approved_by == Some(100)));

        let rejected = AllocationLedger.decide(set, false, &finance, stamp()).unwrap();
        assert!(rejected.lines.iter().all(|l| l.status == LineStatus::Rejected));
        assert!(rejected.lines.iter().all(|l| l.approved_by.is_none()));

        let again = AllocationLedger.decide(approved, true, &finance, stamp());
        assert!(matches!(again, Err(DisbursementError::NothingToApprove)));
    }
}
