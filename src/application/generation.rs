use crate::domain::payment::{EmployeeId, PaymentRecord, Period};
use crate::domain::ports::{Clock, PaymentStoreRef, PayrollSource};
use crate::error::{DisbursementError, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    pub created: usize,
    /// Employees that already had a record for the period.
    pub existing: usize,
    /// Employees whose amount could not be obtained.
    pub skipped: Vec<EmployeeId>,
}

enum Outcome {
    Created,
    Existing,
    Unavailable,
    LookupFailed(DisbursementError),
}

/// Creates the period's payment records from precomputed payroll amounts.
///
/// Running it again for the same period only fills in employees that are
/// still missing a record.
pub struct GenerationJob {
    store: PaymentStoreRef,
    clock: Arc<dyn Clock>,
}

impl GenerationJob {
    pub fn new(store: PaymentStoreRef, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn generate(
        &self,
        period: Period,
        source: &dyn PayrollSource,
    ) -> Result<GenerationReport> {
        let employees = source.active_employees(period).await?;
        let mut report = GenerationReport::default();

        for employee in employees {
            match self.generate_one(employee, period, source).await? {
                Outcome::Created => report.created += 1,
                Outcome::Existing => report.existing += 1,
                Outcome::Unavailable => {
                    warn!(%employee, %period, "no payroll amount available, skipping");
                    report.skipped.push(employee);
                }
                Outcome::LookupFailed(e) => {
                    warn!(%employee, %period, error = %e, "payroll amount lookup failed, skipping");
                    report.skipped.push(employee);
                }
            }
        }

        info!(
            %period,
            created = report.created,
            existing = report.existing,
            skipped = report.skipped.len(),
            "generation finished"
        );
        Ok(report)
    }

    /// Store failures are returned as errors; only the payroll lookup is
    /// allowed to skip an employee.
    async fn generate_one(
        &self,
        employee: EmployeeId,
        period: Period,
        source: &dyn PayrollSource,
    ) -> Result<Outcome> {
        if self.store.find_by_period(employee, period).await?.is_some() {
            return Ok(Outcome::Existing);
        }
        let amount = match source.base_amount(employee, period).await {
            Ok(Some(amount)) => amount,
            Ok(None) => return Ok(Outcome::Unavailable),
            Err(e) => return Ok(Outcome::LookupFailed(e)),
        };

        let record = PaymentRecord::new(employee, period, amount, self.clock.now());
        if self.store.insert_if_absent(record).await? {
            Ok(Outcome::Created)
        } else {
            Ok(Outcome::Existing)
        }
    }
}
