use crate::domain::money::Cents;
use crate::domain::payment::{EmployeeId, Period};
use crate::domain::ports::PayrollSource;
use crate::error::{DisbursementError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// One line of a payroll amounts file: `employee, amount`.
///
/// The amount is kept as text so that a bad figure still identifies the
/// employee it belongs to.
#[derive(Debug, Deserialize, PartialEq)]
pub struct PayrollRow {
    pub employee: u32,
    pub amount: Option<String>,
}

/// Reads payroll amount rows from a CSV source.
pub struct PayrollReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PayrollReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rows(self) -> impl Iterator<Item = Result<PayrollRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(DisbursementError::from))
    }
}

/// A `PayrollSource` backed by a precomputed amounts file for one period.
///
/// Employees with a blank or unusable amount are still listed as active, so
/// the generation job reports them as skipped.
#[derive(Debug, Default)]
pub struct CsvPayrollSource {
    /// Employees in file order.
    employees: Vec<EmployeeId>,
    amounts: HashMap<EmployeeId, Option<Cents>>,
}

impl CsvPayrollSource {
    pub fn from_reader<R: Read>(source: R) -> Self {
        let mut employees = Vec::new();
        let mut amounts = HashMap::new();

        for row in PayrollReader::new(source).rows() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(error = %e, "unreadable payroll row");
                    continue;
                }
            };
            let employee = EmployeeId(row.employee);
            if amounts.contains_key(&employee) {
                warn!(%employee, "duplicate payroll row ignored");
                continue;
            }
            let amount = match row.amount.as_deref().map(str::parse::<Cents>) {
                Some(Ok(cents)) => Some(cents),
                Some(Err(e)) => {
                    warn!(%employee, error = %e, "unusable payroll amount");
                    None
                }
                None => None,
            };
            employees.push(employee);
            amounts.insert(employee, amount);
        }

        Self { employees, amounts }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

#[async_trait]
impl PayrollSource for CsvPayrollSource {
    async fn active_employees(&self, _period: Period) -> Result<Vec<EmployeeId>> {
        Ok(self.employees.clone())
    }

    async fn base_amount(&self, employee: EmployeeId, _period: Period) -> Result<Option<Cents>> {
        Ok(self.amounts.get(&employee).copied().flatten())
    }
}
