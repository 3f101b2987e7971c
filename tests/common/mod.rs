#![allow(dead_code)]

use rand::Rng;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const AMOUNTS_HEADER: &str = "employee, amount";
pub const ACTIONS_HEADER: &str = "action, actor, role, employee, period, arg";
pub const ACCOUNTS_HEADER: &str = "account, currency";

/// Writes `header` followed by `rows` into a fresh temporary CSV file.
pub fn csv_file(header: &str, rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{header}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}

pub fn amounts_file(rows: &[&str]) -> NamedTempFile {
    csv_file(AMOUNTS_HEADER, rows)
}

pub fn actions_file(rows: &[&str]) -> NamedTempFile {
    csv_file(ACTIONS_HEADER, rows)
}

pub fn accounts_file(rows: &[&str]) -> NamedTempFile {
    csv_file(ACCOUNTS_HEADER, rows)
}

/// Payroll file for employees `1..=employees` with random whole-cent amounts.
pub fn generate_payroll_csv(path: &Path, employees: u32) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    let mut rng = rand::thread_rng();

    wtr.write_record(["employee", "amount"])?;
    for employee in 1..=employees {
        let cents: u64 = rng.gen_range(100_000..=2_000_000);
        wtr.write_record([
            employee.to_string(),
            format!("{}.{:02}", cents / 100, cents % 100),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
