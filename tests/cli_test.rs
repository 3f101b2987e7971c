mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const RECORDS_HEADER: &str =
    "employee,period,amount,status,allocation,generation,funding_account,proof";

#[test]
fn test_cli_generate() -> Result<(), Box<dyn std::error::Error>> {
    let amounts = common::amounts_file(&["7, 5000.00", "8, 4200.5", "9, "]);

    let mut cmd = Command::new(cargo_bin!("paydesk"));
    cmd.arg("generate")
        .arg("--period")
        .arg("2024-03")
        .arg(amounts.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(RECORDS_HEADER))
        .stdout(predicate::str::contains(
            "7,2024-03,5000.00,pending_employee_confirmation,none,0,,",
        ))
        .stdout(predicate::str::contains(
            "8,2024-03,4200.50,pending_employee_confirmation,none,0,,",
        ))
        // No amount for employee 9, so no record either
        .stdout(predicate::str::contains("\n9,").not())
        .stderr(predicate::str::contains("no payroll amount available"));

    Ok(())
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let amounts = common::amounts_file(&["7, 5000.00", "8, 4200.50"]);
    let accounts = common::accounts_file(&["ACC-CNY, CNY", "ACC-USDT, USDT"]);
    let actions = common::actions_file(&[
        "confirm, 7, employee, 7, 2024-03,",
        "request-allocation, 7, employee, 7, 2024-03, CNY:3000.00;USDT:1500.00@ACC-USDT",
        "approve-allocation, 100, finance, 7, 2024-03, 1",
        "approve, 100, finance, 7, 2024-03,",
        "transfer, 100, finance, 7, 2024-03, ACC-CNY",
        "confirm-payment, 100, finance, 7, 2024-03, v-0001",
        "confirm, 8, employee, 8, 2024-03,",
        "cancel, 100, finance, 8, 2024-03,",
    ]);

    let mut cmd = Command::new(cargo_bin!("paydesk"));
    cmd.arg("--accounts")
        .arg(accounts.path())
        .arg("apply")
        .arg(actions.path())
        .arg("--period")
        .arg("2024-03")
        .arg("--amounts")
        .arg(amounts.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(RECORDS_HEADER))
        .stdout(predicate::str::contains(
            "7,2024-03,5000.00,completed,approved,1,ACC-CNY,v-0001",
        ))
        .stdout(predicate::str::contains(
            "8,2024-03,4200.50,cancelled,none,0,,",
        ))
        .stderr(predicate::str::contains("action rejected").not());

    Ok(())
}

#[test]
fn test_cli_rejects_bad_period() {
    let amounts = common::amounts_file(&["7, 5000.00"]);

    let mut cmd = Command::new(cargo_bin!("paydesk"));
    cmd.arg("generate")
        .arg("--period")
        .arg("2024-13")
        .arg(amounts.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("month out of range"));
}
