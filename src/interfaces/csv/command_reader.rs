use crate::application::desk::{Command, Instruction};
use crate::domain::actor::{Action, Actor, Role};
use crate::domain::allocation::ProposedLine;
use crate::domain::money::{Cents, CurrencyCode};
use crate::domain::payment::{AccountId, EmployeeId, Period, ProofRef};
use crate::error::{DisbursementError, Result};
use serde::Deserialize;
use std::io::Read;

/// One line of an actions file:
/// `action, actor, role, employee, period, arg`.
///
/// `arg` carries the account for `transfer`, the voucher reference for
/// `confirm-payment`, the generation for allocation decisions, and the lines
/// for `request-allocation` as `CNY:3000.00;USDT:1500.00@ACC-USDT`.
#[derive(Debug, Deserialize, PartialEq)]
pub struct CommandRow {
    pub action: Action,
    pub actor: u32,
    pub role: Role,
    pub employee: u32,
    pub period: Period,
    pub arg: Option<String>,
}

impl TryFrom<CommandRow> for Instruction {
    type Error = DisbursementError;

    fn try_from(row: CommandRow) -> Result<Self> {
        let arg = row.arg.filter(|arg| !arg.is_empty());
        let required = |what: &str| {
            arg.clone().ok_or_else(|| {
                DisbursementError::Validation(format!("{} requires {what}", row.action))
            })
        };

        let command = match row.action {
            Action::Confirm => Command::Confirm,
            Action::Approve => Command::Approve,
            Action::Cancel => Command::Cancel,
            Action::Transfer => Command::Transfer(AccountId(required("an account")?)),
            Action::ConfirmPayment => {
                Command::ConfirmPayment(ProofRef(required("a proof reference")?))
            }
            Action::RequestAllocation => {
                Command::RequestAllocation(parse_lines(&required("allocation lines")?)?)
            }
            Action::ApproveAllocation => {
                Command::ApproveAllocation(parse_generation(&required("a generation")?)?)
            }
            Action::RejectAllocation => {
                Command::RejectAllocation(parse_generation(&required("a generation")?)?)
            }
        };

        Ok(Instruction {
            actor: Actor {
                id: row.actor,
                role: row.role,
            },
            employee: EmployeeId(row.employee),
            period: row.period,
            command,
        })
    }
}

fn parse_generation(text: &str) -> Result<u64> {
    text.parse().map_err(|_| {
        DisbursementError::Validation(format!("invalid allocation generation '{text}'"))
    })
}

/// Parses `CUR:amount[@account]` entries separated by `;`.
pub fn parse_lines(text: &str) -> Result<Vec<ProposedLine>> {
    text.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (currency, rest) = entry.split_once(':').ok_or_else(|| {
                DisbursementError::InvalidAllocation(format!("malformed line '{entry}'"))
            })?;
            let (amount, account) = match rest.split_once('@') {
                Some((amount, account)) => (amount, Some(AccountId(account.trim().to_string()))),
                None => (rest, None),
            };
            let amount: Cents = amount
                .parse()
                .map_err(|e| DisbursementError::InvalidAllocation(format!("{e}")))?;
            let mut line = ProposedLine::new(CurrencyCode::new(currency)?, amount);
            line.funding_account = account;
            Ok(line)
        })
        .collect()
}

/// Reads lifecycle instructions from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// and converts each row into an `Instruction` lazily.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and converts instructions.
    pub fn instructions(self) -> impl Iterator<Item = Result<Instruction>> {
        self.reader.into_deserialize::<CommandRow>().map(|result| {
            result
                .map_err(DisbursementError::from)
                .and_then(Instruction::try_from)
        })
    }
}
