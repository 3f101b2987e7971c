use crate::domain::money::CurrencyCode;
use crate::domain::payment::AccountId;
use crate::domain::ports::FundingAccount;
use crate::error::Result;
use crate::infrastructure::in_memory::InMemoryAccountDirectory;
use serde::Deserialize;
use std::io::Read;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct AccountRow {
    account: String,
    currency: CurrencyCode,
}

/// Loads `account, currency` rows into an in-memory directory.
///
/// Malformed rows are logged and left out.
pub fn read_accounts<R: Read>(source: R) -> Result<InMemoryAccountDirectory> {
    let directory = InMemoryAccountDirectory::new();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    for row in reader.into_deserialize::<AccountRow>() {
        match row {
            Ok(row) => directory.insert(FundingAccount {
                id: AccountId(row.account),
                currency: row.currency,
            }),
            Err(e) => warn!(error = %e, "unreadable account row"),
        }
    }
    Ok(directory)
}
