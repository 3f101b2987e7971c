use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use paydesk::application::desk::PayrollDesk;
use paydesk::domain::payment::Period;
use paydesk::domain::ports::{AccountDirectory, PaymentStoreRef};
use paydesk::infrastructure::in_memory::{InMemoryAccountDirectory, InMemoryPaymentStore};
use paydesk::interfaces::csv::account_reader::read_accounts;
use paydesk::interfaces::csv::command_reader::CommandReader;
use paydesk::interfaces::csv::payroll_reader::CsvPayrollSource;
use paydesk::interfaces::csv::record_writer::RecordWriter;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). Requires the `storage-rocksdb` feature.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Funding accounts CSV file (`account, currency`).
    #[arg(long, global = true)]
    accounts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the payment records of a period from a payroll amounts CSV file.
    Generate {
        #[arg(long)]
        period: Period,

        /// Payroll amounts CSV file (`employee, amount`)
        amounts: PathBuf,
    },
    /// Apply lifecycle actions from a CSV file and print the resulting records.
    Apply {
        /// Actions CSV file (`action, actor, role, employee, period, arg`)
        actions: PathBuf,

        /// Generate this period first from the given amounts file.
        #[arg(long, requires = "period")]
        amounts: Option<PathBuf>,

        #[arg(long)]
        period: Option<Period>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let store = open_store(cli.db_path.as_deref())?;
    let accounts: Arc<dyn AccountDirectory> = match &cli.accounts {
        Some(path) => Arc::new(read_accounts(File::open(path).into_diagnostic()?)?),
        None => Arc::new(InMemoryAccountDirectory::new()),
    };
    let desk = PayrollDesk::with_defaults(store, accounts);

    match cli.command {
        Command::Generate { period, amounts } => {
            generate(&desk, period, &amounts).await?;
        }
        Command::Apply {
            actions,
            amounts,
            period,
        } => {
            if let (Some(amounts), Some(period)) = (amounts, period) {
                generate(&desk, period, &amounts).await?;
            }
            apply(&desk, &actions).await?;
        }
    }

    // Output final state
    let records = desk.records().await?;
    let stdout = io::stdout();
    let mut writer = RecordWriter::new(stdout.lock());
    writer.write_records(&records)?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> Result<PaymentStoreRef> {
    use paydesk::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "opening persistent store");
            Ok(Arc::new(RocksDBStore::open(path)?))
        }
        None => Ok(Arc::new(InMemoryPaymentStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> Result<PaymentStoreRef> {
    if db_path.is_some() {
        warn!(
            "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is \
             not enabled; falling back to in-memory storage"
        );
    }
    Ok(Arc::new(InMemoryPaymentStore::new()))
}

async fn generate(desk: &PayrollDesk, period: Period, amounts: &Path) -> Result<()> {
    let source = CsvPayrollSource::from_path(amounts)?;
    let report = desk.generate(period, &source).await?;
    if !report.skipped.is_empty() {
        warn!(%period, skipped = ?report.skipped, "some employees have no payment record");
    }
    Ok(())
}

async fn apply(desk: &PayrollDesk, actions: &Path) -> Result<()> {
    let file = File::open(actions).into_diagnostic()?;
    for (line, instruction) in CommandReader::new(file).instructions().enumerate() {
        let instruction = match instruction {
            Ok(instruction) => instruction,
            Err(e) => {
                error!(line = line + 1, error = %e, "unreadable action row");
                continue;
            }
        };
        let employee = instruction.employee;
        let period = instruction.period;
        if let Err(e) = desk.execute(instruction).await {
            warn!(line = line + 1, %employee, %period, error = %e, "action rejected");
        }
    }
    Ok(())
}
