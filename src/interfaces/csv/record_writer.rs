use crate::domain::payment::PaymentRecord;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Output row for one payment record.
#[derive(Debug, Serialize)]
struct RecordRow<'a> {
    employee: u32,
    period: String,
    amount: String,
    status: &'static str,
    allocation: &'static str,
    generation: u64,
    funding_account: Option<&'a str>,
    proof: Option<&'a str>,
}

impl<'a> From<&'a PaymentRecord> for RecordRow<'a> {
    fn from(record: &'a PaymentRecord) -> Self {
        Self {
            employee: record.employee().0,
            period: record.period().to_string(),
            amount: record.amount().to_string(),
            status: record.status().as_str(),
            allocation: record.allocation_status().as_str(),
            generation: record.allocation_generation(),
            funding_account: record.funding_account().map(|a| a.0.as_str()),
            proof: record.payment_proof().map(|p| p.0.as_str()),
        }
    }
}

/// Writes payment records as CSV, one row per record with a header line.
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_records<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a PaymentRecord>,
    {
        for record in records {
            self.writer.serialize(RecordRow::from(record))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
