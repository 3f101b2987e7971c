pub mod account_reader;
pub mod command_reader;
pub mod payroll_reader;
pub mod record_writer;
