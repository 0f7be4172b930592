pub mod ledger_writer;
pub mod request_writer;
pub mod user_reader;
