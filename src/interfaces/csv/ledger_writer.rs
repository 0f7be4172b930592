use crate::domain::payment::LedgerEntry;
use crate::error::Result;
use std::io::Write;

/// Writes ledger entries as CSV with the header
/// `transaction_id,donor_email,amount,paid_at`.
pub struct LedgerWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_entries(&mut self, entries: impl IntoIterator<Item = LedgerEntry>) -> Result<()> {
        self.writer
            .write_record(["transaction_id", "donor_email", "amount", "paid_at"])?;
        for entry in entries {
            self.writer.write_record([
                entry.transaction_id.as_str(),
                entry.donor_email.as_str(),
                entry.amount.value().normalize().to_string().as_str(),
                entry.paid_at.to_rfc3339().as_str(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Email;
    use crate::domain::payment::Amount;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_entries() {
        let mut out = Vec::new();
        LedgerWriter::new(&mut out)
            .write_entries([LedgerEntry {
                donor_email: Email::parse("d@example.com").unwrap(),
                amount: Amount::new(dec!(25.50)).unwrap(),
                transaction_id: "pi_1".to_string(),
                paid_at: Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap(),
            }])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "transaction_id,donor_email,amount,paid_at\n\
             pi_1,d@example.com,25.5,2026-10-01T12:00:00+00:00\n"
        );
    }

    #[test]
    fn test_write_empty_ledger_has_header_only() {
        let mut out = Vec::new();
        LedgerWriter::new(&mut out).write_entries([]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "transaction_id,donor_email,amount,paid_at\n"
        );
    }
}
