use crate::domain::request::DonationRequest;
use crate::error::Result;
use std::io::Write;

/// Writes donation requests as CSV, one row per request.
pub struct RequestWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RequestWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_requests(
        &mut self,
        requests: impl IntoIterator<Item = DonationRequest>,
    ) -> Result<()> {
        self.writer.write_record([
            "id",
            "requester_email",
            "donation_status",
            "blood_group",
            "district",
            "upazila",
            "hospital",
            "donation_date",
            "donation_time",
            "created_at",
        ])?;
        for r in requests {
            self.writer.write_record([
                r.id.to_string().as_str(),
                r.requester_email.as_str(),
                r.donation_status.as_str(),
                r.details.blood_group.as_str(),
                r.details.requester_district.as_str(),
                r.details.requester_upazila.as_str(),
                r.details.hospital_name.as_str(),
                r.details.donation_date.to_string().as_str(),
                r.details.donation_time.format("%H:%M").to_string().as_str(),
                r.created_at.to_rfc3339().as_str(),
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
    use crate::domain::request::RequestDetails;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    #[test]
    fn test_write_requests() {
        let request = DonationRequest::new(
            Email::parse("r@example.com").unwrap(),
            RequestDetails {
                blood_group: "AB+".to_string(),
                requester_district: "Dhaka".to_string(),
                requester_upazila: "Gulshan".to_string(),
                hospital_name: "United, Gulshan".to_string(),
                full_address: "Road 71".to_string(),
                donation_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                donation_time: NaiveTime::from_hms_opt(16, 45, 0).unwrap(),
                request_message: String::new(),
            },
            Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap(),
        )
        .unwrap();
        let id = request.id;

        let mut out = Vec::new();
        RequestWriter::new(&mut out).write_requests([request]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        assert!(lines.next().unwrap().starts_with("id,requester_email,donation_status"));
        assert_eq!(
            lines.next().unwrap(),
            format!(
                "{},r@example.com,pending,AB+,Dhaka,Gulshan,\"United, Gulshan\",2026-10-18,16:45,2026-10-16T09:00:00+00:00",
                id
            )
        );
    }
}
