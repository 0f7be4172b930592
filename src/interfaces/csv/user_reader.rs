use crate::domain::identity::Email;
use crate::domain::user::Profile;
use crate::error::{Result, ServiceError};
use serde::Deserialize;
use std::io::Read;

/// One row of a user import file.
#[derive(Debug, Deserialize)]
struct UserRecord {
    email: String,
    name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    blood_group: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    upazila: Option<String>,
}

impl UserRecord {
    fn into_registration(self) -> Result<(Email, Profile)> {
        let email = Email::parse(&self.email)?;
        if self.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "name missing for {}",
                email
            )));
        }
        Ok((
            email,
            Profile {
                name: self.name,
                phone: self.phone,
                blood_group: self.blood_group,
                district: self.district,
                sub_district: self.upazila,
                ..Default::default()
            },
        ))
    }
}

/// Reads account registrations from a CSV source.
///
/// Expects the header `email,name,phone,blood_group,district,upazila`; the
/// last four columns may be empty or absent.
pub struct UserReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> UserReader<R> {
    /// Creates a new `UserReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates rows.
    pub fn users(self) -> impl Iterator<Item = Result<(Email, Profile)>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map_err(ServiceError::from)
                .and_then(UserRecord::into_registration)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "email, name, phone, blood_group, district, upazila\n\
                    a@example.com, Alice, 0171, O+, Dhaka, Savar\n\
                    b@example.com, Bob,,,,";
        let results: Vec<Result<(Email, Profile)>> = UserReader::new(data.as_bytes()).users().collect();

        assert_eq!(results.len(), 2);
        let (email, profile) = results[0].as_ref().unwrap();
        assert_eq!(email.as_str(), "a@example.com");
        assert_eq!(profile.blood_group.as_deref(), Some("O+"));
        assert_eq!(profile.sub_district.as_deref(), Some("Savar"));

        let (_, bob) = results[1].as_ref().unwrap();
        assert_eq!(bob.name, "Bob");
        assert_eq!(bob.phone, None);
    }

    #[test]
    fn test_reader_malformed_rows() {
        let data = "email, name\nnot-an-email, Alice\nc@example.com,  ";
        let results: Vec<Result<(Email, Profile)>> = UserReader::new(data.as_bytes()).users().collect();

        assert!(matches!(results[0], Err(ServiceError::ValidationError(_))));
        assert!(results[1].is_err());
    }
}
