use super::identity::Email;
use crate::error::{Result, ServiceError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for RequestId {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ServiceError::ValidationError(format!("Invalid request id: {}", e)))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a donation request.
///
/// `Pending` is initial. `Done` and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Canceled,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "inprogress",
            Self::Done => "done",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Canceled)
                | (Self::InProgress, Self::Done)
                | (Self::InProgress, Self::Canceled)
        )
    }

    /// Validates `self -> next`, reporting an illegal move as a conflict.
    pub fn transition(&self, next: Self) -> Result<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else if self.is_terminal() {
            Err(ServiceError::Conflict(format!(
                "Request is already {} and cannot change status",
                self
            )))
        } else {
            Err(ServiceError::Conflict(format!(
                "Cannot move request from {} to {}",
                self, next
            )))
        }
    }
}

impl FromStr for DonationStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "inprogress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "canceled" => Ok(Self::Canceled),
            other => Err(ServiceError::ValidationError(format!(
                "Unknown donation status: {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied fields of a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetails {
    #[serde(rename = "bloodGroup")]
    pub blood_group: String,
    pub requester_district: String,
    pub requester_upazila: String,
    #[serde(rename = "hospitalName")]
    pub hospital_name: String,
    #[serde(rename = "fullAddress")]
    pub full_address: String,
    #[serde(rename = "donationDate")]
    pub donation_date: NaiveDate,
    #[serde(rename = "donationTime")]
    pub donation_time: NaiveTime,
    #[serde(rename = "requestMessage", default)]
    pub request_message: String,
}

impl RequestDetails {
    pub fn validate(&self) -> Result<()> {
        required("bloodGroup", &self.blood_group)?;
        required("requester_district", &self.requester_district)?;
        required("requester_upazila", &self.requester_upazila)?;
        required("hospitalName", &self.hospital_name)?;
        required("fullAddress", &self.full_address)
    }
}

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(ServiceError::ValidationError(format!(
            "{} is required",
            field
        )))
    } else {
        Ok(())
    }
}

/// Partial edit of a request's content; `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContentPatch {
    #[serde(rename = "bloodGroup")]
    pub blood_group: Option<String>,
    pub requester_district: Option<String>,
    pub requester_upazila: Option<String>,
    #[serde(rename = "hospitalName")]
    pub hospital_name: Option<String>,
    #[serde(rename = "fullAddress")]
    pub full_address: Option<String>,
    #[serde(rename = "donationDate")]
    pub donation_date: Option<NaiveDate>,
    #[serde(rename = "donationTime")]
    pub donation_time: Option<NaiveTime>,
    #[serde(rename = "requestMessage")]
    pub request_message: Option<String>,
}

impl ContentPatch {
    pub fn validate(&self) -> Result<()> {
        if *self == Self::default() {
            return Err(ServiceError::ValidationError(
                "Request update carries no fields".to_string(),
            ));
        }
        for (field, value) in [
            ("bloodGroup", &self.blood_group),
            ("requester_district", &self.requester_district),
            ("requester_upazila", &self.requester_upazila),
            ("hospitalName", &self.hospital_name),
            ("fullAddress", &self.full_address),
        ] {
            if let Some(value) = value {
                required(field, value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRequest {
    #[serde(rename = "_id")]
    pub id: RequestId,
    pub requester_email: Email,
    pub donation_status: DonationStatus,
    #[serde(flatten)]
    pub details: RequestDetails,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A single conditional mutation of a stored request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestChange {
    Content(ContentPatch),
    Status(DonationStatus),
}

impl DonationRequest {
    pub fn new(requester: Email, details: RequestDetails, now: DateTime<Utc>) -> Result<Self> {
        details.validate()?;
        Ok(Self {
            id: RequestId::generate(),
            requester_email: requester,
            donation_status: DonationStatus::Pending,
            details,
            created_at: now,
        })
    }

    pub fn apply(&mut self, change: RequestChange) {
        match change {
            RequestChange::Status(status) => self.donation_status = status,
            RequestChange::Content(patch) => {
                let details = &mut self.details;
                if let Some(v) = patch.blood_group {
                    details.blood_group = v;
                }
                if let Some(v) = patch.requester_district {
                    details.requester_district = v;
                }
                if let Some(v) = patch.requester_upazila {
                    details.requester_upazila = v;
                }
                if let Some(v) = patch.hospital_name {
                    details.hospital_name = v;
                }
                if let Some(v) = patch.full_address {
                    details.full_address = v;
                }
                if let Some(v) = patch.donation_date {
                    details.donation_date = v;
                }
                if let Some(v) = patch.donation_time {
                    details.donation_time = v;
                }
                if let Some(v) = patch.request_message {
                    details.request_message = v;
                }
            }
        }
    }
}

/// Conjunctive match over stored requests. `None` fields are unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestFilter {
    pub requester: Option<Email>,
    pub status: Option<DonationStatus>,
    pub blood_group: Option<String>,
    pub district: Option<String>,
    pub upazila: Option<String>,
}

impl RequestFilter {
    pub fn status(status: DonationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn matches(&self, request: &DonationRequest) -> bool {
        self.requester
            .as_ref()
            .is_none_or(|email| &request.requester_email == email)
            && self.status.is_none_or(|s| request.donation_status == s)
            && self
                .blood_group
                .as_deref()
                .is_none_or(|g| request.details.blood_group == g)
            && self
                .district
                .as_deref()
                .is_none_or(|d| request.details.requester_district == d)
            && self
                .upazila
                .as_deref()
                .is_none_or(|u| request.details.requester_upazila == u)
    }
}

/// Optional search criteria as they arrive from a query string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub blood_group: Option<String>,
    pub district: Option<String>,
    pub upazila: Option<String>,
}

impl SearchCriteria {
    /// Pending-only filter; blank criteria are treated as omitted.
    pub fn into_filter(self) -> RequestFilter {
        fn present(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        RequestFilter {
            requester: None,
            status: Some(DonationStatus::Pending),
            blood_group: present(self.blood_group),
            district: present(self.district),
            upazila: present(self.upazila),
        }
    }
}

/// Skip/limit window over a newest-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Window {
    pub const ALL: Self = Self {
        skip: 0,
        limit: None,
    };

    pub fn first(limit: usize) -> Self {
        Self {
            skip: 0,
            limit: Some(limit),
        }
    }

    /// Zero-based page of `size` items.
    pub fn page(page: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(ServiceError::ValidationError(
                "Page size must be positive".to_string(),
            ));
        }
        Ok(Self {
            skip: page.saturating_mul(size),
            limit: Some(size),
        })
    }

    pub fn apply<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        let items = items.skip(self.skip);
        match self.limit {
            Some(limit) => items.take(limit).collect(),
            None => items.collect(),
        }
    }
}

/// One page of the caller's requests plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPage {
    pub requests: Vec<DonationRequest>,
    pub total_request: u64,
}
