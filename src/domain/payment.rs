use super::identity::Email;
use crate::error::{Result, ServiceError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::iter::Sum;
use std::ops::Add;

/// A positive donation amount in major currency units.
///
/// Amounts keep two fractional digits; anything finer is truncated when the
/// amount is converted to minor units for the gateway.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(ServiceError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    /// Builds an amount from gateway minor units (cents).
    pub fn from_minor(minor: i64) -> Result<Self> {
        Self::new(Decimal::new(minor, 2))
    }

    /// Converts to minor units, truncating sub-cent fractions.
    ///
    /// Fails when nothing is left after truncation.
    pub fn to_minor(&self) -> Result<i64> {
        let too_large = || ServiceError::ValidationError("Amount is too large".to_string());
        let minor = self
            .0
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(too_large)?
            .trunc()
            .to_i64()
            .ok_or_else(too_large)?;
        if minor > 0 {
            Ok(minor)
        } else {
            Err(ServiceError::ValidationError(
                "Amount is smaller than the minimum chargeable unit".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

// Amounts travel as JSON numbers, not decimal strings.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = rust_decimal::serde::float::deserialize(deserializer)?;
        Self::new(value).map_err(de::Error::custom)
    }
}

/// Accumulated settled funds. Unlike [`Amount`] this may be zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Funds(#[serde(with = "rust_decimal::serde::float")] pub Decimal);

impl Funds {
    pub const ZERO: Self = Self(Decimal::ZERO);
}

impl From<Amount> for Funds {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Add for Funds {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Funds {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// An immutable record of one confirmed settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub donor_email: Email,
    pub amount: Amount,
    pub transaction_id: String,
    pub paid_at: DateTime<Utc>,
}

/// Parameters handed to the gateway to open a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_email: Email,
    pub amount_minor: i64,
    pub currency: String,
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A session opened by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

/// A session as reported back by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub payment_status: PaymentStatus,
    pub customer_email: Option<String>,
    pub amount_total: Option<i64>,
    pub payment_intent: Option<String>,
}

impl SessionState {
    /// Turns a paid session into a ledger entry.
    ///
    /// Returns `Ok(None)` when the session is not paid yet, and a gateway
    /// error when a paid session lacks the data a settlement needs.
    pub fn settlement(&self, paid_at: DateTime<Utc>) -> Result<Option<LedgerEntry>> {
        if self.payment_status != PaymentStatus::Paid {
            return Ok(None);
        }
        let email = self
            .customer_email
            .as_deref()
            .ok_or_else(|| gateway_error("paid session has no customer email"))?;
        let donor_email =
            Email::parse(email).map_err(|_| gateway_error("paid session has an invalid email"))?;
        let amount = self
            .amount_total
            .ok_or_else(|| gateway_error("paid session has no amount"))
            .and_then(|minor| {
                Amount::from_minor(minor)
                    .map_err(|_| gateway_error("paid session has a non-positive amount"))
            })?;
        let transaction_id = self
            .payment_intent
            .clone()
            .filter(|intent| !intent.trim().is_empty())
            .ok_or_else(|| gateway_error("paid session has no payment intent"))?;

        Ok(Some(LedgerEntry {
            donor_email,
            amount,
            transaction_id,
            paid_at,
        }))
    }
}

fn gateway_error(message: &str) -> ServiceError {
    ServiceError::GatewayError(message.to_string())
}
