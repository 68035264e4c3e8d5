use crate::error::{AppError, Result};
use crate::ledger::local_to_utc;
use crate::models::{Metadata, Source, Transaction};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
// Amounts and balances are reported in kopecks
const MINOR_UNIT_SCALE: u32 = 2;

/// Poster wraps every payload in `response`, or reports `error` instead.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    #[serde(default = "Option::default")]
    pub(super) response: Option<T>,
    #[serde(default)]
    pub(super) error: Option<serde_json::Value>,
}

impl<T> Envelope<T> {
    pub(super) fn into_response(self, method: &str) -> Result<T> {
        if let Some(error) = self.error {
            return Err(AppError::Poster(format!("{} returned error: {}", method, error)));
        }
        self.response
            .ok_or_else(|| AppError::Poster(format!("{} returned no response", method)))
    }
}

// https://dev.joinposter.com/docs/v3/web/finance/getTransactions
#[derive(Debug, Deserialize)]
pub struct PosterTransaction {
    #[serde(deserialize_with = "int_or_string")]
    pub transaction_id: i64,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub date: Option<String>,
    /// Unix seconds, used when `date` is absent
    #[serde(default, deserialize_with = "opt_int_or_string")]
    pub date_create_timestamp: Option<i64>,
    /// Signed, in minor units
    #[serde(deserialize_with = "int_or_string")]
    pub amount: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

impl PosterTransaction {
    /// `currency` is the account's, since Poster rows carry none of their own.
    pub fn into_transaction(
        self,
        offset: FixedOffset,
        currency: Option<&str>,
    ) -> Result<Transaction> {
        let id = self.transaction_id.to_string();

        let timestamp = match (self.date.as_deref().map(str::trim), self.date_create_timestamp) {
            (Some(date), _) if !date.is_empty() => {
                let local = NaiveDateTime::parse_from_str(date, DATE_TIME_FORMAT).map_err(|e| {
                    AppError::InvalidInput(format!(
                        "Poster transaction {} has bad date {:?}: {}",
                        id, date, e
                    ))
                })?;
                local_to_utc(local, offset)?
            }
            (_, Some(seconds)) => DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Poster transaction {} has bad timestamp {}",
                    id, seconds
                ))
            })?,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "Poster transaction {} has no date",
                    id
                )));
            }
        };

        Ok(Transaction {
            id,
            amount: Decimal::new(self.amount, MINOR_UNIT_SCALE),
            timestamp,
            source: Source::Pos,
            currency: currency.map(str::to_string),
            metadata: Metadata {
                description: self.comment.unwrap_or_default(),
                counterparty: None,
            },
        })
    }
}

// https://dev.joinposter.com/docs/v3/web/finance/getAccounts
#[derive(Debug, Deserialize)]
pub struct PosterAccount {
    #[serde(deserialize_with = "int_or_string")]
    pub account_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    /// In minor units
    #[serde(deserialize_with = "int_or_string")]
    pub balance: i64,
    #[serde(default)]
    pub currency_code: Option<String>,
}

impl PosterAccount {
    pub fn balance(&self) -> Decimal {
        Decimal::new(self.balance, MINOR_UNIT_SCALE)
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Poster sends numbers as JSON numbers or as numeric strings depending on the endpoint.
#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

impl IntOrString {
    fn into_i64<E: serde::de::Error>(self) -> std::result::Result<i64, E> {
        match self {
            IntOrString::Int(v) => Ok(v),
            IntOrString::Str(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn int_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    IntOrString::deserialize(deserializer)?.into_i64()
}

fn opt_int_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<IntOrString>::deserialize(deserializer)? {
        Some(IntOrString::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => value.into_i64().map(Some),
        None => Ok(None),
    }
}
