use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which feed a transaction was reported by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    Bank,
    Pos,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Bank => write!(f, "bank"),
            Source::Pos => write!(f, "pos"),
        }
    }
}

/// Pass-through fields carried for reporting only, never used for matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub description: String,
    pub counterparty: Option<String>,
}

/// A single normalized transaction from either feed.
///
/// Amounts are negative for money leaving the account and timestamps are
/// always UTC, whichever feed the transaction came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub source: Source,
    pub currency: Option<String>,
    pub metadata: Metadata,
}

impl Transaction {
    /// Absolute time between two transactions
    pub fn time_delta(&self, other: &Transaction) -> Duration {
        (self.timestamp - other.timestamp).abs()
    }

    pub fn is_expense(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn mock_datetime(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
    }

    pub(crate) fn mock_transaction(
        id: &str,
        amount: Decimal,
        source: Source,
        timestamp: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id: id.to_string(),
            amount,
            timestamp,
            source,
            currency: match source {
                Source::Bank => Some("UAH".to_string()),
                Source::Pos => None,
            },
            metadata: Metadata {
                description: format!("mock transaction: {id}"),
                counterparty: None,
            },
        }
    }

    pub(crate) fn bank_tx(id: &str, amount: Decimal, timestamp: DateTime<Utc>) -> Transaction {
        mock_transaction(id, amount, Source::Bank, timestamp)
    }

    pub(crate) fn pos_tx(id: &str, amount: Decimal, timestamp: DateTime<Utc>) -> Transaction {
        mock_transaction(id, amount, Source::Pos, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::{bank_tx, mock_datetime, pos_tx};
    use super::*;
    use rust_decimal::prelude::dec;

    #[test]
    fn test_time_delta_is_absolute() {
        let base = mock_datetime(2025, 5, 1);
        let earlier = bank_tx("b1", dec!(-10), base);
        let later = pos_tx("p1", dec!(-10), base + Duration::seconds(90));

        assert_eq!(earlier.time_delta(&later), Duration::seconds(90));
        assert_eq!(later.time_delta(&earlier), Duration::seconds(90));
    }

    #[test]
    fn test_is_expense() {
        let base = mock_datetime(2025, 5, 1);

        assert!(bank_tx("b1", dec!(-0.01), base).is_expense());
        assert!(!bank_tx("b2", dec!(12.00), base).is_expense());
        assert!(!bank_tx("b3", dec!(0), base).is_expense());
        assert!(!bank_tx("b4", dec!(-0.00), base).is_expense());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(Source::Bank.to_string(), "bank");
        assert_eq!(Source::Pos.to_string(), "pos");
    }
}
