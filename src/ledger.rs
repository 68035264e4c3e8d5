use crate::error::{AppError, Result};
use crate::models::{Period, Source, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

/// A feed that reports transactions and a closing balance for one account.
///
/// Implementations return transactions already normalized: amounts negative
/// for outgoing money, timestamps in UTC.
#[async_trait]
pub trait LedgerSource {
    fn source(&self) -> Source;

    async fn fetch_transactions(&self, period: &Period) -> Result<Vec<Transaction>>;

    async fn fetch_balance(&self, period: &Period) -> Result<Decimal>;
}

/// Decides which fetched transactions take part in reconciliation.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    expenses_only: bool,
    /// Lowercased; matched as substrings of the description
    exclude_keywords: Vec<String>,
}

impl TransactionFilter {
    pub fn new(expenses_only: bool, exclude_keywords: &[String]) -> Self {
        Self {
            expenses_only,
            exclude_keywords: exclude_keywords
                .iter()
                .filter(|k| !k.is_empty())
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    pub fn accepts(&self, transaction: &Transaction) -> bool {
        if self.expenses_only && !transaction.is_expense() {
            return false;
        }

        let description = transaction.metadata.description.to_lowercase();
        !self
            .exclude_keywords
            .iter()
            .any(|keyword| description.contains(keyword.as_str()))
    }

    pub fn apply(&self, transactions: Vec<Transaction>) -> Vec<Transaction> {
        let fetched = transactions.len();
        let kept: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| self.accepts(t))
            .collect();

        debug!(
            fetched,
            kept = kept.len(),
            excluded = fetched - kept.len(),
            "Filtered transactions"
        );
        kept
    }
}

/// Interpret a feed's wall-clock time in `offset` and convert it to UTC.
pub fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> Result<DateTime<Utc>> {
    local
        .and_local_timezone(offset)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| AppError::InvalidInput(format!("ambiguous local time {}", local)))
}
