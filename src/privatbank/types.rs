use crate::error::{AppError, Result};
use crate::ledger::local_to_utc;
use crate::models::{Metadata, Source, Transaction};
use chrono::{FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;

const SUCCESS_STATUS: &str = "SUCCESS";
const DEBIT_TYPE: &str = "D";
// DAT_OD and TIM_P joined with a space
const DATE_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Fields shared by every paginated statements response.
#[derive(Debug, Deserialize)]
pub(super) struct Page {
    pub(super) status: String,
    #[serde(default)]
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) exist_next_page: bool,
    #[serde(default)]
    pub(super) next_page_id: Option<String>,
}

impl Page {
    pub(super) fn ensure_success(&self) -> Result<()> {
        if self.status == SUCCESS_STATUS {
            return Ok(());
        }
        Err(AppError::PrivatBank(format!(
            "request returned status {}: {}",
            self.status,
            self.message.as_deref().unwrap_or("no message")
        )))
    }

    /// Follow id for the next page, if the API says there is one
    pub(super) fn next_page(&self) -> Option<&str> {
        match (self.exist_next_page, self.next_page_id.as_deref()) {
            (true, Some(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

/// A statements response split into its page envelope and rows.
pub(super) trait Paged: DeserializeOwned {
    type Row;

    fn page(&self) -> &Page;

    fn into_rows(self) -> Vec<Self::Row>;
}

#[derive(Debug, Deserialize)]
pub(super) struct TransactionsResponse {
    #[serde(flatten)]
    pub(super) page: Page,
    #[serde(default)]
    pub(super) transactions: Vec<PrivatTransaction>,
}

impl Paged for TransactionsResponse {
    type Row = PrivatTransaction;

    fn page(&self) -> &Page {
        &self.page
    }

    fn into_rows(self) -> Vec<PrivatTransaction> {
        self.transactions
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct BalancesResponse {
    #[serde(flatten)]
    pub(super) page: Page,
    #[serde(default)]
    pub(super) balances: Vec<PrivatBalance>,
}

impl Paged for BalancesResponse {
    type Row = PrivatBalance;

    fn page(&self) -> &Page {
        &self.page
    }

    fn into_rows(self) -> Vec<PrivatBalance> {
        self.balances
    }
}

// https://api.privatbank.ua/#p24/orders (business statements API)
#[derive(Debug, Deserialize)]
pub struct PrivatTransaction {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    /// Operation date, `DD.MM.YYYY`
    #[serde(rename = "DAT_OD", default)]
    pub date: Option<String>,
    /// Operation time, `HH:MM`
    #[serde(rename = "TIM_P", default)]
    pub time: Option<String>,
    /// Unsigned amount, direction is in `TRANTYPE`
    #[serde(rename = "SUM", default)]
    pub sum: Option<String>,
    #[serde(rename = "CCY", default)]
    pub currency: Option<String>,
    #[serde(rename = "TRANTYPE", default)]
    pub transaction_type: Option<String>,
    #[serde(rename = "OSND", default)]
    pub description: String,
    #[serde(rename = "AUT_CNTR_NAM", default)]
    pub counterparty: Option<String>,
}

impl PrivatTransaction {
    pub fn into_transaction(self, offset: FixedOffset) -> Result<Transaction> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "PrivatBank transaction without ID: {:?}",
                    self.description
                ))
            })?;

        let (Some(date), Some(time)) = (self.date.as_deref(), self.time.as_deref()) else {
            return Err(AppError::InvalidInput(format!(
                "PrivatBank transaction {} has no DAT_OD/TIM_P",
                id
            )));
        };
        let local = NaiveDateTime::parse_from_str(&format!("{date} {time}"), DATE_TIME_FORMAT)
            .map_err(|e| {
                AppError::InvalidInput(format!(
                    "PrivatBank transaction {} has bad time {:?} {:?}: {}",
                    id, date, time, e
                ))
            })?;

        let sum = self.sum.as_deref().unwrap_or_default().trim();
        let amount: Decimal = sum.parse().map_err(|e| {
            AppError::InvalidInput(format!(
                "PrivatBank transaction {} has bad SUM {:?}: {}",
                id, sum, e
            ))
        })?;
        let amount = match self.transaction_type.as_deref() {
            Some(DEBIT_TYPE) => -amount.abs(),
            _ => amount.abs(),
        };

        Ok(Transaction {
            id,
            amount,
            timestamp: local_to_utc(local, offset)?,
            source: Source::Bank,
            currency: self.currency.filter(|c| !c.is_empty()),
            metadata: Metadata {
                description: self.description,
                counterparty: self.counterparty.filter(|c| !c.trim().is_empty()),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PrivatBalance {
    pub acc: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(rename = "balanceOut")]
    pub balance_out: String,
    /// Date of the balance, `DD.MM.YYYY HH:MM:SS`
    #[serde(default)]
    pub dpd: Option<String>,
}

impl PrivatBalance {
    pub fn closing_balance(&self) -> Result<Decimal> {
        self.balance_out.trim().parse().map_err(|e| {
            AppError::PrivatBank(format!(
                "bad balanceOut {:?} for {}: {}",
                self.balance_out, self.acc, e
            ))
        })
    }
}
