use super::types::{BalancesResponse, Paged, TransactionsResponse};
use crate::config::{PrivatBankConfig, SyncConfig};
use crate::error::{AppError, Result};
use crate::ledger::{LedgerSource, TransactionFilter};
use crate::models::{Period, Source, Transaction};
use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

const TRANSACTIONS_PATH: &str = "/api/statements/transactions";
const BALANCE_PATH: &str = "/api/statements/balance";
// startDate / endDate query format
const QUERY_DATE_FORMAT: &str = "%d-%m-%Y";

pub struct PrivatBankClient {
    client: Client,
    api_base_url: String,
    iban: String,
    masked_iban: String,
    page_limit: u32,
    offset: FixedOffset,
    filter: TransactionFilter,
}

impl PrivatBankClient {
    pub fn new(config: &PrivatBankConfig, sync: &SyncConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&config.token)
            .map_err(|e| AppError::Config(format!("Invalid PrivatBank token: {}", e)))?;
        token.set_sensitive(true);
        headers.insert("token", token);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=utf8"),
        );

        let client = reqwest::ClientBuilder::new()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(sync.http_timeout())
            .build()
            .map_err(|e| AppError::PrivatBank(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url(),
            iban: config.iban.clone(),
            masked_iban: config.masked_iban(),
            page_limit: config.page_limit,
            offset: sync.utc_offset()?,
            filter: TransactionFilter::new(sync.expenses_only, &[]),
        })
    }

    fn period_query(&self, period: &Period) -> Vec<(&'static str, String)> {
        let (from, to) = period.local_dates(self.offset);
        vec![
            ("acc", self.iban.clone()),
            ("startDate", from.format(QUERY_DATE_FORMAT).to_string()),
            ("endDate", to.format(QUERY_DATE_FORMAT).to_string()),
            ("limit", self.page_limit.to_string()),
        ]
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.api_base_url, path);

        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PrivatBank(format!(
                "Failed to fetch {}: {} - {}",
                path, status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Fetch every page of a statements endpoint, following `next_page_id`.
    async fn get_all_pages<T: Paged>(&self, path: &str, period: &Period) -> Result<Vec<T::Row>> {
        let mut rows = Vec::new();
        let mut follow_id: Option<String> = None;

        loop {
            let mut query = self.period_query(period);
            if let Some(id) = &follow_id {
                query.push(("followId", id.clone()));
            }

            let response: T = self.get(path, &query).await?;
            response.page().ensure_success()?;

            let next = response.page().next_page().map(str::to_string);
            rows.extend(response.into_rows());

            match next {
                Some(id) if follow_id.as_deref() == Some(id.as_str()) => {
                    return Err(AppError::PrivatBank(format!(
                        "Pagination did not advance past page {}",
                        id
                    )));
                }
                Some(id) => {
                    debug!(follow_id = %id, fetched = rows.len(), "Fetching next page");
                    follow_id = Some(id);
                }
                None => return Ok(rows),
            }
        }
    }
}

#[async_trait]
impl LedgerSource for PrivatBankClient {
    fn source(&self) -> Source {
        Source::Bank
    }

    #[instrument(
        name = "Fetching PrivatBank transactions",
        skip_all,
        fields(iban = %self.masked_iban)
    )]
    async fn fetch_transactions(&self, period: &Period) -> Result<Vec<Transaction>> {
        let rows = self
            .get_all_pages::<TransactionsResponse>(TRANSACTIONS_PATH, period)
            .await?;

        info!(count = rows.len(), "Received PrivatBank statement rows");

        let transactions = rows
            .into_iter()
            .map(|row| row.into_transaction(self.offset))
            .collect::<Result<Vec<_>>>()?;

        // Day-granular query; trim to the exact period
        let in_period: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| period.contains(t.timestamp))
            .collect();

        Ok(self.filter.apply(in_period))
    }

    #[instrument(name = "Fetching PrivatBank balance", skip_all, fields(iban = %self.masked_iban))]
    async fn fetch_balance(&self, period: &Period) -> Result<Decimal> {
        let balances = self
            .get_all_pages::<BalancesResponse>(BALANCE_PATH, period)
            .await?;

        // Entries come oldest first; the last one for our account is the period close
        let closing = balances
            .iter()
            .rev()
            .find(|b| b.acc == self.iban)
            .ok_or_else(|| {
                AppError::PrivatBank(format!("No balance reported for {}", self.masked_iban))
            })?;

        let balance = closing.closing_balance()?;
        info!(
            %balance,
            currency = closing.currency.as_deref().unwrap_or_default(),
            date = closing.dpd.as_deref().unwrap_or_default(),
            "Fetched PrivatBank balance"
        );

        Ok(balance)
    }
}
