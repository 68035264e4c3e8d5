use super::types::{Envelope, PosterAccount, PosterTransaction};
use crate::config::{PosterConfig, SyncConfig};
use crate::error::{AppError, Result};
use crate::ledger::{LedgerSource, TransactionFilter};
use crate::models::{Period, Source, Transaction};
use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

const TRANSACTIONS_METHOD: &str = "finance.getTransactions";
const ACCOUNTS_METHOD: &str = "finance.getAccounts";
// dateFrom / dateTo query format
const QUERY_DATE_FORMAT: &str = "%Y%m%d";
// Poster transaction type for outgoing money
const EXPENSE_TYPE: &str = "0";

pub struct PosterClient {
    client: Client,
    api_base_url: String,
    token: String,
    account_id: i64,
    expenses_only: bool,
    offset: FixedOffset,
    filter: TransactionFilter,
}

impl PosterClient {
    pub fn new(config: &PosterConfig, sync: &SyncConfig) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(sync.http_timeout())
            .build()
            .map_err(|e| AppError::Poster(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url(),
            token: config.token.clone(),
            account_id: config.account_id,
            expenses_only: sync.expenses_only,
            offset: sync.utc_offset()?,
            filter: TransactionFilter::new(sync.expenses_only, &config.exclude_keywords),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.api_base_url, method);

        // The token travels in the query string, so keep the URL out of transport errors
        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Poster(format!(
                "Failed to call {}: {} - {}",
                method, status, body
            )));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| e.without_url())?;
        envelope.into_response(method)
    }

    /// The configured account, which holds both the balance and the currency.
    async fn account(&self) -> Result<PosterAccount> {
        let accounts: Vec<PosterAccount> = self.call(ACCOUNTS_METHOD, &[]).await?;
        let available = accounts.len();

        accounts
            .into_iter()
            .find(|a| a.account_id == self.account_id)
            .ok_or_else(|| {
                AppError::Poster(format!(
                    "Account {} not found among {} Poster accounts",
                    self.account_id, available
                ))
            })
    }
}

#[async_trait]
impl LedgerSource for PosterClient {
    fn source(&self) -> Source {
        Source::Pos
    }

    #[instrument(
        name = "Fetching Poster transactions",
        skip_all,
        fields(account_id = self.account_id)
    )]
    async fn fetch_transactions(&self, period: &Period) -> Result<Vec<Transaction>> {
        let (from, to) = period.local_dates(self.offset);
        let mut query = vec![
            ("dateFrom", from.format(QUERY_DATE_FORMAT).to_string()),
            ("dateTo", to.format(QUERY_DATE_FORMAT).to_string()),
            ("account_id", self.account_id.to_string()),
        ];
        if self.expenses_only {
            query.push(("type", EXPENSE_TYPE.to_string()));
        }

        let (account, rows) = tokio::try_join!(
            self.account(),
            self.call::<Vec<PosterTransaction>>(TRANSACTIONS_METHOD, &query),
        )?;
        let currency = account.currency();
        info!(count = rows.len(), currency, "Received Poster transactions");

        let transactions = rows
            .into_iter()
            .map(|row| row.into_transaction(self.offset, currency))
            .collect::<Result<Vec<_>>>()?;

        // Day-granular query; trim to the exact period
        let in_period: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| period.contains(t.timestamp))
            .collect();

        Ok(self.filter.apply(in_period))
    }

    #[instrument(name = "Fetching Poster balance", skip_all, fields(account_id = self.account_id))]
    async fn fetch_balance(&self, _period: &Period) -> Result<Decimal> {
        let account = self.account().await?;

        let balance = account.balance();
        info!(
            %balance,
            account = account.name.as_deref().unwrap_or_default(),
            "Fetched Poster balance"
        );

        Ok(balance)
    }
}
