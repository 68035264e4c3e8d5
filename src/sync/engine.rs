use crate::error::{AppError, Result};
use crate::ledger::LedgerSource;
use crate::models::{Period, Source};
use crate::sync::balance::compare_balances;
use crate::sync::reconcile::match_transactions;
use crate::sync::report::SyncReport;
use chrono::Duration;
use indicatif::ProgressStyle;
use rust_decimal::Decimal;
use std::future::Future;
use tracing::{Span, debug, info, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

// Transactions and balance from each of the two sources
const FETCH_STEPS: u64 = 4;

pub struct SyncEngine<B, P> {
    bank: B,
    pos: P,
    time_tolerance: Duration,
    balance_tolerance: Decimal,
}

async fn counted<T>(span: &Span, fetch: impl Future<Output = Result<T>>) -> Result<T> {
    let result = fetch.await;
    span.pb_inc(1);
    result
}

impl<B, P> SyncEngine<B, P>
where
    B: LedgerSource + Sync,
    P: LedgerSource + Sync,
{
    pub fn new(bank: B, pos: P, time_tolerance: Duration, balance_tolerance: Decimal) -> Self {
        Self {
            bank,
            pos,
            time_tolerance,
            balance_tolerance,
        }
    }

    /// Fetch both ledgers for `period` and reconcile them.
    ///
    /// Nothing is matched until both sources have returned everything; any
    /// fetch error ends the run without a report.
    #[instrument(name = "Reconciling", skip_all, fields(period = %period))]
    pub async fn run(&self, period: &Period) -> Result<SyncReport> {
        let sources = [
            (Source::Bank, self.bank.source()),
            (Source::Pos, self.pos.source()),
        ];
        for (expected, actual) in sources {
            if expected != actual {
                return Err(AppError::InvalidInput(format!(
                    "{} source configured where {} was expected",
                    actual, expected
                )));
            }
        }

        let span = Span::current();
        span.pb_set_style(
            &ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
            )
            .map_err(|e| AppError::Other(e.into()))?,
        );
        span.pb_set_length(FETCH_STEPS);
        span.pb_set_message("Fetching ledgers");

        let (bank_transactions, pos_transactions, bank_balance, pos_balance) = tokio::try_join!(
            counted(&span, self.bank.fetch_transactions(period)),
            counted(&span, self.pos.fetch_transactions(period)),
            counted(&span, self.bank.fetch_balance(period)),
            counted(&span, self.pos.fetch_balance(period)),
        )?;

        info!(
            bank = bank_transactions.len(),
            pos = pos_transactions.len(),
            %bank_balance,
            %pos_balance,
            "Fetched both ledgers"
        );
        span.pb_set_message("Matching");

        let outcome = match_transactions(bank_transactions, pos_transactions, self.time_tolerance)?;
        let balance_delta = compare_balances(bank_balance, pos_balance, self.balance_tolerance)?;
        let report = SyncReport::from_outcome(outcome, balance_delta, *period)?;

        debug!(summary = %report.summary(), "Report built");

        Ok(report)
    }
}
