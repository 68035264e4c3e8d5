use super::ReportSink;
use crate::error::Result;
use crate::models::{Period, Transaction};
use crate::sync::SyncReport;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Writes reports to the application log.
pub struct LogSink;

fn log_unmatched(side: &str, transaction: &Transaction) {
    warn!(
        side,
        id = %transaction.id,
        amount = %transaction.amount,
        timestamp = %transaction.timestamp,
        description = %transaction.metadata.description,
        "Unmatched transaction"
    );
}

#[async_trait]
impl ReportSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, report: &SyncReport) -> Result<()> {
        for pair in report.matched() {
            debug!(
                bank = %pair.bank.id,
                pos = %pair.pos.id,
                amount = %pair.bank.amount,
                delta_secs = pair.time_delta_secs(),
                "Matched"
            );
        }
        for t in report.unmatched_bank() {
            log_unmatched("bank", t);
        }
        for t in report.unmatched_pos() {
            log_unmatched("pos", t);
        }

        let balance = report.balance_delta();
        if balance.significant {
            warn!(
                bank = %balance.bank_balance,
                pos = %balance.pos_balance,
                delta = %balance.signed_delta(),
                "Balances differ"
            );
        } else {
            info!(
                bank = %balance.bank_balance,
                pos = %balance.pos_balance,
                delta = %balance.signed_delta(),
                "Balances agree"
            );
        }

        let start = report.period_start();
        let end = report.period_end();
        let generated_at = report.generated_at();
        if report.has_discrepancies() {
            warn!(%start, %end, %generated_at, "{}", report.summary());
        } else {
            info!(%start, %end, %generated_at, "{}", report.summary());
        }

        Ok(())
    }

    async fn deliver_failure(&self, period: &Period, message: &str) -> Result<()> {
        error!(%period, error = message, "Reconciliation failed");
        Ok(())
    }
}
