mod export;
mod log;

use crate::error::{AppError, Result};
use crate::models::Period;
use crate::sync::SyncReport;
use async_trait::async_trait;
use tracing::error;

pub use export::CsvSink;
pub use log::LogSink;

/// Somewhere a finished report, or the reason there is none, is sent.
#[async_trait]
pub trait ReportSink {
    fn name(&self) -> &'static str;

    async fn deliver(&self, report: &SyncReport) -> Result<()>;

    async fn deliver_failure(&self, period: &Period, error: &str) -> Result<()>;
}

pub type BoxedSink = Box<dyn ReportSink + Send + Sync>;

/// Deliver to every sink even when some fail; fails if any did.
pub async fn deliver_all(sinks: &[BoxedSink], report: &SyncReport) -> Result<()> {
    let mut failed = Vec::new();

    for sink in sinks {
        if let Err(e) = sink.deliver(report).await {
            error!(sink = sink.name(), error = %e, "Failed to deliver report");
            failed.push(sink.name());
        }
    }

    delivery_result(&failed)
}

pub async fn deliver_failure_all(
    sinks: &[BoxedSink],
    period: &Period,
    message: &str,
) -> Result<()> {
    let mut failed = Vec::new();

    for sink in sinks {
        if let Err(e) = sink.deliver_failure(period, message).await {
            error!(sink = sink.name(), error = %e, "Failed to deliver failure notice");
            failed.push(sink.name());
        }
    }

    delivery_result(&failed)
}

fn delivery_result(failed: &[&str]) -> Result<()> {
    if failed.is_empty() {
        return Ok(());
    }
    Err(AppError::Other(anyhow::anyhow!(
        "delivery failed for: {}",
        failed.join(", ")
    )))
}
