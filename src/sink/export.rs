use super::ReportSink;
use crate::error::{AppError, Result};
use crate::models::{Period, Source};
use crate::sync::SyncReport;
use crate::sync::report::ReportEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

const HEADERS: [&str; 10] = [
    "Source",
    "Timestamp",
    "Amount",
    "Currency",
    "Description",
    "Counterparty",
    "ID",
    "Status",
    "Matched ID",
    "Delta Secs",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CsvRow<'a> {
    source: Source,
    timestamp: DateTime<Utc>,
    amount: Decimal,
    currency: Option<&'a str>,
    description: &'a str,
    counterparty: Option<&'a str>,
    #[serde(rename = "ID")]
    id: &'a str,
    status: &'static str,
    #[serde(rename = "Matched ID")]
    matched_id: Option<&'a str>,
    #[serde(rename = "Delta Secs")]
    delta_secs: Option<i64>,
}

impl<'a> From<ReportEntry<'a>> for CsvRow<'a> {
    fn from(entry: ReportEntry<'a>) -> Self {
        let t = entry.transaction;
        CsvRow {
            source: t.source,
            timestamp: t.timestamp,
            amount: t.amount,
            currency: t.currency.as_deref(),
            description: &t.metadata.description,
            counterparty: t.metadata.counterparty.as_deref(),
            id: &t.id,
            status: if entry.is_matched() {
                "matched"
            } else {
                "unmatched"
            },
            matched_id: entry.counterpart.map(|c| c.id.as_str()),
            delta_secs: entry.time_delta.map(|d| d.num_seconds()),
        }
    }
}

/// One row per transaction of both sides, bank first.
pub fn render_csv(report: &SyncReport) -> Result<Vec<u8>> {
    // Headers written by hand so an empty report still gets them
    // https://github.com/BurntSushi/rust-csv/issues/161
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    writer.write_record(HEADERS)?;

    for source in [Source::Bank, Source::Pos] {
        for entry in report.entries(source) {
            writer.serialize(CsvRow::from(entry))?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

/// Exports reports to a CSV file, overwriting it on every run.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ReportSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    #[instrument(name = "Writing CSV report", skip_all, fields(path = ?self.path))]
    async fn deliver(&self, report: &SyncReport) -> Result<()> {
        let data = render_csv(report)?;
        fs::write(&self.path, data)?;

        info!(
            rows = report.bank_count() + report.pos_count(),
            "CSV report written"
        );
        Ok(())
    }

    async fn deliver_failure(&self, _period: &Period, _message: &str) -> Result<()> {
        debug!(path = ?self.path, "No report to export");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::test_helpers::{bank_tx, mock_datetime, pos_tx};
    use crate::sync::report::test_helpers::{mock_balance, mock_pair, mock_period};
    use chrono::Duration;
    use rust_decimal::prelude::dec;

    fn read_rows(data: &[u8]) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(data)
            .records()
            .map(|r| r.unwrap().iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_render_csv() {
        let base = mock_datetime(2025, 5, 1);
        let bank = bank_tx("b1", dec!(-150.00), base);
        let mut pos = pos_tx("p1", dec!(-150.00), base + Duration::seconds(30));
        pos.metadata.description = "Молоко, 10 л".to_string();
        let stray = pos_tx("p2", dec!(-20.00), base + Duration::hours(1));

        let report = SyncReport::build(
            vec![mock_pair(bank, pos)],
            Vec::new(),
            vec![stray],
            mock_balance(dec!(100), dec!(100)),
            mock_period(),
        )
        .unwrap();

        let rows = read_rows(&render_csv(&report).unwrap());

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], HEADERS.map(String::from).to_vec());
        assert_eq!(rows[1][0], "Bank");
        assert_eq!(rows[1][2], "-150.00");
        assert_eq!(rows[1][3], "UAH");
        assert_eq!(rows[1][6], "b1");
        assert_eq!(rows[1][7], "matched");
        assert_eq!(rows[1][8], "p1");
        assert_eq!(rows[1][9], "30");
        assert_eq!(rows[2][0], "Pos");
        assert_eq!(rows[2][4], "Молоко, 10 л");
        assert_eq!(rows[2][8], "b1");
        assert_eq!(rows[3][6], "p2");
        assert_eq!(rows[3][7], "unmatched");
        assert_eq!(rows[3][8], "");
        assert_eq!(rows[3][9], "");
    }

    #[test]
    fn test_render_empty_report_has_headers() {
        let report = SyncReport::build(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            mock_balance(dec!(0), dec!(0)),
            mock_period(),
        )
        .unwrap();

        let rows = read_rows(&render_csv(&report).unwrap());

        assert_eq!(rows, vec![HEADERS.map(String::from).to_vec()]);
    }
}
