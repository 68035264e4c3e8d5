use crate::error::{AppError, Result};
use crate::models::{Period, Source, Transaction};
use crate::sync::balance::BalanceDelta;
use crate::sync::reconcile::{MatchOutcome, MatchedPair};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Result of one reconciliation run.
///
/// Every input transaction is in exactly one of `matched`, `unmatched_bank`
/// or `unmatched_pos`. Built once, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    matched: Vec<MatchedPair>,
    unmatched_bank: Vec<Transaction>,
    unmatched_pos: Vec<Transaction>,
    balance_delta: BalanceDelta,
    period: Period,
    generated_at: DateTime<Utc>,
}

/// One transaction of a report with its reconciled counterpart, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportEntry<'a> {
    pub transaction: &'a Transaction,
    pub counterpart: Option<&'a Transaction>,
    pub time_delta: Option<Duration>,
}

impl ReportEntry<'_> {
    pub fn is_matched(&self) -> bool {
        self.counterpart.is_some()
    }
}

impl SyncReport {
    pub fn build(
        matched: Vec<MatchedPair>,
        unmatched_bank: Vec<Transaction>,
        unmatched_pos: Vec<Transaction>,
        balance_delta: BalanceDelta,
        period: Period,
    ) -> Result<Self> {
        check_partition(
            Source::Bank,
            matched.iter().map(|p| &p.bank).chain(&unmatched_bank),
        )?;
        check_partition(
            Source::Pos,
            matched.iter().map(|p| &p.pos).chain(&unmatched_pos),
        )?;

        Ok(Self {
            matched,
            unmatched_bank,
            unmatched_pos,
            balance_delta,
            period,
            generated_at: Utc::now(),
        })
    }

    pub fn from_outcome(
        outcome: MatchOutcome,
        balance_delta: BalanceDelta,
        period: Period,
    ) -> Result<Self> {
        Self::build(
            outcome.matched,
            outcome.unmatched_bank,
            outcome.unmatched_pos,
            balance_delta,
            period,
        )
    }

    pub fn matched(&self) -> &[MatchedPair] {
        &self.matched
    }

    pub fn unmatched_bank(&self) -> &[Transaction] {
        &self.unmatched_bank
    }

    pub fn unmatched_pos(&self) -> &[Transaction] {
        &self.unmatched_pos
    }

    pub fn balance_delta(&self) -> &BalanceDelta {
        &self.balance_delta
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn period_start(&self) -> DateTime<Utc> {
        self.period.start()
    }

    pub fn period_end(&self) -> DateTime<Utc> {
        self.period.end()
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn bank_count(&self) -> usize {
        self.matched.len() + self.unmatched_bank.len()
    }

    pub fn pos_count(&self) -> usize {
        self.matched.len() + self.unmatched_pos.len()
    }

    pub fn has_discrepancies(&self) -> bool {
        !self.unmatched_bank.is_empty()
            || !self.unmatched_pos.is_empty()
            || self.balance_delta.significant
    }

    /// All transactions of one side, matched or not, ordered by time then id
    pub fn entries(&self, source: Source) -> Vec<ReportEntry<'_>> {
        let unmatched = match source {
            Source::Bank => &self.unmatched_bank,
            Source::Pos => &self.unmatched_pos,
        };

        let mut entries: Vec<ReportEntry<'_>> = self
            .matched
            .iter()
            .map(|pair| {
                let (transaction, counterpart) = match source {
                    Source::Bank => (&pair.bank, &pair.pos),
                    Source::Pos => (&pair.pos, &pair.bank),
                };
                ReportEntry {
                    transaction,
                    counterpart: Some(counterpart),
                    time_delta: Some(pair.time_delta),
                }
            })
            .chain(unmatched.iter().map(|transaction| ReportEntry {
                transaction,
                counterpart: None,
                time_delta: None,
            }))
            .collect();

        entries.sort_by(|a, b| {
            a.transaction
                .timestamp
                .cmp(&b.transaction.timestamp)
                .then_with(|| a.transaction.id.cmp(&b.transaction.id))
        });
        entries
    }

    /// e.g. "3 matched, 1 unmatched on bank side, 0 unmatched on POS side, balance delta +5.00 (significant)"
    pub fn summary(&self) -> String {
        format!(
            "{} matched, {} unmatched on bank side, {} unmatched on POS side, balance delta {} ({})",
            self.matched.len(),
            self.unmatched_bank.len(),
            self.unmatched_pos.len(),
            self.balance_delta.signed_delta(),
            if self.balance_delta.significant {
                "significant"
            } else {
                "negligible"
            }
        )
    }
}

fn check_partition<'a>(
    source: Source,
    transactions: impl Iterator<Item = &'a Transaction>,
) -> Result<()> {
    let mut seen = HashSet::new();

    for t in transactions {
        if t.source != source {
            return Err(AppError::InvalidInput(format!(
                "{} transaction {} reported on the {} side",
                t.source, t.id, source
            )));
        }
        if !seen.insert(t.id.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "{} transaction {} appears more than once in the report",
                source, t.id
            )));
        }
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_helpers::{mock_balance, mock_pair, mock_period};
    use super::*;
    use crate::models::transaction::test_helpers::{bank_tx, mock_datetime, pos_tx};
    use rust_decimal::prelude::dec;

    fn mock_report() -> SyncReport {
        let base = mock_datetime(2025, 5, 1);
        SyncReport::build(
            vec![mock_pair(
                bank_tx("b1", dec!(-50), base),
                pos_tx("p1", dec!(-50), base + Duration::seconds(30)),
            )],
            vec![bank_tx("b2", dec!(-12), base + Duration::minutes(5))],
            vec![
                pos_tx("p3", dec!(-7), base + Duration::minutes(9)),
                pos_tx("p2", dec!(-8), base - Duration::minutes(9)),
            ],
            mock_balance(dec!(100.00), dec!(95.00)),
            mock_period(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_stamps_generated_at() {
        let before = Utc::now();
        let report = mock_report();
        let after = Utc::now();

        assert!(report.generated_at() >= before && report.generated_at() <= after);
        assert_eq!(report.period_start(), mock_period().start());
        assert_eq!(report.period_end(), mock_period().end());
    }

    #[test]
    fn test_counts() {
        let report = mock_report();

        assert_eq!(report.matched().len(), 1);
        assert_eq!(report.bank_count(), 2);
        assert_eq!(report.pos_count(), 3);
    }

    #[test]
    fn test_has_discrepancies() {
        assert!(mock_report().has_discrepancies());

        let base = mock_datetime(2025, 5, 1);
        let clean = SyncReport::build(
            vec![mock_pair(
                bank_tx("b1", dec!(-50), base),
                pos_tx("p1", dec!(-50), base),
            )],
            vec![],
            vec![],
            mock_balance(dec!(10.00), dec!(10.00)),
            mock_period(),
        )
        .unwrap();
        assert!(!clean.has_discrepancies());

        let balance_only = SyncReport::build(
            vec![],
            vec![],
            vec![],
            mock_balance(dec!(10.00), dec!(9.00)),
            mock_period(),
        )
        .unwrap();
        assert!(balance_only.has_discrepancies());
    }

    #[test]
    fn test_entries_include_both_matched_and_unmatched() {
        let report = mock_report();

        let pos_entries = report.entries(Source::Pos);
        let ids: Vec<&str> = pos_entries
            .iter()
            .map(|e| e.transaction.id.as_str())
            .collect();
        assert_eq!(ids, vec!["p2", "p1", "p3"]);

        let p1 = &pos_entries[1];
        assert!(p1.is_matched());
        assert_eq!(p1.counterpart.unwrap().id, "b1");
        assert_eq!(p1.time_delta, Some(Duration::seconds(30)));
        assert!(!pos_entries[0].is_matched());

        let bank_entries = report.entries(Source::Bank);
        assert_eq!(bank_entries.len(), report.bank_count());
        assert_eq!(bank_entries[0].counterpart.unwrap().id, "p1");
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            mock_report().summary(),
            "1 matched, 1 unmatched on bank side, 2 unmatched on POS side, balance delta +5.00 (significant)"
        );
    }

    #[test]
    fn test_build_rejects_transaction_in_two_places() {
        let base = mock_datetime(2025, 5, 1);
        let b1 = bank_tx("b1", dec!(-50), base);

        let result = SyncReport::build(
            vec![mock_pair(b1.clone(), pos_tx("p1", dec!(-50), base))],
            vec![b1],
            vec![],
            mock_balance(dec!(0), dec!(0)),
            mock_period(),
        );

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_build_rejects_wrong_side() {
        let base = mock_datetime(2025, 5, 1);

        let result = SyncReport::build(
            vec![],
            vec![],
            vec![bank_tx("b1", dec!(-1), base)],
            mock_balance(dec!(0), dec!(0)),
            mock_period(),
        );

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
