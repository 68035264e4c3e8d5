use crate::error::{AppError, Result};
use crate::models::{Source, Transaction};
use chrono::Duration;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument};

/// A bank transaction and the POS transaction recorded for the same payment.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub bank: Transaction,
    pub pos: Transaction,
    /// Absolute difference between the two timestamps
    pub time_delta: Duration,
}

impl MatchedPair {
    pub fn time_delta_secs(&self) -> i64 {
        self.time_delta.num_seconds()
    }
}

/// Partition of both inputs into pairs and leftovers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedPair>,
    pub unmatched_bank: Vec<Transaction>,
    pub unmatched_pos: Vec<Transaction>,
}

#[derive(Debug)]
struct Candidate {
    bank: usize,
    pos: usize,
    delta: Duration,
}

/// Pairs bank and POS transactions with identical amounts whose timestamps
/// are at most `time_tolerance` apart.
///
/// Matching is greedy and one-to-one. Within each amount group every
/// in-tolerance (bank, pos) candidate is ranked by time delta, then bank id,
/// then POS id, then input position, and accepted in that order unless one
/// side is already taken. Groups are visited in ascending amount order, so
/// identical inputs always produce identical output.
///
/// Unmatched transactions keep their input order; pairs are ordered by bank
/// timestamp, then bank id.
#[instrument(name = "Matching transactions", skip_all, fields(bank = bank.len(), pos = pos.len()))]
pub fn match_transactions(
    bank: Vec<Transaction>,
    pos: Vec<Transaction>,
    time_tolerance: Duration,
) -> Result<MatchOutcome> {
    validate(&bank, &pos, time_tolerance)?;

    let accepted = select_pairs(&bank, &pos, time_tolerance);

    let mut bank_slots: Vec<Option<Transaction>> = bank.into_iter().map(Some).collect();
    let mut pos_slots: Vec<Option<Transaction>> = pos.into_iter().map(Some).collect();

    let mut matched = Vec::with_capacity(accepted.len());
    for candidate in accepted {
        // select_pairs never hands out an index twice
        if let (Some(bank), Some(pos)) = (
            bank_slots[candidate.bank].take(),
            pos_slots[candidate.pos].take(),
        ) {
            matched.push(MatchedPair {
                bank,
                pos,
                time_delta: candidate.delta,
            });
        }
    }
    matched.sort_by(|a, b| {
        a.bank
            .timestamp
            .cmp(&b.bank.timestamp)
            .then_with(|| a.bank.id.cmp(&b.bank.id))
    });

    let outcome = MatchOutcome {
        matched,
        unmatched_bank: bank_slots.into_iter().flatten().collect(),
        unmatched_pos: pos_slots.into_iter().flatten().collect(),
    };

    debug!(
        matched = outcome.matched.len(),
        unmatched_bank = outcome.unmatched_bank.len(),
        unmatched_pos = outcome.unmatched_pos.len(),
        "Matching finished"
    );

    Ok(outcome)
}

fn select_pairs(
    bank: &[Transaction],
    pos: &[Transaction],
    time_tolerance: Duration,
) -> Vec<Candidate> {
    // Group by exact amount. Decimal equality ignores scale, so 50 and 50.00 share a group.
    let mut by_amount: BTreeMap<Decimal, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (i, t) in bank.iter().enumerate() {
        by_amount.entry(t.amount).or_default().0.push(i);
    }
    for (j, t) in pos.iter().enumerate() {
        by_amount.entry(t.amount).or_default().1.push(j);
    }

    let mut matched_bank = vec![false; bank.len()];
    let mut matched_pos = vec![false; pos.len()];
    let mut accepted = Vec::new();

    for (amount, (bank_group, pos_group)) in &by_amount {
        if bank_group.is_empty() || pos_group.is_empty() {
            continue;
        }

        let mut candidates = window_candidates(bank, pos, bank_group, pos_group, time_tolerance);
        candidates.sort_by(|a, b| rank(bank, pos, a, b));

        for candidate in candidates {
            if matched_bank[candidate.bank] || matched_pos[candidate.pos] {
                continue;
            }
            matched_bank[candidate.bank] = true;
            matched_pos[candidate.pos] = true;

            debug!(
                %amount,
                bank_id = %bank[candidate.bank].id,
                pos_id = %pos[candidate.pos].id,
                delta_secs = candidate.delta.num_seconds(),
                "Matched"
            );
            accepted.push(candidate);
        }
    }

    accepted
}

/// In-tolerance (bank, pos) candidates of one amount group.
///
/// POS indices are sorted by timestamp so each bank transaction only looks at
/// the slice within `time_tolerance` of it, instead of the whole group.
fn window_candidates(
    bank: &[Transaction],
    pos: &[Transaction],
    bank_group: &[usize],
    pos_group: &[usize],
    time_tolerance: Duration,
) -> Vec<Candidate> {
    let mut by_time = pos_group.to_vec();
    by_time.sort_by_key(|&j| pos[j].timestamp);

    let mut candidates = Vec::new();
    for &i in bank_group {
        // Out of chrono's range means unbounded on that side
        let earliest = bank[i].timestamp.checked_sub_signed(time_tolerance);
        let latest = bank[i].timestamp.checked_add_signed(time_tolerance);
        let start = earliest.map_or(0, |earliest| {
            by_time.partition_point(|&j| pos[j].timestamp < earliest)
        });

        for &j in by_time[start..]
            .iter()
            .take_while(|&&j| latest.is_none_or(|latest| pos[j].timestamp <= latest))
        {
            candidates.push(Candidate {
                bank: i,
                pos: j,
                delta: bank[i].time_delta(&pos[j]),
            });
        }
    }

    candidates
}

/// Total order over candidates: closest in time first, then smaller ids, then input position.
fn rank(bank: &[Transaction], pos: &[Transaction], a: &Candidate, b: &Candidate) -> Ordering {
    a.delta
        .cmp(&b.delta)
        .then_with(|| bank[a.bank].id.cmp(&bank[b.bank].id))
        .then_with(|| pos[a.pos].id.cmp(&pos[b.pos].id))
        .then_with(|| a.bank.cmp(&b.bank))
        .then_with(|| a.pos.cmp(&b.pos))
}

fn validate(bank: &[Transaction], pos: &[Transaction], time_tolerance: Duration) -> Result<()> {
    if time_tolerance < Duration::zero() {
        return Err(AppError::InvalidInput(format!(
            "time tolerance must not be negative, got {}s",
            time_tolerance.num_seconds()
        )));
    }

    validate_side(bank, Source::Bank)?;
    validate_side(pos, Source::Pos)?;

    let mut currencies = bank.iter().chain(pos).filter_map(|t| {
        t.currency
            .as_deref()
            .map(|currency| (t, currency))
    });
    if let Some((_, expected)) = currencies.next() {
        if let Some((t, other)) = currencies.find(|(_, currency)| currency != &expected) {
            return Err(AppError::InvalidInput(format!(
                "{} transaction {} is in {} but the run is in {}",
                t.source, t.id, other, expected
            )));
        }
    }

    Ok(())
}

fn validate_side(transactions: &[Transaction], source: Source) -> Result<()> {
    let mut seen = HashSet::with_capacity(transactions.len());

    for t in transactions {
        if t.source != source {
            return Err(AppError::InvalidInput(format!(
                "{} transaction {} supplied as {}",
                t.source, t.id, source
            )));
        }
        if t.id.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "{} transaction without id at {}",
                source, t.timestamp
            )));
        }
        if !seen.insert(t.id.as_str()) {
            return Err(AppError::InvalidInput(format!(
                "duplicate {} transaction id {}",
                source, t.id
            )));
        }
    }

    Ok(())
}
