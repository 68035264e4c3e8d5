use crate::models::{Period, Source, Transaction};
use crate::sync::SyncReport;
use chrono::{DateTime, FixedOffset, Utc};

/// Telegram rejects messages over 4096 characters; leave room for Markdown.
pub const MAX_MESSAGE_CHARS: usize = 4000;

const RULE: &str = "--------------------";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

fn local_time(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp.with_timezone(&offset).format(TIME_FORMAT).to_string()
}

/// Drop the characters Telegram's legacy Markdown would treat as markup.
///
/// An unbalanced `[` opens a link and makes Telegram reject the whole message.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '[' | ']'))
        .collect()
}

fn header(icon: &str, period: &Period, offset: FixedOffset) -> String {
    format!(
        "{} *Reconciliation report: {} to {}*",
        icon,
        local_time(period.start(), offset),
        local_time(period.end(), offset)
    )
}

fn transaction_line(transaction: &Transaction, matched: bool, offset: FixedOffset) -> String {
    let marker = if matched { "✅" } else { "❗" };
    let description = sanitize(&transaction.metadata.description);
    let description = if description.trim().is_empty() {
        "n/a".to_string()
    } else {
        description
    };

    format!(
        "  {} {}, `{:<8.2}` {}, {}",
        marker,
        local_time(transaction.timestamp, offset),
        transaction.amount,
        transaction.currency.as_deref().unwrap_or_default(),
        description
    )
}

fn side_section(lines: &mut Vec<String>, report: &SyncReport, source: Source, offset: FixedOffset) {
    let (label, count) = match source {
        Source::Bank => ("PrivatBank", report.bank_count()),
        Source::Pos => ("Poster", report.pos_count()),
    };
    lines.push(format!("*{} transactions ({}):*", label, count));

    let entries = report.entries(source);
    if entries.is_empty() {
        lines.push("  (none)".to_string());
    }
    for entry in entries {
        lines.push(transaction_line(entry.transaction, entry.is_matched(), offset));
    }
    lines.push(RULE.to_string());
}

pub fn format_report(report: &SyncReport, offset: FixedOffset) -> String {
    let icon = if report.has_discrepancies() { "⚠️" } else { "✅" };
    let balance = report.balance_delta();

    let mut lines = vec![
        header(icon, report.period(), offset),
        RULE.to_string(),
        format!("PrivatBank fetched: {}", report.bank_count()),
        format!("Poster fetched: {}", report.pos_count()),
        format!("Matched pairs: {}", report.matched().len()),
        format!("Unmatched PrivatBank: {}", report.unmatched_bank().len()),
        format!("Unmatched Poster: {}", report.unmatched_pos().len()),
        format!("PrivatBank balance: `{:.2}`", balance.bank_balance),
        format!("Poster balance: `{:.2}`", balance.pos_balance),
        format!(
            "Balance difference (PrivatBank - Poster): {} `{}`",
            if balance.significant { "❗" } else { "✅" },
            balance.signed_delta()
        ),
        RULE.to_string(),
    ];

    side_section(&mut lines, report, Source::Bank, offset);
    side_section(&mut lines, report, Source::Pos, offset);

    let unmatched = !report.unmatched_bank().is_empty() || !report.unmatched_pos().is_empty();
    if !report.has_discrepancies() {
        lines.push("✅ Reconciled, no discrepancies found.".to_string());
    } else if !unmatched {
        lines.push("⚠️ Only the balances differ.".to_string());
    } else {
        lines.push("⚠️ Unmatched transactions need review.".to_string());
    }

    lines.join("\n")
}

pub fn format_failure(period: &Period, error: &str, offset: FixedOffset) -> String {
    [
        header("⚠️", period, offset),
        RULE.to_string(),
        format!("🚨 *ERROR:* {}", sanitize(error)),
        RULE.to_string(),
    ]
    .join("\n")
}

/// Split on line boundaries into chunks of at most `limit` characters.
///
/// A single line longer than `limit` is cut mid-line.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let mut line = line;
        let mut line_len = line.chars().count();

        while line_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let cut = line
                .char_indices()
                .nth(limit)
                .map_or(line.len(), |(i, _)| i);
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
            line_len -= limit;
        }

        let needed = if current.is_empty() {
            line_len
        } else {
            current_len + 1 + line_len
        };
        if needed > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}
