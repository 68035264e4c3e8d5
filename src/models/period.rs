use crate::error::{AppError, Result};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use std::fmt;

/// Time window covered by one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(AppError::InvalidInput(format!(
                "period start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// From local midnight `days` days before `now` up to `now`.
    ///
    /// Feeds report local wall-clock time, so day boundaries are taken in
    /// `offset` rather than in UTC.
    pub fn lookback(now: DateTime<Utc>, days: u32, offset: FixedOffset) -> Result<Self> {
        let start = now
            .with_timezone(&offset)
            .date_naive()
            .checked_sub_days(Days::new(u64::from(days)))
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .and_then(|midnight| midnight.and_local_timezone(offset).single())
            .ok_or_else(|| {
                AppError::InvalidInput(format!("cannot look back {} days from {}", days, now))
            })?
            .with_timezone(&Utc);

        Self::new(start, now)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// First and last calendar day of the period in local time, as the feed APIs expect
    pub fn local_dates(&self, offset: FixedOffset) -> (NaiveDate, NaiveDate) {
        (
            self.start.with_timezone(&offset).date_naive(),
            self.end.with_timezone(&offset).date_naive(),
        )
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d %H:%M UTC"),
            self.end.format("%Y-%m-%d %H:%M UTC")
        )
    }
}
