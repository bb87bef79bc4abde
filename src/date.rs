use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

use crate::error::{Error, Result};

/// Step size of the fetch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Hourly,
}

impl Granularity {
    pub fn step(self) -> Duration {
        match self {
            Granularity::Daily => Duration::days(1),
            Granularity::Hourly => Duration::hours(1),
        }
    }
}

/// Inclusive `[start, end]` interval. Construction fails when `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidTimeRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn buckets(&self, granularity: Granularity) -> TimeBuckets {
        TimeBuckets::new(self.start, self.end, granularity.step())
    }
}

/// Lazy sequence `start, start + step, ...` up to and including `end`.
///
/// Cloning restarts from the clone point, so a fresh `TimeRange::buckets`
/// call always yields the full sequence again.
#[derive(Debug, Clone)]
pub struct TimeBuckets {
    next: Option<NaiveDateTime>,
    step: Duration,
    remaining: usize,
}

impl TimeBuckets {
    fn new(start: NaiveDateTime, end: NaiveDateTime, step: Duration) -> Self {
        let span = (end - start).num_seconds();
        let step_secs = step.num_seconds().max(1);
        let remaining = if span < 0 {
            0
        } else {
            (span / step_secs) as usize + 1
        };
        Self {
            next: Some(start),
            step,
            remaining,
        }
    }
}

impl Iterator for TimeBuckets {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        // No step past the last bucket: it may sit at the edge of the calendar.
        self.next = if self.remaining > 0 {
            current.checked_add_signed(self.step)
        } else {
            None
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for TimeBuckets {}

/// Midnight of the day before `now`.
pub fn yesterday(now: DateTime<Utc>) -> NaiveDateTime {
    (now.date_naive() - Duration::days(1)).and_time(NaiveTime::MIN)
}

/// Same date and minutes, hour forced to 23.
pub fn end_of_day_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_hour(23).unwrap_or(dt)
}

/// Parse date inputs:
/// - "YYYYMMDD" or "YYYY-MM-DD" (midnight)
/// - "YYYY-MM-DD HH:MM[:SS]" or "YYYY-MM-DDTHH:MM[:SS]"
/// - integer <= 0 means midnight of today + delta days
pub fn parse_datetime_like(s: &str, now: DateTime<Utc>) -> Result<NaiveDateTime> {
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        if n <= 0 {
            let d = now.date_naive() + Duration::days(n);
            return Ok(d.and_time(NaiveTime::MIN));
        }
        if trimmed.len() == 8 {
            let d = NaiveDate::parse_from_str(trimmed, "%Y%m%d").map_err(|_| {
                Error::InvalidRequest(format!("invalid YYYYMMDD date: {trimmed}"))
            })?;
            return Ok(d.and_time(NaiveTime::MIN));
        }
    }

    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN));
    }

    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }

    Err(Error::InvalidRequest(format!(
        "unsupported date format: {trimmed}"
    )))
}
