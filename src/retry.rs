use std::time::Duration;

use tracing::{debug, warn};

use crate::client::{DataSource, Row};
use crate::error::{Error, Result};
use crate::query::Query;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Bounded retry around a single [`DataSource::query`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Run the query until it succeeds or attempts run out.
    ///
    /// On exhaustion returns [`Error::RetriesExhausted`] wrapping the last failure.
    pub fn fetch<S>(&self, source: &S, dataset: &str, query: &Query) -> Result<Vec<Row>>
    where
        S: DataSource + ?Sized,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match source.query(dataset, query) {
                Ok(rows) => {
                    if attempt > 1 {
                        debug!(attempt, "query succeeded after retry");
                    }
                    return Ok(rows);
                }
                Err(e) => {
                    warn!(attempt, max_attempts = attempts, error = %e, "query attempt failed");
                    last_err = Some(e);
                    if attempt < attempts && !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
            }
        }

        let source = last_err.unwrap_or_else(|| Error::InvalidRequest("no attempt was made".into()));
        Err(Error::RetriesExhausted {
            attempts,
            source: Box::new(source),
        })
    }
}
