use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::{debug, error, info, trace, warn, Dispatch};

use crate::client::{DataSource, Row};
use crate::dataset::{reading_timestamp, Dataset};
use crate::date::TimeRange;
use crate::error::{Error, Result};
use crate::query::DEFAULT_LIMIT;
use crate::retry::RetryPolicy;
use crate::writer::{RollingWriter, WriterOptions};

/// Field separator of the output files.
pub const SEP: &str = ";";

/// Locations x variables to query for every bucket.
///
/// `None` is the wildcard: no predicate is sent for that dimension. An empty
/// input dimension becomes a single wildcard, never zero entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    locations: Vec<Option<String>>,
    variables: Vec<Option<String>>,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::unfiltered()
    }
}

impl FilterSet {
    pub fn new<L, V>(locations: L, variables: V) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            locations: or_wildcard(locations),
            variables: or_wildcard(variables),
        }
    }

    pub fn unfiltered() -> Self {
        Self {
            locations: vec![None],
            variables: vec![None],
        }
    }

    pub fn locations(&self) -> &[Option<String>] {
        &self.locations
    }

    pub fn variables(&self) -> &[Option<String>] {
        &self.variables
    }

    /// Cartesian product, location-major.
    pub fn cells(&self) -> impl Iterator<Item = (Option<&str>, Option<&str>)> + '_ {
        self.locations.iter().flat_map(move |l| {
            self.variables
                .iter()
                .map(move |v| (l.as_deref(), v.as_deref()))
        })
    }
}

fn or_wildcard<I>(values: I) -> Vec<Option<String>>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let out: Vec<Option<String>> = values.into_iter().map(|v| Some(v.into())).collect();
    if out.is_empty() { vec![None] } else { out }
}

/// A cell that contributed no rows because of a recoverable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFailure {
    pub bucket: NaiveDateTime,
    pub location: Option<String>,
    pub variable: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub rows_written: u64,
    pub buckets: usize,
    pub failed_cells: Vec<CellFailure>,
    /// Output files touched, in the order they were opened.
    pub files: Vec<PathBuf>,
    pub archives: Vec<PathBuf>,
}

/// Drives bucket x cell fetches into rolling output files.
pub struct FetchLoop<S> {
    source: S,
    dataset: Dataset,
    writer: WriterOptions,
    retry: RetryPolicy,
    limit: usize,
    dispatch: Option<Dispatch>,
}

impl<S: DataSource> FetchLoop<S> {
    pub fn new(source: S, dataset: Dataset, writer: WriterOptions) -> Self {
        Self {
            source,
            dataset,
            writer,
            retry: RetryPolicy::default(),
            limit: DEFAULT_LIMIT,
            dispatch: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Rows requested per cell.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Log through `dispatch` for the duration of each run instead of the
    /// thread's current subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn run(&self, range: &TimeRange, filter: &FilterSet) -> Result<RunReport> {
        match &self.dispatch {
            Some(dispatch) => {
                tracing::dispatcher::with_default(dispatch, || self.run_inner(range, filter))
            }
            None => self.run_inner(range, filter),
        }
    }

    fn run_inner(&self, range: &TimeRange, filter: &FilterSet) -> Result<RunReport> {
        let mut writer = RollingWriter::new(self.writer.clone(), self.dataset.prefix());
        let mut report = RunReport::default();

        for bucket in range.buckets(self.dataset.granularity()) {
            report.buckets += 1;
            writer.open_for(bucket)?;
            info!(time = %reading_timestamp(bucket), "fetching bucket");

            for (location, variable) in filter.cells() {
                debug!(?location, ?variable, "fetching cell");
                match self.fetch_cell(bucket, location, variable) {
                    Ok(lines) => {
                        let n = writer.write_bucket(bucket, &lines)?;
                        report.rows_written += n as u64;
                    }
                    Err(e) if e.is_recoverable() => {
                        error!(
                            time = %reading_timestamp(bucket),
                            ?location,
                            ?variable,
                            error = %e,
                            "cell skipped"
                        );
                        report.failed_cells.push(CellFailure {
                            bucket,
                            location: location.map(str::to_string),
                            variable: variable.map(str::to_string),
                            error: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let written = writer.finish()?;
        report.files = written.files;
        report.archives = written.archives;
        info!(
            rows = report.rows_written,
            buckets = report.buckets,
            failed = report.failed_cells.len(),
            "run finished"
        );
        Ok(report)
    }

    /// Serialized data lines for one cell, header dropped.
    fn fetch_cell(
        &self,
        bucket: NaiveDateTime,
        location: Option<&str>,
        variable: Option<&str>,
    ) -> Result<Vec<String>> {
        let query = self.dataset.query_for(bucket, location, variable, self.limit);
        let rows = self.retry.fetch(&self.source, self.dataset.id(), &query)?;
        let lines = data_lines(rows)?;
        if lines.len() >= self.limit {
            warn!(
                limit = self.limit,
                time = %reading_timestamp(bucket),
                ?location,
                ?variable,
                "row limit reached, response may be truncated"
            );
        }
        Ok(lines)
    }
}

/// Drop the header row and join each remaining row with [`SEP`].
pub fn data_lines(rows: Vec<Row>) -> Result<Vec<String>> {
    let mut rows = rows.into_iter();
    if rows.next().is_none() {
        return Err(Error::ResponseShape("response has no header row".into()));
    }
    Ok(rows
        .map(|row| {
            let line = row.join(SEP);
            trace!(line = %line, "row");
            line
        })
        .collect())
}
