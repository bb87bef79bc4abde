#![forbid(unsafe_code)]

//! Download Catalonia's air-quality and meteorological open data into rolling
//! monthly CSV files.
//!
//! The data lives on the Socrata portal `analisi.transparenciacatalunya.cat`.
//! A run walks a time range bucket by bucket (daily for air quality, hourly
//! for meteo), queries every (location, variable) cell with bounded retries,
//! drops each response's header row and appends the remaining rows, joined
//! with `;`, to `<prefix>_<YYYY>_<MM>.csv`. Files are never truncated, so runs
//! can be resumed or extended; with compression on, every finished month is
//! also written as a single-entry zip next to its csv.
//!
//! **Quick start**
//! ```no_run
//! use catdata_opendata::{
//!     Dataset, FetchLoop, FilterSet, SodaClient, TimeRange, WriterOptions,
//! };
//! use chrono::NaiveDate;
//!
//! let client = SodaClient::default_client()?;
//! let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let range = TimeRange::new(start, end)?;
//!
//! let pipeline = FetchLoop::new(
//!     client,
//!     Dataset::AirQuality,
//!     WriterOptions { compress: true, ..WriterOptions::default() },
//! );
//! let report = pipeline.run(&range, &FilterSet::new(["Barcelona"], ["NO2"]))?;
//! println!("{} rows", report.rows_written);
//! # Ok::<(), catdata_opendata::Error>(())
//! ```
//!
//! Notes:
//! - Each request is capped at 20000 rows by the service; cells hitting the
//!   cap are logged as possibly truncated.
//! - Re-running an overlapping range appends the same rows again.

mod archive;
mod client;
mod dataset;
mod date;
mod error;
pub mod logging;
pub mod metadata;
mod pipeline;
mod query;
mod retry;
mod sources;
mod writer;

pub use crate::archive::{archive_path, zip_file};
pub use crate::client::{parse_csv_rows, ClientOptions, DataSource, Row, SodaClient};
pub use crate::dataset::{reading_timestamp, Dataset};
pub use crate::date::{end_of_day_hour, parse_datetime_like, yesterday, Granularity, TimeBuckets, TimeRange};
pub use crate::error::{Error, Result};
pub use crate::pipeline::{data_lines, CellFailure, FetchLoop, FilterSet, RunReport, SEP};
pub use crate::query::{Query, DEFAULT_LIMIT};
pub use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use crate::sources::{domain_to_base_url, DEFAULT_DOMAIN};
pub use crate::writer::{RollingWriter, WriterOptions, WrittenFiles};
