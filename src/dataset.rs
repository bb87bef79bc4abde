use chrono::{Datelike, NaiveDateTime};

use crate::date::Granularity;
use crate::query::Query;

/// Datasets the fetch loop knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// "Dades d'immissió dels punts de mesurament de la XVPCA", one record per
    /// station, pollutant and day.
    AirQuality,
    /// "Dades meteorològiques de la XEMA", one record per station, variable and
    /// reading time.
    Meteo,
}

impl Dataset {
    pub fn id(self) -> &'static str {
        match self {
            Dataset::AirQuality => "uy6k-2s8r",
            Dataset::Meteo => "nzvn-apee",
        }
    }

    /// Prefix of the monthly output file name.
    pub fn prefix(self) -> &'static str {
        match self {
            Dataset::AirQuality => "aire",
            Dataset::Meteo => "meteo",
        }
    }

    pub fn granularity(self) -> Granularity {
        match self {
            Dataset::AirQuality => Granularity::Daily,
            Dataset::Meteo => Granularity::Hourly,
        }
    }

    /// Predicates selecting one cell: the bucket's time fields, then location, then variable.
    pub fn query_for(
        self,
        bucket: NaiveDateTime,
        location: Option<&str>,
        variable: Option<&str>,
        limit: usize,
    ) -> Query {
        let q = match self {
            Dataset::AirQuality => Query::new()
                .kw("ANY", bucket.year())
                .kw("MES", bucket.month())
                .kw("DIA", bucket.day())
                .kw_opt("MUNICIPI", location)
                .kw_opt("CONTAMINANT", variable),
            Dataset::Meteo => Query::new()
                .kw("data_lectura", reading_timestamp(bucket))
                .kw_opt("CODI_ESTACIO", location)
                .kw_opt("CODI_VARIABLE", variable),
        };
        q.limit(limit)
    }
}

/// Timestamp format of the meteo `data_lectura` column.
pub fn reading_timestamp(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%S.000").to_string()
}
