//! Meteo station / variable name to code resolution.
//!
//! The XEMA data table is keyed by station and variable codes, while people
//! ask for municipality names and variable acronyms. Two small side tables map
//! one to the other. A local JSON copy (see [`export_table`]) is preferred over
//! the remote table.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::SodaClient;
use crate::error::{Error, Result};

/// Source of whole metadata tables as JSON record arrays.
pub trait JsonSource {
    fn fetch_json(&self, dataset: &str) -> Result<Value>;
}

impl JsonSource for SodaClient {
    fn fetch_json(&self, dataset: &str) -> Result<Value> {
        SodaClient::fetch_json(self, dataset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataTable {
    /// "Metadades estacions meteorològiques automàtiques"
    Stations,
    /// "Metadades variables meteorològiques"
    Variables,
}

impl MetadataTable {
    pub fn dataset_id(self) -> &'static str {
        match self {
            MetadataTable::Stations => "yqwd-vj5e",
            MetadataTable::Variables => "4fb2-n3yi",
        }
    }

    pub fn cache_file_name(self) -> &'static str {
        match self {
            MetadataTable::Stations => "meteo_stations.json",
            MetadataTable::Variables => "meteo_variables.json",
        }
    }

    /// Column holding the human-readable name.
    pub fn name_field(self) -> &'static str {
        match self {
            MetadataTable::Stations => "nom_municipi",
            MetadataTable::Variables => "acronim",
        }
    }

    /// Column holding the code used by the data table.
    pub fn code_field(self) -> &'static str {
        match self {
            MetadataTable::Stations => "codi_estacio",
            MetadataTable::Variables => "codi_variable",
        }
    }
}

/// Outcome of resolving a list of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Input names found in the table, input order.
    pub matched: Vec<String>,
    /// Codes of every record whose name was matched, table order.
    pub codes: Vec<String>,
    /// Input names the table does not know.
    pub unmatched: Vec<String>,
}

pub struct MetadataLookup<'a, S: JsonSource + ?Sized> {
    source: &'a S,
    meta_dir: PathBuf,
}

impl<'a, S: JsonSource + ?Sized> MetadataLookup<'a, S> {
    pub fn new(source: &'a S, meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            meta_dir: meta_dir.into(),
        }
    }

    pub fn cache_path(&self, table: MetadataTable) -> PathBuf {
        self.meta_dir.join(table.cache_file_name())
    }

    /// Records of `table`, from the local cache if present, else remote.
    pub fn load(&self, table: MetadataTable) -> Result<Vec<Value>> {
        let cached = self.cache_path(table);
        let value: Value = if cached.is_file() {
            info!(path = %cached.display(), "read metadata file");
            serde_json::from_reader(BufReader::new(File::open(&cached)?))?
        } else {
            info!(dataset = table.dataset_id(), "read remote metadata table");
            self.source.fetch_json(table.dataset_id())?
        };
        into_records(value)
    }

    /// Resolve `names` against `table`, warning about the ones that do not exist.
    pub fn resolve(&self, table: MetadataTable, names: &[String]) -> Result<Resolution> {
        let records = self.load(table)?;
        debug!(records = records.len(), "metadata loaded");
        let res = resolve_codes(&records, table, names);
        if !res.unmatched.is_empty() {
            warn!(
                table = table.name_field(),
                unmatched = ?res.unmatched,
                "names not found in metadata, ignoring them"
            );
        }
        info!(matched = ?res.matched, codes = ?res.codes, "resolved metadata");
        Ok(res)
    }
}

/// Pure name -> code matching over already loaded records.
pub fn resolve_codes(records: &[Value], table: MetadataTable, names: &[String]) -> Resolution {
    let name_of = |r: &Value| r.get(table.name_field()).and_then(scalar_to_string);

    let mut res = Resolution::default();
    for name in names {
        let known = records.iter().any(|r| name_of(r).as_deref() == Some(name.as_str()));
        if known {
            if !res.matched.contains(name) {
                res.matched.push(name.clone());
            }
        } else if !res.unmatched.contains(name) {
            res.unmatched.push(name.clone());
        }
    }

    for r in records {
        let Some(n) = name_of(r) else { continue };
        if !res.matched.contains(&n) {
            continue;
        }
        if let Some(code) = r.get(table.code_field()).and_then(scalar_to_string) {
            res.codes.push(code);
        }
    }
    res
}

/// Download `table` and store it as pretty JSON at `path`, replacing any previous copy.
///
/// Returns the number of records written.
pub fn export_table<S>(source: &S, table: MetadataTable, path: &Path) -> Result<usize>
where
    S: JsonSource + ?Sized,
{
    let records = into_records(source.fetch_json(table.dataset_id())?)?;
    info!(path = %path.display(), "write to file");
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, &records)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(records.len())
}

fn into_records(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(records) => Ok(records),
        other => Err(Error::ResponseShape(format!(
            "expected a JSON array of records, got {}",
            kind_of(&other)
        ))),
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
