use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use url::Url;

use crate::error::{Error, Result};
use crate::query::Query;
use crate::sources::domain_to_base_url;

/// One record of a tabular response; fields are passed through verbatim.
pub type Row = Vec<String>;

const APP_TOKEN_HEADER: &str = "x-app-token";

/// Anything that can answer a field-equality query against a dataset.
///
/// The first returned row is the header of the table.
pub trait DataSource {
    fn query(&self, dataset: &str, query: &Query) -> Result<Vec<Row>>;
}

impl<T: DataSource + ?Sized> DataSource for &T {
    fn query(&self, dataset: &str, query: &Query) -> Result<Vec<Row>> {
        (**self).query(dataset, query)
    }
}

impl<T: DataSource + ?Sized> DataSource for Box<T> {
    fn query(&self, dataset: &str, query: &Query) -> Result<Vec<Row>> {
        (**self).query(dataset, query)
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub domain: String,
    pub app_token: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            domain: crate::sources::DEFAULT_DOMAIN.to_string(),
            app_token: None,
            timeout: None,
        }
    }
}

/// Blocking client for the Socrata SODA resource API.
#[derive(Debug, Clone)]
pub struct SodaClient {
    base_url: String,
    http: HttpClient,
}

impl SodaClient {
    pub fn new(opts: ClientOptions) -> Result<Self> {
        let base_url = domain_to_base_url(&opts.domain);
        Url::parse(&base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("catdata-opendata-rs/0.1"));
        if let Some(token) = &opts.app_token {
            let value = HeaderValue::from_str(token)
                .map_err(|_| Error::InvalidRequest("app token is not a valid header value".into()))?;
            headers.insert(HeaderName::from_static(APP_TOKEN_HEADER), value);
        }

        let mut builder = HttpClient::builder().default_headers(headers);
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self { base_url, http })
    }

    /// Convenience constructor for the default portal.
    pub fn default_client() -> Result<Self> {
        Self::new(ClientOptions::default())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<base>/resource/<dataset>.<ext>?<params>`
    pub fn resource_url(&self, dataset: &str, ext: &str, query: Option<&Query>) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/resource/{dataset}.{ext}", self.base_url))?;
        if let Some(q) = query {
            url.query_pairs_mut().extend_pairs(q.to_params());
        }
        Ok(url)
    }

    /// Fetch a whole dataset as JSON records (used for the small metadata tables).
    pub fn fetch_json(&self, dataset: &str) -> Result<serde_json::Value> {
        let url = self.resource_url(dataset, "json", None)?;
        let resp = self.get(url)?;
        Ok(resp.json()?)
    }

    fn get(&self, url: Url) -> Result<reqwest::blocking::Response> {
        let resp = self.http.get(url.clone()).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp)
    }
}

impl DataSource for SodaClient {
    fn query(&self, dataset: &str, query: &Query) -> Result<Vec<Row>> {
        let url = self.resource_url(dataset, "csv", Some(query))?;
        tracing::debug!(%url, "querying dataset");
        let mut resp = self.get(url)?;
        let mut body = Vec::new();
        resp.read_to_end(&mut body)?;
        parse_csv_rows(&body)
    }
}

/// Decode a CSV body into rows, header included as row 0.
pub fn parse_csv_rows(body: &[u8]) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
