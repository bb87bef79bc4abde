use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange { start: String, end: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed response: {0}")]
    ResponseShape(String),

    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Errors the fetch loop absorbs for a single cell. Everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::RetriesExhausted { .. } | Error::ResponseShape(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fetch_and_shape_errors_are_recoverable() {
        let exhausted = Error::RetriesExhausted {
            attempts: 5,
            source: Box::new(Error::InvalidRequest("boom".into())),
        };
        assert!(exhausted.is_recoverable());
        assert!(Error::ResponseShape("no header".into()).is_recoverable());

        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(!io.is_recoverable());
        assert!(!Error::InvalidRequest("x".into()).is_recoverable());
    }

    #[test]
    fn exhausted_message_names_last_error() {
        let e = Error::RetriesExhausted {
            attempts: 5,
            source: Box::new(Error::Status {
                status: 503,
                url: "https://example.org/resource/x.csv".into(),
            }),
        };
        let msg = e.to_string();
        assert!(msg.contains("5 attempts"));
        assert!(msg.contains("503"));
    }
}
