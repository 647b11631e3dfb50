use thiserror::Error;

/// Errors raised while decoding a backend payload into typed series.
///
/// Only shape violations the views cannot work around are errors; absent
/// values and absent series decode to empty data instead.
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("expected a JSON object for {0}")]
    NotAnObject(&'static str),

    #[error("missing required field {0:?}")]
    MissingField(String),

    #[error("field {0:?} must be an array")]
    ExpectedArray(String),

    #[error("invalid year key {0:?}")]
    InvalidYear(String),

    #[error("invalid record in year {year}: {message}")]
    InvalidRecord { year: i32, message: String },

    #[error("failed to read CSV: {0}")]
    Csv(String),
}

/// Errors raised by the REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid base URL {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    /// Non-2xx response. `message` is the backend's `detail` when it sent
    /// one, otherwise `HTTP {status}: {reason}`.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Timeout: request exceeded {0}ms")]
    Timeout(u64),

    #[cfg(feature = "api")]
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
