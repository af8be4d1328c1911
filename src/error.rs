//! Error taxonomy shared by the cache, the aggregator and the search session.
//!
//! Every variant carries plain `String` payloads so the type is `Clone`:
//! one in-flight fetch may have many waiters, and each of them receives
//! its own copy of the same error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The network or HTTP layer failed (connection, timeout, non-2xx status).
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The response body could not be decoded as the expected JSON shape.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// The server answered with an empty body.
    #[error("no data returned from {0}")]
    NoData(String),

    /// The API credential environment variable is not set.
    #[error("missing API credential: environment variable {0} is not set")]
    MissingCredential(String),

    /// The locator cannot be turned into a cache key.
    #[error("invalid locator: {0:?}")]
    InvalidLocator(String),

    #[error("index {index} out of range (count = {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// The disk tier could not be read.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Title and message shown to the user when a search or page fetch fails.
    pub fn user_message(&self) -> (String, String) {
        let title = match self {
            Error::TransportFailure(_) => "Network error",
            Error::DecodeFailure(_) => "Unexpected response",
            Error::NoData(_) => "No data",
            Error::MissingCredential(_) => "Missing API key",
            Error::InvalidLocator(_) => "Invalid address",
            Error::IndexOutOfRange { .. } => "Internal error",
            Error::Storage(_) => "Cache error",
        };
        (title.to_string(), self.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
