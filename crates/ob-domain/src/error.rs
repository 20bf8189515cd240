/// Error taxonomy shared across every `openbridge` crate.
///
/// Each variant corresponds to exactly one row of the error table: the HTTP
/// status and client-facing `type`/`code` are derived from the variant by
/// `ob-gateway`, not stored here, so this crate stays free of an `axum`
/// dependency.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The taxonomy name used in the JSON error body's `error.type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::NotFound(_) => "not_found",
            Error::NotImplemented(_) => "not_implemented",
            Error::Upstream(_) => "upstream_error",
            Error::BadGateway(_) => "bad_gateway",
            Error::Timeout(_) => "timeout",
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => "internal",
        }
    }
}

/// Convert a [`reqwest::Error`]-shaped failure message into the domain error.
/// `ob-upstream` owns the actual `reqwest` dependency; this just gives the
/// rest of the crate a stable constructor to call into.
pub fn timeout_or_upstream(is_timeout: bool, message: String) -> Error {
    if is_timeout {
        Error::Timeout(message)
    } else {
        Error::Upstream(message)
    }
}
