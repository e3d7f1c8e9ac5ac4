use std::time::Duration;

/// Failure to obtain the listing document. Fatal to one pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Failed to fetch: {status} {status_text}")]
    Status { status: u16, status_text: String },
    #[error("listing request timed out after {0:?}")]
    Timeout(Duration),
    #[error("listing request failed: {0}")]
    Network(#[source] reqwest::Error),
}

impl FetchError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Network(err)
        }
    }
}

/// Failure of a relay session or of the request that would open one.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    InvalidRequest(String),
    /// Upstream answered with a non-2xx status; `body` is its error text verbatim.
    #[error("{body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("completions request timed out after {0:?}")]
    Timeout(Duration),
    #[error("completions request failed: {0}")]
    Upstream(#[source] reqwest::Error),
}

impl RelayError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            RelayError::Timeout(timeout)
        } else {
            RelayError::Upstream(err)
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PreviewError {
    #[error("Invalid tweet ID")]
    InvalidId,
    #[error("oEmbed {0}")]
    Status(u16),
    #[error("oEmbed request timed out after {0:?}")]
    Timeout(Duration),
    #[error("oEmbed request failed: {0}")]
    Network(#[source] reqwest::Error),
}

impl PreviewError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            PreviewError::Timeout(timeout)
        } else {
            PreviewError::Network(err)
        }
    }
}
