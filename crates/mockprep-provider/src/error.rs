use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

fn retry_tag(kind: &ProviderErrorKind) -> &'static str {
    if kind.is_retryable() {
        " [retryable]"
    } else {
        ""
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} api error ({status}){}: {message}", retry_tag(.kind))]
    Api {
        provider: String,
        status: StatusCode,
        kind: ProviderErrorKind,
        message: String,
    },
    #[error("{provider} api error (timeout) [retryable]: request timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },
    #[error("{provider} api error (connect) [retryable]: {source}")]
    Connect {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} api error: {reason}")]
    EmptyReply { provider: String, reason: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Api { kind, .. } => *kind,
            Self::Timeout { .. } => ProviderErrorKind::Timeout,
            Self::Connect { .. } => ProviderErrorKind::ServerError,
            Self::EmptyReply { .. } | Self::Http(_) => ProviderErrorKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Maps a failed `send()` into the matching variant.
    pub(crate) fn from_send(provider: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
                secs: timeout_secs,
            }
        } else if err.is_connect() {
            Self::Connect {
                provider: provider.to_string(),
                source: err,
            }
        } else {
            Self::Http(err)
        }
    }
}
