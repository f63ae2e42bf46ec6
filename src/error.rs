use reqwest::StatusCode;
use thiserror::Error;

/// Error categories for actionable diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Authentication/authorization issues - check API key.
    Auth,
    /// Rate limiting - slow down requests.
    RateLimit,
    /// Quota exceeded - upgrade plan or wait.
    Quota,
    /// Network connectivity - check internet connection.
    Network,
    /// Server-side error on the external translator - retry later.
    Server,
    /// Client-side error - fix request.
    Client,
    /// Configuration error - fix config file.
    Config,
    /// Cache error - check disk space/permissions.
    Cache,
    /// Unknown error.
    Unknown,
}

impl ErrorCategory {
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Auth => "Check the external translator API credentials",
            Self::RateLimit => "Too many requests. Wait and retry with backoff",
            Self::Quota => "API quota exceeded. Wait for reset or upgrade plan",
            Self::Network => "Check network connectivity to the translator endpoint",
            Self::Server => "External translator service issue. Retry in a few minutes",
            Self::Client => "Invalid request. Check input encoding",
            Self::Config => "Fix configuration file syntax or values",
            Self::Cache => "Check disk space and file permissions for the cache path",
            Self::Unknown => "Unexpected error. Check logs for details",
        }
    }
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited (HTTP 429){retry_msg}. {}", ErrorCategory::RateLimit.advice(), retry_msg = .retry_after_secs.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("HTTP {status} (retryable). {}", ErrorCategory::Server.advice())]
    RetryableHttp { status: StatusCode },

    #[error("Authentication failed (HTTP {status}). {}", ErrorCategory::Auth.advice())]
    AuthError { status: StatusCode },

    #[error("Quota exceeded (HTTP {status}). {}", ErrorCategory::Quota.advice())]
    QuotaExceeded { status: StatusCode },

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Config error: {0}. Fix configuration file syntax or values")]
    Config(String),

    #[error("Cache error: {0}. Check disk space and file permissions for the cache path")]
    Cache(String),

    #[error(
        "Circuit breaker open. External translator temporarily unavailable. Retry in {0} seconds"
    )]
    CircuitOpen(u64),

    #[error("Request validation failed: {0}")]
    Validation(String),

    #[error("Connection timeout. {}", ErrorCategory::Network.advice())]
    Timeout,

    #[error("Connection failed. {}", ErrorCategory::Network.advice())]
    ConnectionFailed,
}

impl ProxyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io(_) => ErrorCategory::Cache,
            Self::Json(_) => ErrorCategory::Client,
            Self::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    ErrorCategory::Network
                } else if let Some(status) = e.status() {
                    Self::category_from_status(status)
                } else {
                    ErrorCategory::Unknown
                }
            }
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::RetryableHttp { status } => Self::category_from_status(*status),
            Self::AuthError { .. } => ErrorCategory::Auth,
            Self::QuotaExceeded { .. } => ErrorCategory::Quota,
            Self::Translation(_) => ErrorCategory::Client,
            Self::Config(..) => ErrorCategory::Config,
            Self::Cache(..) => ErrorCategory::Cache,
            Self::CircuitOpen(_) => ErrorCategory::Server,
            Self::Validation(_) => ErrorCategory::Client,
            Self::Timeout => ErrorCategory::Network,
            Self::ConnectionFailed => ErrorCategory::Network,
        }
    }

    /// Determine if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::Server | ErrorCategory::Network
        )
    }

    fn category_from_status(status: StatusCode) -> ErrorCategory {
        match status.as_u16() {
            401 | 403 => ErrorCategory::Auth,
            429 => ErrorCategory::RateLimit,
            402 | 451 => ErrorCategory::Quota,
            400..=499 => ErrorCategory::Client,
            500..=599 => ErrorCategory::Server,
            _ => ErrorCategory::Unknown,
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        Self::from_status_with_retry_after(status, None)
    }

    pub fn from_status_with_retry_after(status: StatusCode, retry_after_secs: Option<u64>) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthError { status },
            429 => Self::RateLimited { retry_after_secs },
            402 | 451 => Self::QuotaExceeded { status },
            500..=599 => Self::RetryableHttp { status },
            _ => Self::Translation(format!("HTTP {status}")),
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }

    /// Stable machine-readable code for the HTTP error envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Json(_) => "MALFORMED_BODY",
            Self::AuthError { .. } | Self::QuotaExceeded { .. } => "UPSTREAM_CLIENT_ERROR",
            Self::RateLimited { .. } | Self::RetryableHttp { .. } | Self::CircuitOpen(_) => {
                "UPSTREAM_UNAVAILABLE"
            }
            Self::Timeout => "UPSTREAM_TIMEOUT",
            _ => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the surrounding server should return for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::Json(_) => 400,
            Self::AuthError { .. } | Self::QuotaExceeded { .. } => 502,
            Self::RateLimited { .. } | Self::RetryableHttp { .. } | Self::CircuitOpen(_) => 503,
            Self::Timeout => 504,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
