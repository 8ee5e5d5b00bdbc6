//! Error types for the forwarder.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("undefined environment variables: {}", .0.join(", "))]
    UndefinedEnvVars(Vec<String>),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures reported by the external collaborators (archive, mail API).
///
/// Displays as the bare cause so callers can wrap it with their own context.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Http(String),

    #[error("unexpected status {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("{0}")]
    Smtp(String),

    #[error("{0}")]
    Other(String),
}

/// The archived bytes are not a well-formed header block + body.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageParseError {
    #[error("malformed initial header line: {0}")]
    InitialContinuation(String),

    #[error("malformed header line: {0}")]
    MalformedLine(String),

    #[error("missing blank line after header block")]
    MissingSeparator,
}

/// Failures while producing the rewritten header block.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("couldn't parse From address {value}: {reason}")]
    FromAddress { value: String, reason: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a per-record failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationRejection,
    Storage,
    Parse,
    Rewrite,
    Transmission,
}

/// Terminal failure for one message record.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("DMARC bounced with bounce ID: {bounce_id}")]
    Bounced { bounce_id: String },

    #[error("marked as spam, ignoring")]
    MarkedAsSpam,

    #[error("DMARC bounce failed: {0}")]
    BounceFailed(TransportError),

    #[error("failed to get original message: {0}")]
    Storage(TransportError),

    #[error("failed to parse message: {0}")]
    Parse(#[from] MessageParseError),

    #[error("error updating email headers: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("send failed: {0}")]
    Send(TransportError),
}

impl ForwardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bounced { .. } | Self::MarkedAsSpam => ErrorKind::ValidationRejection,
            Self::BounceFailed(_) | Self::Send(_) => ErrorKind::Transmission,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Parse(_) | Self::Rewrite(RewriteError::FromAddress { .. }) => ErrorKind::Parse,
            Self::Rewrite(RewriteError::Io(_)) => ErrorKind::Rewrite,
        }
    }
}

/// Batch-level errors. Per-record failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("SES event contained no records")]
    EmptyBatch,
}
