use thiserror::Error;

/// Failure taxonomy for a hunt. Only `Config` aborts the whole hunt;
/// the other variants are recovered where they occur and surface only
/// in the session log.
#[derive(Debug, Error)]
pub enum HuntError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("malformed response: {0}")]
    Parse(String),
}
