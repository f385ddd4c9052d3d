//! Error types for bgqueue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad constructor or report configuration. No engine is created.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Argument rejected synchronously; queue state is unaffected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A work item's `process` reported a failure.
    #[error("work failed: {0}")]
    WorkFailure(String),

    /// Something executed that must never execute (e.g. the poison pill).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
