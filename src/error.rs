//! Unified error handling for the crawling engine.
//!
//! All fallible operations in this crate return [`Error`]. Operational
//! failures inside a running crawl are tagged with the [`ErrorKind`] of the
//! component that originated them and routed to the scheduler's error
//! stream; lifecycle failures (`ClosedBuffer`, `ClosedBufferPool`) signal a
//! conduit that has been shut down.

use thiserror::Error;

use crate::module::ModuleType;

/// The component a tagged operational error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Downloader,
    Analyzer,
    Pipeline,
    Scheduler,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Downloader => "downloader error",
            ErrorKind::Analyzer => "analyzer error",
            ErrorKind::Pipeline => "pipeline error",
            ErrorKind::Scheduler => "scheduler error",
        };
        f.write_str(s)
    }
}

impl From<ModuleType> for ErrorKind {
    fn from(mtype: ModuleType) -> Self {
        match mtype {
            ModuleType::Downloader => ErrorKind::Downloader,
            ModuleType::Analyzer => ErrorKind::Analyzer,
            ModuleType::Pipeline => ErrorKind::Pipeline,
        }
    }
}

/// Unified error type for the crawling engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Validation failure of arguments, module IDs, buffer capacities.
    #[error("illegal parameter: {0}")]
    IllegalParameter(String),

    /// Operational failure tagged with the originating component.
    #[error("crawler error: {kind} : {message}")]
    Crawler { kind: ErrorKind, message: String },

    /// Operation on a buffer that has been closed.
    #[error("closed buffer")]
    ClosedBuffer,

    /// Operation on a buffer pool that has been closed.
    #[error("closed buffer pool")]
    ClosedBufferPool,

    /// Registrar lookup miss.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn illegal_parameter(msg: impl Into<String>) -> Self {
        Error::IllegalParameter(msg.into())
    }

    pub fn downloader(msg: impl Into<String>) -> Self {
        Error::Crawler {
            kind: ErrorKind::Downloader,
            message: msg.into(),
        }
    }

    pub fn analyzer(msg: impl Into<String>) -> Self {
        Error::Crawler {
            kind: ErrorKind::Analyzer,
            message: msg.into(),
        }
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Error::Crawler {
            kind: ErrorKind::Pipeline,
            message: msg.into(),
        }
    }

    pub fn scheduler(msg: impl Into<String>) -> Self {
        Error::Crawler {
            kind: ErrorKind::Scheduler,
            message: msg.into(),
        }
    }

    /// The kind of a tagged error, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Crawler { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Tags an untagged error with the given kind. Already-tagged errors
    /// keep their original kind.
    pub fn tagged(self, kind: ErrorKind) -> Self {
        match self {
            Error::Crawler { .. } => self,
            other => Error::Crawler {
                kind,
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias using the unified [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_error_display() {
        let err = Error::downloader("connection refused");
        assert_eq!(
            err.to_string(),
            "crawler error: downloader error : connection refused"
        );
    }

    #[test]
    fn illegal_parameter_display() {
        let err = Error::illegal_parameter("buffer capacity is 0");
        assert_eq!(err.to_string(), "illegal parameter: buffer capacity is 0");
    }

    #[test]
    fn tagging_preserves_existing_kind() {
        let err = Error::analyzer("bad markup").tagged(ErrorKind::Scheduler);
        assert_eq!(err.kind(), Some(ErrorKind::Analyzer));
    }

    #[test]
    fn tagging_wraps_untagged() {
        let err = Error::ClosedBuffer.tagged(ErrorKind::Pipeline);
        assert_eq!(err.kind(), Some(ErrorKind::Pipeline));
        assert_eq!(
            err.to_string(),
            "crawler error: pipeline error : closed buffer"
        );
    }

    #[test]
    fn kind_from_module_type() {
        assert_eq!(
            ErrorKind::from(ModuleType::Downloader),
            ErrorKind::Downloader
        );
        assert_eq!(ErrorKind::from(ModuleType::Pipeline), ErrorKind::Pipeline);
    }
}
