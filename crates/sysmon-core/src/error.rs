//! Error types for framing, command decoding, and sampling.

use std::path::PathBuf;

use thiserror::Error;

use crate::sample::ResourceKind;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can end or fail a request.
///
/// [`Error::StreamClosed`] is the normal end of a session. Every other
/// variant is fatal to the dispatch loop under the default error policy.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer closed the stream before a complete length header arrived.
    #[error("stream closed")]
    StreamClosed,

    /// The stream ended in the middle of a payload.
    #[error("truncated frame: expected {expected} payload bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },

    /// A payload does not fit the 32-bit length prefix or the configured limit.
    #[error("frame too large: {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The document is not JSON, has no `type`, or does not match the
    /// parameter shape of the resolved command.
    #[error("malformed command: {0}")]
    MalformedCommand(#[source] serde_json::Error),

    /// No factory is registered for the tag.
    #[error("unknown command type: {0:?}")]
    UnknownCommandType(String),

    /// The raw sampler could not produce absolute counters.
    #[error("sampling {kind} failed: {source}")]
    SamplingFailed {
        kind: ResourceKind,
        #[source]
        source: SampleError,
    },

    /// The result could not be encoded as JSON.
    #[error("failed to serialize result: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Read or write failure on the underlying stream.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// `true` for the normal end-of-session signal.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::StreamClosed)
    }

    /// `true` when the stream position can no longer be trusted, so no
    /// further frame may be read or written.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::TruncatedFrame { .. } | Self::FrameTooLarge { .. } | Self::Io(_)
        )
    }
}

/// Underlying cause of a [`Error::SamplingFailed`].
#[derive(Debug, Error)]
pub enum SampleError {
    /// A file or device the sampler expected is absent.
    #[error("{} not found: {source}", path.display())]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content did not have the expected shape.
    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    /// An external utility could not be run or exited unsuccessfully.
    #[error("{program} failed: {detail}")]
    Tool { program: String, detail: String },
}

impl SampleError {
    /// Classify an I/O error for `path` as [`SampleError::Missing`] or
    /// [`SampleError::Read`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::Missing { path, source }
        } else {
            Self::Read { path, source }
        }
    }

    pub fn parse(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_is_missing() {
        let err = SampleError::io(
            "/sys/class/net/eth9/statistics/rx_bytes",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, SampleError::Missing { .. }));
        assert!(err.to_string().contains("eth9"));
    }

    #[test]
    fn io_other_is_read() {
        let err = SampleError::io(
            "/proc/stat",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, SampleError::Read { .. }));
    }

    #[test]
    fn classification() {
        assert!(Error::StreamClosed.is_end_of_stream());
        assert!(!Error::StreamClosed.is_framing());
        assert!(
            Error::TruncatedFrame {
                expected: 10,
                received: 3
            }
            .is_framing()
        );
        assert!(!Error::UnknownCommandType("x".into()).is_framing());
    }

    #[test]
    fn sampling_failed_names_kind_and_cause() {
        let err = Error::SamplingFailed {
            kind: ResourceKind::Network,
            source: SampleError::parse("rx_bytes of eth1", "\"abc\""),
        };
        let msg = err.to_string();
        assert!(msg.contains("network"), "{msg}");
        assert!(msg.contains("eth1"), "{msg}");
    }
}
