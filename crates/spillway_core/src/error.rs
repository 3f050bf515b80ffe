//! Error types for the spill buffer.

use spillway_storage::StorageError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors returned by buffer operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Backing file error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A fault recorded in the stream reached the consumer.
    #[error("stream fault: {0}")]
    Stream(StreamFault),

    /// The producer side is done; no more bytes are accepted.
    #[error("produce side is done")]
    ProduceDone,

    /// The operation is not allowed in the buffer's current state.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of the state conflict.
        message: String,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// A slot inside the live range has no segment.
    #[error("no segment at slot {index}")]
    MissingSegment {
        /// Slot index.
        index: usize,
    },
}

impl BufferError {
    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<BufferError> for io::Error {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Io(e) => e,
            BufferError::Stream(fault) => fault.into(),
            BufferError::ProduceDone => io::Error::new(io::ErrorKind::BrokenPipe, err),
            BufferError::IllegalState { .. } | BufferError::InvalidConfig { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

/// A fault recorded at a byte offset of the stream.
///
/// The consumer sees every byte written before the fault, then the fault
/// itself, then whatever was written after it. [`StreamFault::EndOfStream`]
/// is terminal: nothing after it is ever delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFault {
    /// The producer's source failed.
    Io {
        /// Kind of the original error.
        kind: io::ErrorKind,
        /// Message of the original error.
        message: String,
    },

    /// Payload data was lost; the stream ends here.
    EndOfStream,
}

impl StreamFault {
    /// Returns true if the stream cannot continue past this fault.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl fmt::Display for StreamFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { kind, message } => write!(f, "{kind:?}: {message}"),
            Self::EndOfStream => f.write_str("stream ended early, buffered data was lost"),
        }
    }
}

impl From<&io::Error> for StreamFault {
    fn from(err: &io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<StreamFault> for io::Error {
    fn from(fault: StreamFault) -> Self {
        match fault {
            StreamFault::Io { kind, message } => io::Error::new(kind, message),
            StreamFault::EndOfStream => {
                io::Error::new(io::ErrorKind::UnexpectedEof, StreamFault::EndOfStream.to_string())
            }
        }
    }
}
