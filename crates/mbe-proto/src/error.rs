//! Errors surfaced by connections and sessions

use thiserror::Error;

use crate::codec::CodecError;
use crate::protocol::ProtocolError;
use crate::transport::TransportError;

/// Errors from a request/response exchange with the ECU
///
/// Nothing in this crate retries on its own. [`MbeError::is_retriable`]
/// tells the caller whether reopening the connection is worth a try.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MbeError {
    /// Message empty or larger than 4095 bytes; rejected before any I/O
    #[error("Invalid message size: {0}")]
    Size(usize),

    /// Bus-level failure (open, send or receive)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Unrecognized frame type nibble during reassembly
    #[error("Bad frame type: 0x{0:X}")]
    BadFrameType(u8),

    /// Response did not carry the expected prefix
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No complete response before the deadline
    #[error("Timeout waiting for ECU response")]
    Timeout,
}

impl MbeError {
    /// Whether reopening the connection and trying again may help
    pub fn is_retriable(&self) -> bool {
        match self {
            MbeError::Transport(
                TransportError::Unsupported(_) | TransportError::InvalidConfig(_),
            ) => false,
            MbeError::Transport(_) | MbeError::Timeout => true,
            _ => false,
        }
    }
}

impl From<CodecError> for MbeError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Size(size) => MbeError::Size(size),
            CodecError::BadFrameType(nibble) => MbeError::BadFrameType(nibble),
        }
    }
}

/// Result type for ECU exchanges
pub type MbeResult<T> = Result<T, MbeError>;
