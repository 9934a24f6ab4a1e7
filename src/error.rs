//! Unified driver error model
//! --------------------------
//! One error enum for every failure the driver surfaces to the host layer.
//! Nothing here retries: transport failures, state violations and malformed
//! input all abort the current operation and propagate to the caller.

use thiserror::Error;

use crate::transport::TransportError;
use crate::unicode::TranscodeError;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Wire-level failure; carries every diagnostic drained from the
    /// transport's error-info loop.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Operation not valid in the current session state (commit without a
    /// transaction, rollback to an unknown savepoint, ...). These are
    /// programming errors in the calling code, not transient conditions.
    #[error("invalid operation: {0}")]
    InvalidState(String),

    /// Input rejected before any wire traffic was sent.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// A parameter could not be converted to its wire representation.
    #[error("encode error: {0}")]
    Encode(String),

    /// Received column data could not be converted to a host value.
    #[error("decode error: {0}")]
    Decode(String),

    /// UTF-8/UTF-16 conversion failure on a national character value.
    #[error("transcode error: {0}")]
    Transcode(#[from] TranscodeError),
}

impl DriverError {
    pub fn state<S: Into<String>>(msg: S) -> Self {
        DriverError::InvalidState(msg.into())
    }
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        DriverError::Malformed(msg.into())
    }
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        DriverError::Encode(msg.into())
    }
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        DriverError::Decode(msg.into())
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
