//! Error handling for TVMKit
//!
//! Provides error types for all layers of the driver:
//! - Connection errors (UDP socket, timeouts)
//! - Controller errors (argument validation, motion timeouts, homing)
//! - Protocol errors (malformed or short datagrams)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents faults on the datagram link to the controller. These are
/// logged and treated as "status unknown" by the polling layers; they are
/// never fatal on their own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// The peer address could not be parsed or resolved
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress {
        /// The address that failed to resolve.
        address: String,
        /// The reason the address is invalid.
        reason: String,
    },

    /// The local socket could not be bound
    #[error("Failed to bind local port {port}: {reason}")]
    BindFailed {
        /// The local port.
        port: u16,
        /// The reason the bind failed.
        reason: String,
    },

    /// Sending a datagram failed
    #[error("Send failed: {reason}")]
    SendFailed {
        /// The reason the send failed.
        reason: String,
    },

    /// No datagram arrived within the read timeout
    #[error("Receive timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Receiving a datagram failed for a reason other than a timeout
    #[error("Receive failed: {reason}")]
    ReceiveFailed {
        /// The reason the receive failed.
        reason: String,
    },

    /// The transport has been shut down
    #[error("Transport closed")]
    Closed,
}

/// Controller error type
///
/// Represents errors raised by motion and actuation commands.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// A caller-supplied argument is out of range. No hardware I/O is
    /// performed when this is returned.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the offending argument.
        reason: String,
    },

    /// The controller never confirmed that motion stopped
    #[error("Motion timeout waiting for {group} to stop after {timeout_ms}ms")]
    MotionTimeout {
        /// The axis group being waited on.
        group: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The operation was cancelled through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Homing could not be completed
    #[error("Homing failed: {reason}")]
    HomingFailed {
        /// The reason the homing cycle failed.
        reason: String,
    },

    /// A command that needs a reply got none
    #[error("No response to {command}")]
    NoResponse {
        /// Name of the command that went unanswered.
        command: String,
    },
}

impl ControllerError {
    /// Shorthand for an [`ControllerError::InvalidArgument`]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Protocol error type
///
/// Raised when a datagram from the controller cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Status datagram shorter than the fixed layout
    #[error("Status message too short: {len} bytes, need at least {required}")]
    StatusTooShort {
        /// Received length.
        len: usize,
        /// Minimum length of the status layout.
        required: usize,
    },

    /// Reply to a command shorter than its layout
    #[error("Response to opcode 0x{opcode:02X} too short: {len} bytes, need {required}")]
    ResponseTooShort {
        /// Opcode of the request.
        opcode: u8,
        /// Received length.
        len: usize,
        /// Required length.
        required: usize,
    },

    /// Reply carries a different opcode than the request
    #[error("Expected reply opcode 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedOpcode {
        /// Opcode of the request.
        expected: u8,
        /// Opcode found in the reply.
        actual: u8,
    },
}

/// Main error type for TVMKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout of any kind
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Controller(ControllerError::MotionTimeout { .. })
                | Error::Connection(ConnectionError::Timeout { .. })
        )
    }

    /// Check if this is an argument validation error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::InvalidArgument { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
