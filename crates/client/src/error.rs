//! Typed error types for control server connections.

use std::io;
use std::path::PathBuf;

use crate::command::Command;
use crate::connection::ConnectionState;
use crate::init::ConnectionMode;

/// Connection error conditions, categorized by type.
///
/// Each variant carries enough context to produce a helpful error message.
/// Use [`ConnectionError::is_fatal()`] to tell errors that leave the
/// connection unusable from per-command failures.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    // -- Transport --
    /// The control server socket could not be opened.
    #[error("connection failed: {}", path.display())]
    ConnectionFailed {
        /// The socket path that was attempted.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The server closed the connection, or it was closed locally.
    #[error("connection closed")]
    ConnectionClosed,

    /// Writing to the socket failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// Reading from the socket failed.
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),

    // -- Framing --
    /// The byte stream did not contain a well-formed JSON message.
    #[error("malformed message: {details}")]
    MalformedMessage {
        /// Human-readable description of the problem.
        details: String,
    },

    /// A message exceeded the configured size limit.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge {
        /// Bytes read so far for the oversized message.
        size: usize,
        /// Configured maximum in bytes.
        max: usize,
    },

    /// An outgoing message could not be encoded.
    #[error("failed to serialize message: {0}")]
    Serialization(#[source] serde_json::Error),

    /// An incoming message did not have the expected shape.
    #[error("failed to deserialize message: {0}")]
    Deserialization(#[source] serde_json::Error),

    // -- Protocol --
    /// A successful reply carried a `result` of the wrong type.
    ///
    /// The reply was fully read, so the connection stays in step.
    #[error("unexpected command result: {0}")]
    UnexpectedResult(#[source] serde_json::Error),

    /// The server speaks an older protocol than this client requires.
    #[error("incompatible API version (need {required}, got {got})")]
    IncompatibleVersion {
        /// Minimum version this client requires.
        required: u32,
        /// Version announced by the server.
        got: u32,
    },

    /// The server refused the requested connection mode.
    #[error("{mode} mode rejected: {error_type}: {error_message}")]
    ModeRejected {
        /// Mode that was requested.
        mode: ConnectionMode,
        /// Server-side error type.
        error_type: String,
        /// Server-side error message.
        error_message: String,
    },

    /// The server cancelled the command before it completed.
    #[error("task canceled: {message}")]
    TaskCanceled {
        /// Server-provided reason.
        message: String,
    },

    /// The server reported a failure while executing a command.
    #[error("internal server error while executing {}: {error_type}: {error_message}", command.name())]
    InternalServerError {
        /// The command that failed.
        command: Box<Command>,
        /// Server-side error type.
        error_type: String,
        /// Server-side error message.
        error_message: String,
    },

    // -- Misuse --
    /// The operation is not valid in the connection's current state.
    #[error("cannot {operation} while connection is {state}")]
    InvalidState {
        /// What the caller tried to do.
        operation: &'static str,
        /// State the connection was in.
        state: ConnectionState,
    },

    /// An interception call was made out of turn.
    #[error("out of turn: {details}")]
    OutOfTurn {
        /// What was expected instead.
        details: String,
    },
}

impl ConnectionError {
    /// Returns `true` if the connection is closed or unusable after this error.
    ///
    /// Cancellations, server-side command failures, mistyped results and
    /// local misuse leave the connection open.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ConnectionError::TaskCanceled { .. }
                | ConnectionError::InternalServerError { .. }
                | ConnectionError::InvalidState { .. }
                | ConnectionError::OutOfTurn { .. }
                | ConnectionError::Serialization(_)
                | ConnectionError::UnexpectedResult(_)
        )
    }
}
