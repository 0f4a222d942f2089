//! Data model for the Duet Software Framework control server API.
//!
//! Provides letter-tagged code parameters ([`ParameterValue`]), packed
//! driver addresses ([`DriverId`]), and parsed machine statements
//! ([`Code`]) with canonical text rendering. The main entry points are
//! [`ParameterValue::parse`] and [`Code::parse`].
//!
//! Nothing here performs I/O; the wire protocol lives in `dsfapi_client`.

#![warn(missing_docs)]

/// Code channels.
pub mod channel;
/// Parsed G/M/T-codes, keywords and comments.
pub mod code;
/// Packed `(board, port)` driver addresses.
pub mod driver_id;
/// Parse and conversion errors.
pub mod error;
/// Result messages.
pub mod message;
/// Letter-tagged parameter values.
pub mod parameter;

mod parser;

// ── Convenience re-exports ──────────────────────────────────────────────────

pub use channel::{CodeChannel, UnknownChannel};
pub use code::{Code, CodeFlags, CodeType, KeywordType, StatementKind};
pub use driver_id::DriverId;
pub use error::{CodeParseError, ConversionError};
pub use message::{CodeResult, Message, MessageType};
pub use parameter::{POSITIONAL_LETTER, ParameterKind, ParameterValue, Value};
