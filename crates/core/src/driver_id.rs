//! Driver identifiers: a `(board, port)` address packed into one integer.
//!
//! Text form is `board.port` (or just `port`, meaning board 0). The packed
//! form stores the board in the upper 16 bits and the port in the lower 16.

use std::fmt;
use std::str::FromStr;

use crate::error::CodeParseError;
use crate::parameter::POSITIONAL_LETTER;

/// Mask applied to each component when parsing or unpacking.
const COMPONENT_MASK: u64 = 0xFFFF;

/// A motor driver address on a given expansion board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverId {
    /// Board number (0 is the main board).
    pub board: u16,
    /// Driver port on that board.
    pub port: u16,
}

impl DriverId {
    /// Build a driver ID from explicit fields.
    pub const fn new(board: u16, port: u16) -> Self {
        Self { board, port }
    }

    /// Unpack a driver ID from its packed integer form.
    pub const fn from_int(value: u32) -> Self {
        Self {
            board: (value >> 16) as u16,
            port: (value & 0xFFFF) as u16,
        }
    }

    /// Packed integer form: `(board << 16) | port`.
    pub const fn as_int(self) -> u32 {
        ((self.board as u32) << 16) | self.port as u32
    }

    /// Parse `board.port` or `port` text.
    ///
    /// Components larger than 16 bits are masked, not rejected. Blank or
    /// non-numeric segments and more than two segments are errors.
    pub fn parse_text(text: &str) -> Result<Self, CodeParseError> {
        Self::parse_for(POSITIONAL_LETTER, text)
    }

    /// Like [`DriverId::parse_text`], attributing failures to `letter`.
    pub(crate) fn parse_for(letter: char, text: &str) -> Result<Self, CodeParseError> {
        let malformed = || CodeParseError::MalformedDriverId {
            letter,
            text: text.to_string(),
        };
        let component = |segment: &str| -> Result<u16, CodeParseError> {
            let value: u64 = segment.trim().parse().map_err(|_| malformed())?;
            Ok((value & COMPONENT_MASK) as u16)
        };

        let mut segments = text.split('.');
        let first = segments.next().unwrap_or_default();
        match (segments.next(), segments.next()) {
            (None, _) => Ok(Self::new(0, component(first)?)),
            (Some(second), None) => Ok(Self::new(component(first)?, component(second)?)),
            (Some(_), Some(_)) => Err(malformed()),
        }
    }
}

impl From<u32> for DriverId {
    fn from(value: u32) -> Self {
        Self::from_int(value)
    }
}

impl From<DriverId> for u32 {
    fn from(id: DriverId) -> Self {
        id.as_int()
    }
}

impl FromStr for DriverId {
    type Err = CodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_text(s)
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.board, self.port)
    }
}
