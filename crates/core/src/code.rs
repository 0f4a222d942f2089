//! Parsed G/M/T-codes, keyword statements, and comments.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::channel::CodeChannel;
use crate::error::CodeParseError;
use crate::message::CodeResult;
use crate::parameter::{ParameterValue, Value};

/// Instruction letter of a code, or comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeType {
    /// Whole-line comment.
    #[default]
    #[serde(rename = "Q", alias = "C")]
    Comment,
    /// G-code.
    #[serde(rename = "G")]
    GCode,
    /// M-code.
    #[serde(rename = "M")]
    MCode,
    /// T-code.
    #[serde(rename = "T")]
    TCode,
}

impl CodeType {
    /// Instruction letter (`Q` for comments).
    pub fn letter(self) -> char {
        match self {
            CodeType::Comment => 'Q',
            CodeType::GCode => 'G',
            CodeType::MCode => 'M',
            CodeType::TCode => 'T',
        }
    }

    pub(crate) fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'G' => Some(CodeType::GCode),
            'M' => Some(CodeType::MCode),
            'T' => Some(CodeType::TCode),
            _ => None,
        }
    }
}

/// Conditional and control-flow keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum KeywordType {
    /// Not a keyword statement.
    #[default]
    None = 0,
    If = 1,
    ElseIf = 2,
    Else = 3,
    While = 4,
    Break = 5,
    Return = 6,
    Abort = 7,
    Var = 8,
    Set = 9,
    Echo = 10,
    Continue = 11,
    Global = 12,
}

impl KeywordType {
    const NAMED: [KeywordType; 12] = [
        KeywordType::If,
        KeywordType::ElseIf,
        KeywordType::Else,
        KeywordType::While,
        KeywordType::Break,
        KeywordType::Return,
        KeywordType::Abort,
        KeywordType::Var,
        KeywordType::Set,
        KeywordType::Echo,
        KeywordType::Continue,
        KeywordType::Global,
    ];

    /// Source token (`elif` for [`KeywordType::ElseIf`], empty for `None`).
    pub fn as_str(self) -> &'static str {
        match self {
            KeywordType::None => "",
            KeywordType::If => "if",
            KeywordType::ElseIf => "elif",
            KeywordType::Else => "else",
            KeywordType::While => "while",
            KeywordType::Break => "break",
            KeywordType::Return => "return",
            KeywordType::Abort => "abort",
            KeywordType::Var => "var",
            KeywordType::Set => "set",
            KeywordType::Echo => "echo",
            KeywordType::Continue => "continue",
            KeywordType::Global => "global",
        }
    }

    /// Case-insensitive keyword lookup.
    pub fn from_token(token: &str) -> Option<Self> {
        KeywordType::NAMED
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for KeywordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Classification bits of a code.
    ///
    /// Bits not named here are kept as received.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct CodeFlags: u32 {
        /// Finished as soon as it enters the code queue.
        const ASYNCHRONOUS = 1;
        /// Already seen by pre-processing interceptors.
        const IS_PRE_PROCESSED = 1 << 1;
        /// Already seen by post-processing interceptors.
        const IS_POST_PROCESSED = 1 << 2;
        /// Comes from a macro file.
        const IS_FROM_MACRO = 1 << 3;
        /// Comes from a nested system macro.
        const IS_NESTED_MACRO = 1 << 4;
        /// Comes from `config.g`.
        const IS_FROM_CONFIG = 1 << 5;
        /// Comes from `config-override.g`.
        const IS_FROM_CONFIG_OVERRIDE = 1 << 6;
        /// Prefixed with `G53`.
        const ENFORCE_ABSOLUTE_POSITION = 1 << 7;
        /// Jumps all queued codes.
        const IS_PRIORITIZED = 1 << 8;
        /// Bypasses all buffers.
        const UNBUFFERED = 1 << 9;
        /// Requested by the firmware.
        const IS_FROM_FIRMWARE = 1 << 10;
        /// Last code on its line.
        const IS_LAST_CODE = 1 << 11;
    }
}

impl Serialize for CodeFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for CodeFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(CodeFlags::from_bits_retain)
    }
}

/// What a [`Code`] actually is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Whole-line comment.
    Comment,
    /// Conditional or control-flow keyword.
    Keyword(KeywordType),
    /// G/M/T instruction.
    Instruction(CodeType),
}

/// A parsed machine statement.
///
/// Serializes to the camelCase object the control server exchanges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Code {
    /// Connection the code came from (0 for internal tasks). Set by the server.
    #[serde(default)]
    pub source_connection: i64,
    /// Messages from execution; empty until the code has finished.
    #[serde(default)]
    pub result: CodeResult,
    /// Instruction letter.
    #[serde(rename = "type")]
    pub code_type: CodeType,
    /// Channel the code runs on.
    #[serde(default)]
    pub channel: CodeChannel,
    /// `N` line number.
    #[serde(default)]
    pub line_number: Option<i64>,
    /// Leading whitespace count.
    #[serde(default)]
    pub indent: u8,
    /// Keyword of a conditional statement.
    #[serde(default)]
    pub keyword: KeywordType,
    /// Everything after the keyword.
    #[serde(default)]
    pub keyword_argument: Option<String>,
    /// Major number (`28` in `G28`). Negative only for `T-1`.
    #[serde(default)]
    pub major_number: Option<i64>,
    /// Minor number (`3` in `G54.3`).
    #[serde(default)]
    pub minor_number: Option<u32>,
    /// Classification bits.
    #[serde(default)]
    pub flags: CodeFlags,
    /// Comment text, without its `;` or parentheses.
    #[serde(default)]
    pub comment: Option<String>,
    /// Byte offset in the source file.
    #[serde(default)]
    pub file_position: Option<i64>,
    /// Length of the source text in bytes.
    #[serde(default)]
    pub length: Option<i64>,
    /// Parameters, in source order.
    #[serde(default)]
    pub parameters: Vec<ParameterValue>,
}

// ── Construction ────────────────────────────────────────────────────────

impl Code {
    /// An instruction such as `G1` or `M115`, with no parameters yet.
    pub fn instruction(code_type: CodeType, major: i64) -> Self {
        Self {
            code_type,
            major_number: Some(major),
            ..Self::default()
        }
    }

    /// A whole-line comment.
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            comment: Some(text.into()),
            ..Self::default()
        }
    }

    /// A keyword statement with an optional argument.
    pub fn keyword(keyword: KeywordType, argument: Option<String>) -> Self {
        Self {
            keyword,
            keyword_argument: argument,
            ..Self::default()
        }
    }

    /// Append a parameter (builder style).
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterValue) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set the channel (builder style).
    #[must_use]
    pub fn on_channel(mut self, channel: CodeChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Parse one line of code text.
    pub fn parse(line: &str) -> Result<Self, CodeParseError> {
        crate::parser::parse_line(line)
    }
}

impl FromStr for Code {
    type Err = CodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Code::parse(s)
    }
}

// ── Queries ─────────────────────────────────────────────────────────────

impl Code {
    /// Keyword, comment, or instruction. A keyword wins over the code type.
    pub fn statement_kind(&self) -> StatementKind {
        if self.keyword != KeywordType::None {
            StatementKind::Keyword(self.keyword)
        } else if self.code_type == CodeType::Comment {
            StatementKind::Comment
        } else {
            StatementKind::Instruction(self.code_type)
        }
    }

    /// First parameter with the given letter (case-insensitive).
    pub fn parameter(&self, letter: char) -> Option<&ParameterValue> {
        let letter = letter.to_ascii_uppercase();
        self.parameters
            .iter()
            .find(|p| p.letter().to_ascii_uppercase() == letter)
    }

    /// The parameter with the given letter, or one built from `default`.
    pub fn parameter_or(&self, letter: char, default: impl Into<Value>) -> ParameterValue {
        self.parameter(letter)
            .cloned()
            .unwrap_or_else(|| ParameterValue::new(letter, default))
    }

    /// Whether a parameter with the given letter exists.
    pub fn has_parameter(&self, letter: char) -> bool {
        self.parameter(letter).is_some()
    }

    /// Whether the major number is present and equal to `number`.
    pub fn is_major_number(&self, number: i64) -> bool {
        self.major_number == Some(number)
    }

    /// Whether any bit of `flag` is set.
    pub fn has_flag(&self, flag: CodeFlags) -> bool {
        self.flags.intersects(flag)
    }

    /// Command portion only: `G28`, `G54.3`, `elif`, or `(comment)`.
    pub fn short_str(&self) -> String {
        if self.keyword != KeywordType::None {
            return self.keyword.as_str().to_string();
        }
        if self.code_type == CodeType::Comment {
            return "(comment)".to_string();
        }
        let prefix = if self.has_flag(CodeFlags::ENFORCE_ABSOLUTE_POSITION) {
            "G53 "
        } else {
            ""
        };
        let letter = self.code_type.letter();
        match (self.major_number, self.minor_number) {
            (Some(major), Some(minor)) => format!("{prefix}{letter}{major}.{minor}"),
            (Some(major), None) => format!("{prefix}{letter}{major}"),
            (None, _) => format!("{prefix}{letter}"),
        }
    }

    /// Parameters rejoined as one string, for codes that take free text
    /// (`M117 Hello world`). With `quote`, string parameters are re-quoted.
    ///
    /// Every letter is written as stored, so a positional parameter keeps
    /// its `@`.
    pub fn unprecedented_string(&self, quote: bool) -> String {
        self.parameters
            .iter()
            .map(|p| {
                let letter = p.letter();
                if quote && p.is_string() {
                    format!("{letter}\"{}\"", p.raw_text())
                } else {
                    format!("{letter}{}", p.raw_text())
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Code {
    /// Canonical statement text. Execution results are not included.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.statement_kind() {
            StatementKind::Keyword(keyword) => match self.keyword_argument.as_deref() {
                Some(arg) if !arg.is_empty() => write!(f, "{keyword} {arg}"),
                _ => write!(f, "{keyword}"),
            },
            StatementKind::Comment => write!(f, ";{}", self.comment.as_deref().unwrap_or("")),
            StatementKind::Instruction(_) => {
                f.write_str(&self.short_str())?;
                for parameter in &self.parameters {
                    write!(f, " {parameter}")?;
                }
                if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
                    write!(f, " ;{comment}")?;
                }
                Ok(())
            }
        }
    }
}
