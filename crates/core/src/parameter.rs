//! Letter-tagged code parameters.
//!
//! A [`ParameterValue`] keeps the raw token it was built from alongside a
//! typed [`Value`]. Generic parsing never fails: anything that is not a
//! recognizable number, array or expression is kept as text. The strict
//! `as_*` accessors are where type mismatches surface.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::driver_id::DriverId;
use crate::error::{CodeParseError, ConversionError};

/// Letter used for parameters that have no letter of their own
/// (for example the file name in `M32 "job.gcode"`).
pub const POSITIONAL_LETTER: char = '@';

/// Tag of a parsed parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// Quoted string or uninterpretable text.
    String,
    /// Signed integer.
    Integer,
    /// Finite floating-point number.
    Float,
    /// `:`-separated integers.
    IntegerArray,
    /// `:`-separated numbers, at least one with a decimal point.
    FloatArray,
    /// `{...}` expression, stored uninterpreted.
    Expression,
    /// Single driver ID.
    DriverId,
    /// `:`-separated driver IDs.
    DriverIdArray,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::IntegerArray => "integer array",
            Self::FloatArray => "float array",
            Self::Expression => "expression",
            Self::DriverId => "driver ID",
            Self::DriverIdArray => "driver ID array",
        })
    }
}

/// Typed payload of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Quoted string, quotes and `""` escapes removed.
    String(String),
    /// Unquoted token that matched no numeric form.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// Integer array.
    IntegerArray(Vec<i64>),
    /// Float array.
    FloatArray(Vec<f64>),
    /// Expression text including its braces.
    Expression(String),
    /// Driver ID.
    DriverId(DriverId),
    /// Driver ID array.
    DriverIdArray(Vec<DriverId>),
}

impl Value {
    /// Kind tag of this value. Unquoted text reports as [`ParameterKind::String`].
    pub fn kind(&self) -> ParameterKind {
        match self {
            Value::String(_) | Value::Text(_) => ParameterKind::String,
            Value::Integer(_) => ParameterKind::Integer,
            Value::Float(_) => ParameterKind::Float,
            Value::IntegerArray(_) => ParameterKind::IntegerArray,
            Value::FloatArray(_) => ParameterKind::FloatArray,
            Value::Expression(_) => ParameterKind::Expression,
            Value::DriverId(_) => ParameterKind::DriverId,
            Value::DriverIdArray(_) => ParameterKind::DriverIdArray,
        }
    }

    /// Canonical text of the value without letter or quoting.
    fn canonical_text(&self) -> String {
        match self {
            Value::String(s) | Value::Text(s) | Value::Expression(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::IntegerArray(items) => join(items.iter().map(i64::to_string)),
            Value::FloatArray(items) => join(items.iter().map(|f| format_float(*f))),
            Value::DriverId(id) => id.to_string(),
            Value::DriverIdArray(ids) => join(ids.iter().map(DriverId::to_string)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<DriverId> for Value {
    fn from(v: DriverId) -> Self {
        Value::DriverId(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntegerArray(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatArray(v)
    }
}

impl From<Vec<DriverId>> for Value {
    fn from(v: Vec<DriverId>) -> Self {
        Value::DriverIdArray(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// A parsed parameter of a G/M/T-code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WireParameter", into = "WireParameter")]
pub struct ParameterValue {
    letter: char,
    raw: String,
    value: Value,
}

// ── Construction ────────────────────────────────────────────────────────

impl ParameterValue {
    /// Parse an unquoted token.
    ///
    /// Order of attempts: blank → `Integer(0)`, `{...}` → expression,
    /// `a:b` → integer or float array, then integer, then float. Anything
    /// else is kept as text.
    pub fn parse(letter: char, raw: &str) -> Self {
        Self {
            letter: normalize_letter(letter),
            raw: raw.to_string(),
            value: parse_value(raw),
        }
    }

    /// Build a quoted string parameter from its unescaped content.
    pub fn string(letter: char, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            letter: normalize_letter(letter),
            raw: content.clone(),
            value: Value::String(content),
        }
    }

    /// Build a parameter from an already typed value.
    pub fn new(letter: char, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            letter: normalize_letter(letter),
            raw: value.canonical_text(),
            value,
        }
    }

    /// Reinterpret the raw text as one or more driver IDs.
    ///
    /// Returns a new parameter; `self` is untouched. Expressions are
    /// returned unchanged since their value is only known at run time.
    pub fn to_driver_ids(&self) -> Result<Self, CodeParseError> {
        if let Value::Expression(_) = self.value {
            return Ok(self.clone());
        }
        let mut ids = self
            .raw
            .split(':')
            .map(|segment| DriverId::parse_for(self.letter, segment))
            .collect::<Result<Vec<_>, _>>()?;
        let value = if ids.len() == 1 {
            Value::DriverId(ids.remove(0))
        } else {
            Value::DriverIdArray(ids)
        };
        Ok(Self {
            letter: self.letter,
            raw: self.raw.clone(),
            value,
        })
    }
}

// ── Inspection ──────────────────────────────────────────────────────────

impl ParameterValue {
    /// Parameter letter, or [`POSITIONAL_LETTER`].
    pub fn letter(&self) -> char {
        self.letter
    }

    /// The token this parameter was built from (unescaped content for strings).
    pub fn raw_text(&self) -> &str {
        &self.raw
    }

    /// Typed payload.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Kind tag.
    pub fn kind(&self) -> ParameterKind {
        self.value.kind()
    }

    /// Whether the value was quoted.
    pub fn is_string(&self) -> bool {
        matches!(self.value, Value::String(_))
    }

    /// Whether the value is a `{...}` expression.
    pub fn is_expression(&self) -> bool {
        matches!(self.value, Value::Expression(_))
    }

    /// Whether the value holds driver IDs.
    pub fn is_driver_id(&self) -> bool {
        matches!(self.value, Value::DriverId(_) | Value::DriverIdArray(_))
    }

    /// Raw value text, whatever the kind.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

// ── Strict accessors ────────────────────────────────────────────────────

impl ParameterValue {
    fn conversion_error(&self, target: &'static str) -> ConversionError {
        ConversionError {
            letter: self.letter,
            raw_text: self.raw.clone(),
            target,
        }
    }

    /// Integer value. Driver IDs yield their packed form.
    pub fn as_integer(&self) -> Result<i64, ConversionError> {
        match &self.value {
            Value::Integer(i) => Ok(*i),
            Value::DriverId(id) => Ok(i64::from(id.as_int())),
            _ => Err(self.conversion_error("integer")),
        }
    }

    /// Float value, widening integers.
    pub fn as_float(&self) -> Result<f64, ConversionError> {
        match &self.value {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            _ => Err(self.conversion_error("float")),
        }
    }

    /// Integer array. Scalars become one-element arrays; driver IDs are packed.
    pub fn as_integer_array(&self) -> Result<Vec<i64>, ConversionError> {
        match &self.value {
            Value::IntegerArray(items) => Ok(items.clone()),
            Value::Integer(i) => Ok(vec![*i]),
            Value::DriverId(id) => Ok(vec![i64::from(id.as_int())]),
            Value::DriverIdArray(ids) => Ok(ids.iter().map(|id| i64::from(id.as_int())).collect()),
            _ => Err(self.conversion_error("integer array")),
        }
    }

    /// Float array. Integers are widened and scalars become one-element arrays.
    pub fn as_float_array(&self) -> Result<Vec<f64>, ConversionError> {
        match &self.value {
            Value::FloatArray(items) => Ok(items.clone()),
            Value::IntegerArray(items) => Ok(items.iter().map(|i| *i as f64).collect()),
            Value::Float(f) => Ok(vec![*f]),
            Value::Integer(i) => Ok(vec![*i as f64]),
            Value::DriverId(id) => Ok(vec![f64::from(id.as_int())]),
            Value::DriverIdArray(ids) => Ok(ids.iter().map(|id| f64::from(id.as_int())).collect()),
            _ => Err(self.conversion_error("float array")),
        }
    }

    /// Driver ID. Non-negative integers within 32 bits are unpacked.
    pub fn as_driver_id(&self) -> Result<DriverId, ConversionError> {
        match &self.value {
            Value::DriverId(id) => Ok(*id),
            Value::Integer(i) => packed_driver_id(*i).ok_or_else(|| self.conversion_error("driver ID")),
            _ => Err(self.conversion_error("driver ID")),
        }
    }

    /// Driver ID array. Integer scalars and arrays are unpacked element-wise.
    pub fn as_driver_id_array(&self) -> Result<Vec<DriverId>, ConversionError> {
        let target = "driver ID array";
        match &self.value {
            Value::DriverIdArray(ids) => Ok(ids.clone()),
            Value::DriverId(id) => Ok(vec![*id]),
            Value::Integer(i) => packed_driver_id(*i)
                .map(|id| vec![id])
                .ok_or_else(|| self.conversion_error(target)),
            Value::IntegerArray(items) => items
                .iter()
                .map(|i| packed_driver_id(*i))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| self.conversion_error(target)),
            _ => Err(self.conversion_error(target)),
        }
    }

    /// Legacy truthiness: the raw text read as a number is greater than zero.
    ///
    /// Never fails. Text that is not a number, arrays, and zero are all `false`.
    pub fn as_boolean(&self) -> bool {
        self.raw.trim().parse::<f64>().is_ok_and(|v| v > 0.0)
    }
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        self.letter == other.letter && self.value == other.value
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.letter != POSITIONAL_LETTER {
            write!(f, "{}", self.letter)?;
        }
        // a bare letter (`G28 X`) stays bare
        if self.raw.is_empty() && !matches!(self.value, Value::String(_)) {
            return Ok(());
        }
        match &self.value {
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Value::Text(_) | Value::Expression(_) => f.write_str(&self.raw),
            other => f.write_str(&other.canonical_text()),
        }
    }
}

// ── Wire form ───────────────────────────────────────────────────────────

/// JSON shape of a parameter inside a serialized code.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireParameter {
    letter: String,
    value: serde_json::Value,
    #[serde(default, deserialize_with = "flag")]
    is_string: bool,
    #[serde(default, deserialize_with = "flag")]
    is_driver_id: bool,
}

/// Older servers send `0`/`1` instead of `false`/`true`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => false,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        Some(Flag::Float(f)) => f != 0.0,
    })
}

impl TryFrom<WireParameter> for ParameterValue {
    type Error = String;

    fn try_from(wire: WireParameter) -> Result<Self, Self::Error> {
        let letter = wire.letter.chars().next().unwrap_or(POSITIONAL_LETTER);
        let text = match wire.value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            other => return Err(format!("unsupported value for {letter} parameter: {other}")),
        };
        if wire.is_string {
            Ok(Self::string(letter, text))
        } else if wire.is_driver_id {
            Self::parse(letter, &text)
                .to_driver_ids()
                .map_err(|e| e.to_string())
        } else {
            Ok(Self::parse(letter, &text))
        }
    }
}

impl From<ParameterValue> for WireParameter {
    fn from(param: ParameterValue) -> Self {
        Self {
            letter: param.letter.to_string(),
            is_string: param.is_string(),
            is_driver_id: param.is_driver_id(),
            value: serde_json::Value::String(param.raw),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn normalize_letter(letter: char) -> char {
    letter.to_ascii_uppercase()
}

fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Integer(0);
    }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Value::Expression(trimmed.to_string());
    }
    if trimmed.contains(':') {
        let elements = trimmed.split(':').map(str::trim);
        let parsed = if trimmed.contains('.') {
            elements
                .map(parse_finite_float)
                .collect::<Option<Vec<_>>>()
                .map(Value::FloatArray)
        } else {
            elements
                .map(|e| e.parse::<i64>().ok())
                .collect::<Option<Vec<_>>>()
                .map(Value::IntegerArray)
        };
        return parsed.unwrap_or_else(|| Value::Text(raw.to_string()));
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Integer(i);
    }
    match parse_finite_float(trimmed) {
        Some(f) => Value::Float(f),
        None => Value::Text(raw.to_string()),
    }
}

/// Parse a float, rejecting `inf`/`nan` spellings.
fn parse_finite_float(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn packed_driver_id(value: i64) -> Option<DriverId> {
    u32::try_from(value).ok().map(DriverId::from_int)
}

/// Float text that always reads back as a float.
fn format_float(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(":")
}
