//! Typed command values exchanged with drivers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

/// Declared type of a device resource value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    Bool,
    String,
    Binary,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ValueType {
    pub const ALL: [ValueType; 13] = [
        Self::Bool,
        Self::String,
        Self::Binary,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Float32,
        Self::Float64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::String => "String",
            Self::Binary => "Binary",
            Self::Uint8 => "Uint8",
            Self::Uint16 => "Uint16",
            Self::Uint32 => "Uint32",
            Self::Uint64 => "Uint64",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown value type '{}'", s))
    }
}

// Authority documents are inconsistent about case ("Uint64", "UINT64", "uint64").
impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single typed value produced or consumed by a driver.
///
/// Widths and signedness are preserved end to end; a `Uint8` read is never
/// widened before it reaches the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandValue {
    Bool(bool),
    String(String),
    Binary(Vec<u8>),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl CommandValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::String(_) => ValueType::String,
            Self::Binary(_) => ValueType::Binary,
            Self::Uint8(_) => ValueType::Uint8,
            Self::Uint16(_) => ValueType::Uint16,
            Self::Uint32(_) => ValueType::Uint32,
            Self::Uint64(_) => ValueType::Uint64,
            Self::Int8(_) => ValueType::Int8,
            Self::Int16(_) => ValueType::Int16,
            Self::Int32(_) => ValueType::Int32,
            Self::Int64(_) => ValueType::Int64,
            Self::Float32(_) => ValueType::Float32,
            Self::Float64(_) => ValueType::Float64,
        }
    }

    /// Parse a caller-supplied string into a value of type `value_type`.
    ///
    /// Binary values are expected base64-encoded.
    pub fn parse(value_type: ValueType, raw: &str) -> Result<Self, String> {
        fn num<T: FromStr>(raw: &str) -> Result<T, String>
        where
            T::Err: fmt::Display,
        {
            raw.trim().parse::<T>().map_err(|e| e.to_string())
        }

        Ok(match value_type {
            ValueType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Self::Bool(true),
                "false" => Self::Bool(false),
                other => return Err(format!("'{}' is not a boolean", other)),
            },
            ValueType::String => Self::String(raw.to_string()),
            ValueType::Binary => Self::Binary(
                base64::engine::general_purpose::STANDARD
                    .decode(raw.trim())
                    .map_err(|e| e.to_string())?,
            ),
            ValueType::Uint8 => Self::Uint8(num(raw)?),
            ValueType::Uint16 => Self::Uint16(num(raw)?),
            ValueType::Uint32 => Self::Uint32(num(raw)?),
            ValueType::Uint64 => Self::Uint64(num(raw)?),
            ValueType::Int8 => Self::Int8(num(raw)?),
            ValueType::Int16 => Self::Int16(num(raw)?),
            ValueType::Int32 => Self::Int32(num(raw)?),
            ValueType::Int64 => Self::Int64(num(raw)?),
            ValueType::Float32 => Self::Float32(num(raw)?),
            ValueType::Float64 => Self::Float64(num(raw)?),
        })
    }

    /// Render for a reading. Binary payloads are base64-encoded.
    pub fn to_reading_string(&self) -> String {
        match self {
            Self::Bool(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::Binary(v) => base64::engine::general_purpose::STANDARD.encode(v),
            Self::Uint8(v) => v.to_string(),
            Self::Uint16(v) => v.to_string(),
            Self::Uint32(v) => v.to_string(),
            Self::Uint64(v) => v.to_string(),
            Self::Int8(v) => v.to_string(),
            Self::Int16(v) => v.to_string(),
            Self::Int32(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::Float32(v) => v.to_string(),
            Self::Float64(v) => v.to_string(),
        }
    }
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_reading_string())
    }
}

/// One resource access within a command batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub resource: String,
    /// Attributes copied from the device profile resource
    pub attributes: HashMap<String, String>,
    /// Declared type, when the request was resolved from a profile
    pub value_type: Option<ValueType>,
}

impl CommandRequest {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attributes: HashMap::new(),
            value_type: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
