use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Highest mark an evaluator can award.
pub const MAX_MARK: u8 = 30;

/// Longest raw input accepted from a mark field.
pub const MAX_INPUT_CHARS: usize = 2;

/// A single evaluator's mark, or the absence sentinel.
///
/// `Numeric(0)` doubles as the "not yet graded" entry: it is what an empty field stores,
/// and it never makes a candidate count as graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    Numeric(u8),
    Absent,
}

impl Default for Mark {
    fn default() -> Self {
        Mark::Numeric(0)
    }
}

impl Mark {
    /// Normalize raw text typed into a mark field.
    pub fn parse_input(raw: &str) -> Result<Self, MarkInputError> {
        let trimmed = raw.trim();
        let length = trimmed.chars().count();
        if length > MAX_INPUT_CHARS {
            return Err(MarkInputError::TooLong {
                input: raw.to_string(),
                length,
            });
        }

        if trimmed.is_empty() {
            return Ok(Mark::Numeric(0));
        }

        if trimmed.eq_ignore_ascii_case("a") || trimmed.eq_ignore_ascii_case("ab") {
            return Ok(Mark::Absent);
        }

        match trimmed.parse::<i32>() {
            Ok(value) => Ok(Mark::Numeric(value.clamp(0, MAX_MARK as i32) as u8)),
            Err(_) => Err(MarkInputError::Unrecognized(raw.to_string())),
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Mark::Absent)
    }

    pub fn is_graded(self) -> bool {
        match self {
            Mark::Numeric(value) => value > 0,
            Mark::Absent => true,
        }
    }

    pub fn numeric(self) -> Option<u8> {
        match self {
            Mark::Numeric(value) => Some(value),
            Mark::Absent => None,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Numeric(value) => write!(f, "{value}"),
            Mark::Absent => f.write_str("Ab"),
        }
    }
}

impl Serialize for Mark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Mark::Numeric(value) => serializer.serialize_u8(*value),
            Mark::Absent => serializer.serialize_str("Ab"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredMark {
    Number(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for Mark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match StoredMark::deserialize(deserializer)? {
            StoredMark::Number(value) => Ok(Mark::Numeric(value.clamp(0, MAX_MARK as i64) as u8)),
            StoredMark::Text(text) => Mark::parse_input(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// Rejection raised at the mark input boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkInputError {
    #[error("mark input '{input}' is {length} characters; at most 2 are allowed")]
    TooLong { input: String, length: usize },
    #[error("mark input '{0}' is neither a number nor an absence marker")]
    Unrecognized(String),
}
