//! Shared identity, time and validation primitives for every entity kind.
//!
//! # Responsibility
//! - Define the opaque identifiers used by all four collections.
//! - Provide the validation error shared by drafts and patches.
//! - Describe default fetch ordering per entity kind.
//!
//! # Invariants
//! - `EntityId` is assigned by the store and never changes afterwards.
//! - `OwnerId` is never blank.
//! - Timestamps are Unix epoch milliseconds.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Stable identifier of one row within its entity kind.
pub type EntityId = Uuid;

/// Identity of the user owning a row.
///
/// Opaque to the core; supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Builds an owner id from provider output.
    ///
    /// Returns `None` when the value is blank after trim.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Returns the current wall-clock instant in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Sort direction for collection fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Placement of rows whose order column is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsPosition {
    First,
    Last,
}

/// Ordering requested from the store for a full collection fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOrder {
    /// Column name; always one of the entity's own columns.
    pub field: &'static str,
    pub direction: SortDirection,
    pub nulls: NullsPosition,
}

impl FetchOrder {
    /// Most recently created rows first.
    pub const fn newest_first() -> Self {
        Self {
            field: "created_at",
            direction: SortDirection::Descending,
            nulls: NullsPosition::Last,
        }
    }
}

/// Local shape error for drafts and patches.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text field is missing or blank.
    MissingField(&'static str),
    /// Email does not have a `local@domain.tld` shape.
    InvalidEmail,
    /// Numeric field is negative, NaN or infinite.
    InvalidAmount { field: &'static str },
    /// Numeric field is outside its closed range.
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        actual: i64,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "required field `{field}` is missing"),
            Self::InvalidEmail => write!(f, "email address is malformed"),
            Self::InvalidAmount { field } => {
                write!(f, "field `{field}` must be a finite non-negative amount")
            }
            Self::OutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(f, "field `{field}` must be within {min}..={max}, got {actual}"),
        }
    }
}

impl Error for ValidationError {}

/// Shape check applied before anything reaches the store.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

pub(crate) fn require_email(value: &str) -> Result<(), ValidationError> {
    require_text("email", value)?;
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

pub(crate) fn require_amount(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidAmount { field });
    }
    Ok(())
}

pub(crate) fn require_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            actual: value,
        });
    }
    Ok(())
}

/// Serde adapter keeping `null` distinct from an absent patch field.
///
/// Absent deserializes to `None` via `#[serde(default)]`; an explicit `null`
/// becomes `Some(None)`.
pub(crate) mod double_option {
    use super::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
