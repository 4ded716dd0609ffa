//! Error taxonomy shared by every service in this crate.
//!
//! | Variant      | Meaning                                         | Caller action        |
//! |--------------|-------------------------------------------------|----------------------|
//! | `Validation` | Malformed or out-of-range input, per field      | Fix input            |
//! | `NotFound`   | A referenced record does not exist              | Surface directly     |
//! | `Transient`  | Storage or network failure                      | May retry whole call |
//! | `Conflict`   | Update incompatible with the stored record      | Re-read and retry    |

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::repository::RepositoryError;

/// Field-level validation messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single failing field.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    /// `Ok(())` when nothing was recorded, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaxError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Transient(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl TaxError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }
}

impl From<ValidationErrors> for TaxError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<RepositoryError> for TaxError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("Record".to_string()),
            other => Self::Transient(other.to_string()),
        }
    }
}

/// Names the missing record when a repository lookup comes back empty.
pub(crate) trait NotFoundContext<T> {
    fn or_not_found(self, what: impl FnOnce() -> String) -> Result<T, TaxError>;
}

impl<T> NotFoundContext<T> for Result<T, RepositoryError> {
    fn or_not_found(self, what: impl FnOnce() -> String) -> Result<T, TaxError> {
        self.map_err(|err| match err {
            RepositoryError::NotFound => TaxError::NotFound(what()),
            other => other.into(),
        })
    }
}
