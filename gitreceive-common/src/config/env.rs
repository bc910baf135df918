//! Environment variable parsing with type safety.
//!
//! Collects errors during parsing so all issues can be reported at once.

use super::source::Sourced;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Value out of valid range.
    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    /// Value is present but empty.
    #[error("{var} is set but empty")]
    Empty { var: String },
}

type Lookup = Box<dyn Fn(&str) -> Option<String>>;

/// Type-safe environment variable parser for `GITRECEIVE_*` variables.
pub struct EnvParser {
    prefix: &'static str,
    lookup: Lookup,
    errors: Vec<EnvError>,
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvParser {
    /// Create a parser reading the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|var| std::env::var(var).ok())
    }

    /// Create a parser reading from `lookup` instead of the environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + 'static,
    {
        Self {
            prefix: "GITRECEIVE_",
            lookup: Box::new(lookup),
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Get a non-empty string, if set.
    pub fn get_string(&mut self, name: &str) -> Option<Sourced<String>> {
        let var_name = self.var_name(name);
        match (self.lookup)(&var_name) {
            Some(value) if value.trim().is_empty() => {
                self.errors.push(EnvError::Empty { var: var_name });
                None
            }
            Some(value) => Some(Sourced::from_env(value, var_name)),
            None => None,
        }
    }

    /// Get a path, expanding `~` and `$VAR`.
    pub fn get_path(&mut self, name: &str) -> Option<Sourced<PathBuf>> {
        let raw = self.get_string(name)?;
        match shellexpand::full(&raw.value) {
            Ok(expanded) => Some(Sourced {
                value: PathBuf::from(expanded.as_ref()),
                source: raw.source,
            }),
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: self.var_name(name),
                    expected: "path".to_string(),
                    value: raw.value,
                });
                None
            }
        }
    }

    /// Get an i32 within `min..=max`, if set.
    pub fn get_i32_range(&mut self, name: &str, min: i32, max: i32) -> Option<Sourced<i32>> {
        let raw = self.get_string(name)?;
        let var_name = self.var_name(name);
        match raw.value.trim().parse::<i32>() {
            Ok(n) if (min..=max).contains(&n) => Some(Sourced::from_env(n, var_name)),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "signed 32-bit integer".to_string(),
                    value: raw.value,
                });
                None
            }
        }
    }
}
