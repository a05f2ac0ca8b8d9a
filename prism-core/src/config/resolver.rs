//! Resolution of caller-supplied keyword values against a declared schema.
//!
//! Resolution is pure: it performs no I/O and triggers no computation. It
//! walks the schema once, collecting every violation it finds, and either
//! returns an immutable [`Config`] or a [`PrismError::Config`] listing all
//! of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PrismError, Result};

use super::schema::{ParamSchema, ParamValue};

/// A single schema violation found during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigViolation {
    /// The caller supplied a key the schema does not declare.
    UnknownKey {
        /// The unrecognized key.
        key: String,
    },
    /// A required key was not supplied.
    MissingRequired {
        /// The missing key.
        key: String,
    },
    /// A supplied value has the wrong type.
    TypeMismatch {
        /// The offending key.
        key: String,
        /// The declared kind.
        expected: String,
        /// The kind of the supplied value.
        found: String,
    },
    /// A supplied value is outside the enumerated option set.
    InvalidOption {
        /// The offending key.
        key: String,
        /// The rejected value.
        value: String,
        /// The allowed options.
        options: Vec<String>,
    },
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigViolation::UnknownKey { key } => write!(f, "unknown parameter '{key}'"),
            ConfigViolation::MissingRequired { key } => {
                write!(f, "missing required parameter '{key}'")
            }
            ConfigViolation::TypeMismatch {
                key,
                expected,
                found,
            } => write!(f, "parameter '{key}' expects {expected}, got {found}"),
            ConfigViolation::InvalidOption {
                key,
                value,
                options,
            } => write!(
                f,
                "parameter '{key}' must be one of {options:?}, got '{value}'"
            ),
        }
    }
}

/// The full set of violations found in one resolution pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigViolations(pub Vec<ConfigViolation>);

impl ConfigViolations {
    /// Number of violations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there were no violations.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the violations in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigViolation> {
        self.0.iter()
    }
}

impl fmt::Display for ConfigViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for violation in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
            first = false;
        }
        Ok(())
    }
}

/// A resolved, immutable stage configuration.
///
/// Every declared parameter has a concrete value: caller-supplied overrides
/// where given, schema defaults otherwise. There is no mutation API; a stage
/// that needs a different configuration is reconstructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    values: BTreeMap<String, ParamValue>,
}

impl Config {
    /// Resolves caller-supplied values against a schema.
    ///
    /// Collects every violation in one pass: unknown keys, missing required
    /// keys, type mismatches and out-of-enumeration values. Integer values
    /// are promoted where the schema declares a float.
    ///
    /// # Errors
    ///
    /// [`PrismError::Config`] listing all violations found.
    pub fn resolve(
        schema: &ParamSchema,
        overrides: impl IntoIterator<Item = (String, ParamValue)>,
    ) -> Result<Self> {
        let mut supplied: BTreeMap<String, ParamValue> = overrides.into_iter().collect();
        let mut violations = Vec::new();
        let mut values = BTreeMap::new();

        for spec in schema.params() {
            match supplied.remove(spec.name()) {
                Some(value) => match spec.kind().coerce(&value) {
                    Some(coerced) => {
                        values.insert(spec.name().to_string(), coerced);
                    }
                    None => {
                        if let super::schema::ParamKind::Enum { options } = spec.kind() {
                            if spec.kind().base_type_matches(&value) {
                                violations.push(ConfigViolation::InvalidOption {
                                    key: spec.name().to_string(),
                                    value: value.to_string(),
                                    options: options.clone(),
                                });
                                continue;
                            }
                        }
                        violations.push(ConfigViolation::TypeMismatch {
                            key: spec.name().to_string(),
                            expected: spec.kind().to_string(),
                            found: value.kind_name().to_string(),
                        });
                    }
                },
                None => {
                    if let Some(default) = spec.default() {
                        values.insert(spec.name().to_string(), default.clone());
                    } else {
                        violations.push(ConfigViolation::MissingRequired {
                            key: spec.name().to_string(),
                        });
                    }
                }
            }
        }

        for key in supplied.into_keys() {
            violations.push(ConfigViolation::UnknownKey { key });
        }

        if violations.is_empty() {
            Ok(Config { values })
        } else {
            Err(PrismError::Config {
                violations: ConfigViolations(violations),
            })
        }
    }

    /// Looks up a resolved value.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// Returns an integer parameter.
    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.get(key)
            .and_then(ParamValue::as_i64)
            .ok_or_else(|| missing(key, "int"))
    }

    /// Returns a float parameter; integers were promoted at resolution.
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.get(key)
            .and_then(ParamValue::as_f64)
            .ok_or_else(|| missing(key, "float"))
    }

    /// Returns a boolean parameter.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
            .and_then(ParamValue::as_bool)
            .ok_or_else(|| missing(key, "bool"))
    }

    /// Returns a string parameter.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.get(key)
            .and_then(ParamValue::as_str)
            .ok_or_else(|| missing(key, "str"))
    }

    /// Returns a string-list parameter.
    pub fn get_str_list(&self, key: &str) -> Result<&[String]> {
        self.get(key)
            .and_then(ParamValue::as_str_list)
            .ok_or_else(|| missing(key, "list[str]"))
    }

    /// Returns a float-list parameter.
    pub fn get_float_list(&self, key: &str) -> Result<&[f64]> {
        self.get(key)
            .and_then(ParamValue::as_float_list)
            .ok_or_else(|| missing(key, "list[float]"))
    }

    /// Iterates the resolved keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of resolved parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameters are resolved.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn missing(key: &str, kind: &str) -> PrismError {
    PrismError::internal(format!(
        "config key '{key}' is missing or is not declared as {kind}"
    ))
}
