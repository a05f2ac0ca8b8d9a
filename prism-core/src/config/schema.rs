//! Declared parameter schemas for stage configuration.
//!
//! A stage declares its configuration surface as a [`ParamSchema`]: an
//! ordered set of named parameters, each either required (the caller must
//! supply a value) or optional (the schema carries a default). The builder
//! API makes an optional parameter without a default unrepresentable, so a
//! schema that could leave values unresolved cannot be defined.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{PrismError, Result};

/// A configuration value.
///
/// Integer values are accepted where a float is declared and promoted at
/// resolution time; all other kinds match exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParamValue {
    /// An integer parameter value.
    Int(i64),
    /// A floating-point parameter value.
    Float(f64),
    /// A boolean parameter value.
    Bool(bool),
    /// A string parameter value.
    Str(String),
    /// A list of strings (e.g., column names).
    StrList(Vec<String>),
    /// A list of floats (e.g., magnitude limits).
    FloatList(Vec<f64>),
}

impl ParamValue {
    /// Returns a short name for the value's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "bool",
            ParamValue::Str(_) => "str",
            ParamValue::StrList(_) => "list[str]",
            ParamValue::FloatList(_) => "list[float]",
        }
    }

    /// Returns the integer value, if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float value; integers are promoted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the string-list value, if this is a `StrList`.
    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::StrList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Returns the float-list value, if this is a `FloatList`.
    pub fn as_float_list(&self) -> Option<&[f64]> {
        match self {
            ParamValue::FloatList(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Str(v) => write!(f, "{v}"),
            ParamValue::StrList(v) => write!(f, "{v:?}"),
            ParamValue::FloatList(v) => write!(f, "{v:?}"),
        }
    }
}

/// The declared kind of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamKind {
    /// An integer.
    Int,
    /// A float; integer values are promoted.
    Float,
    /// A boolean.
    Bool,
    /// An arbitrary string.
    Str,
    /// A list of strings.
    StrList,
    /// A list of floats.
    FloatList,
    /// A string restricted to an enumerated option set.
    Enum {
        /// The allowed values.
        options: Vec<String>,
    },
}

impl ParamKind {
    /// Checks a value against this kind.
    ///
    /// Returns the (possibly promoted) value on success. On failure returns
    /// `None` for a plain type mismatch; enumeration misses are reported by
    /// the resolver separately so they can name the allowed options.
    pub(crate) fn coerce(&self, value: &ParamValue) -> Option<ParamValue> {
        match (self, value) {
            (ParamKind::Int, ParamValue::Int(_))
            | (ParamKind::Float, ParamValue::Float(_))
            | (ParamKind::Bool, ParamValue::Bool(_))
            | (ParamKind::Str, ParamValue::Str(_))
            | (ParamKind::StrList, ParamValue::StrList(_))
            | (ParamKind::FloatList, ParamValue::FloatList(_)) => Some(value.clone()),
            (ParamKind::Float, ParamValue::Int(v)) => Some(ParamValue::Float(*v as f64)),
            (ParamKind::Enum { options }, ParamValue::Str(s)) if options.contains(s) => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    /// Whether a value is at least of the right base type for this kind.
    ///
    /// Used to distinguish "wrong type" from "valid type, invalid option".
    pub(crate) fn base_type_matches(&self, value: &ParamValue) -> bool {
        match self {
            ParamKind::Enum { .. } => matches!(value, ParamValue::Str(_)),
            _ => self.coerce(value).is_some(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Int => write!(f, "int"),
            ParamKind::Float => write!(f, "float"),
            ParamKind::Bool => write!(f, "bool"),
            ParamKind::Str => write!(f, "str"),
            ParamKind::StrList => write!(f, "list[str]"),
            ParamKind::FloatList => write!(f, "list[float]"),
            ParamKind::Enum { options } => write!(f, "enum{options:?}"),
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    kind: ParamKind,
    required: bool,
    default: Option<ParamValue>,
    help: String,
}

impl ParamSpec {
    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared kind.
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// Whether the caller must supply a value.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The default applied when the caller omits the key.
    ///
    /// `None` exactly when the parameter is required.
    pub fn default(&self) -> Option<&ParamValue> {
        self.default.as_ref()
    }

    /// The one-line description of the parameter.
    pub fn help(&self) -> &str {
        &self.help
    }
}

/// An ordered set of declared parameters.
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
    index: HashMap<String, usize>,
}

impl ParamSchema {
    /// Starts building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns an empty schema.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    /// Whether the schema declares the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates the parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter()
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the schema declares no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Builder for [`ParamSchema`].
///
/// `build` validates the accumulated declarations: duplicate names, defaults
/// that do not match their declared kind, and empty enumerations are all
/// rejected with [`PrismError::Schema`] at definition time, before any stage
/// runs.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    params: Vec<ParamSpec>,
}

impl SchemaBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required parameter; the caller must supply a value.
    pub fn required(mut self, name: &str, kind: ParamKind, help: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
            help: help.to_string(),
        });
        self
    }

    /// Declares an optional parameter with a default.
    pub fn optional(
        mut self,
        name: &str,
        kind: ParamKind,
        default: impl Into<ParamValue>,
        help: &str,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            required: false,
            default: Some(default.into()),
            help: help.to_string(),
        });
        self
    }

    /// Merges every parameter of a shared preset into this schema.
    pub fn extend(mut self, preset: &ParamSchema) -> Self {
        self.params.extend(preset.params().cloned());
        self
    }

    /// Validates the declarations and produces the schema.
    pub fn build(self) -> Result<ParamSchema> {
        let mut index = HashMap::with_capacity(self.params.len());
        for (i, spec) in self.params.iter().enumerate() {
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(PrismError::schema(format!(
                    "parameter '{}' is declared more than once",
                    spec.name
                )));
            }
            if let ParamKind::Enum { options } = &spec.kind {
                if options.is_empty() {
                    return Err(PrismError::schema(format!(
                        "parameter '{}' declares an empty option set",
                        spec.name
                    )));
                }
            }
            if let Some(default) = &spec.default {
                if spec.kind.coerce(default).is_none() {
                    return Err(PrismError::schema(format!(
                        "default for parameter '{}' is {} but the declared kind is {}",
                        spec.name,
                        default.kind_name(),
                        spec.kind
                    )));
                }
            }
        }
        Ok(ParamSchema {
            params: self.params,
            index,
        })
    }
}
