//! Stage configuration: declared schemas, shared presets and resolution.
//!
//! Every stage declares its keyword surface as an explicit [`ParamSchema`]
//! rather than accepting arbitrary key/value pairs. Resolution applies
//! caller overrides on top of schema defaults, rejects unknown keys and
//! reports every violation in one pass, producing an immutable [`Config`]
//! before any computation starts.

pub mod presets;
pub mod resolver;
pub mod schema;

pub use presets::{CHUNKED_PARAMS, GRID_PARAMS, SAMPLER_PARAMS, SELECTION_PARAMS};
pub use resolver::{Config, ConfigViolation, ConfigViolations};
pub use schema::{ParamKind, ParamSchema, ParamSpec, ParamValue, SchemaBuilder};
