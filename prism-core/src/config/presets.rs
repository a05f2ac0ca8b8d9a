//! Shared parameter presets referenced by multiple stage schemas.
//!
//! Stages that stream tables, draw samples or select rows keep declaring the
//! same handful of parameters. Instead of repeating the literals in every
//! schema, the presets below are merged in with [`SchemaBuilder::extend`]
//! so the defaults live in exactly one place.
//!
//! [`SchemaBuilder::extend`]: super::schema::SchemaBuilder::extend

use once_cell::sync::Lazy;

use super::schema::{ParamKind, ParamSchema};

/// Parameters common to every chunked transform stage.
///
/// `chunk_size` rows are streamed per chunk; `table_group` qualifies where
/// the table lives inside its container (empty means the root); `max_workers`
/// bounds parallel fan-out, with 1 forcing strictly sequential execution.
pub static CHUNKED_PARAMS: Lazy<ParamSchema> = Lazy::new(|| {
    ParamSchema::builder()
        .optional(
            "chunk_size",
            ParamKind::Int,
            10_000i64,
            "number of rows per chunk for streamed processing",
        )
        .optional(
            "table_group",
            ParamKind::Str,
            "",
            "name of the group holding the table inside its container, empty for the root",
        )
        .optional(
            "max_workers",
            ParamKind::Int,
            1i64,
            "upper bound on parallel chunk workers, 1 for sequential execution",
        )
        .build()
        .expect("chunked preset schema is valid")
});

/// Parameters common to sample/creator stages.
pub static SAMPLER_PARAMS: Lazy<ParamSchema> = Lazy::new(|| {
    ParamSchema::builder()
        .required("n_samples", ParamKind::Int, "number of samples to create")
        .optional("seed", ParamKind::Int, 12_345i64, "random number seed")
        .optional(
            "chunk_size",
            ParamKind::Int,
            10_000i64,
            "number of samples generated per chunk",
        )
        .optional(
            "max_workers",
            ParamKind::Int,
            1i64,
            "upper bound on parallel chunk workers, 1 for sequential execution",
        )
        .build()
        .expect("sampler preset schema is valid")
});

/// Parameters defining the shared redshift evaluation grid.
pub static GRID_PARAMS: Lazy<ParamSchema> = Lazy::new(|| {
    ParamSchema::builder()
        .optional("zmin", ParamKind::Float, 0.0, "minimum redshift of the z grid")
        .optional("zmax", ParamKind::Float, 3.0, "maximum redshift of the z grid")
        .optional("nzbins", ParamKind::Int, 301i64, "number of gridpoints in the z grid")
        .build()
        .expect("grid preset schema is valid")
});

/// Parameters for selection-style stages.
///
/// With `drop_rows` set, selected-out rows are removed from the output
/// table; otherwise every row is kept and a flag column marks the selection,
/// preserving the input row count.
pub static SELECTION_PARAMS: Lazy<ParamSchema> = Lazy::new(|| {
    ParamSchema::builder()
        .optional(
            "drop_rows",
            ParamKind::Bool,
            true,
            "drop selected-out rows instead of keeping them with a flag column",
        )
        .build()
        .expect("selection preset schema is valid")
});
