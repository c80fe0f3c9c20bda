//! Error taxonomy of the distance engine.
//!
//! Two recoverable failure kinds ([`OriginFailure`]) are expected and
//! frequent: search candidates routinely fail to satisfy parts of a path
//! condition, and handlers turn them into a 0.0 score. Everything in
//! [`SimilarityError`] signals a bug in the upstream clause/origin generation
//! and is fatal for the current evaluation.

use thiserror::Error;

/// Fatal: structurally invalid input or a reflective failure that the path
/// condition's own provenance rules out.
#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("unrecognized origin `{0}`")]
    MalformedOrigin(String),

    #[error("root variable `{0}` not found among candidate inputs")]
    UnknownRoot(String),

    #[error("ill-formed value expression `{0}`")]
    IllFormedValue(String),

    #[error("operands of `{op}` have unsupported types in `{expr}`")]
    OperandTypes { op: String, expr: String },

    #[error("division by zero in `{0}`")]
    DivisionByZero(String),

    #[error("found Any, DefaultValue, or ReferenceArrayImmaterial value `{0}`")]
    UnsupportedValue(String),

    #[error("no constant registered for heap position {0}")]
    MissingConstant(i64),

    #[error("array access with non-integer index `{0}`")]
    NonIntegerIndex(String),

    #[error("reflective access failed: {0}")]
    Reflection(String),

    #[error("parameter list of `{origin}` has {actual} entries, descriptor declares {expected}")]
    ParameterMismatch {
        origin: String,
        expected: usize,
        actual: usize,
    },
}

/// Recoverable: the candidate does not (yet) have the named path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OriginFailure {
    /// The path does not exist in this candidate's object graph (null
    /// receiver, out-of-bounds index, field missing on the runtime type).
    #[error("field is not (yet) present in the candidate")]
    FieldNotInCandidate,

    /// The origin shares a prefix already known to be invalid for this
    /// candidate; no reflective access was attempted.
    #[error("origin depends on invalid field path `{0}`")]
    DependsOnInvalidPath(String),
}

/// Outcome of resolving one origin expression.
#[derive(Debug, Error)]
pub enum OriginError {
    #[error(transparent)]
    Failure(#[from] OriginFailure),
    #[error(transparent)]
    Fatal(#[from] SimilarityError),
}

impl OriginError {
    pub(crate) fn not_in_candidate() -> Self {
        OriginFailure::FieldNotInCandidate.into()
    }
}

/// Errors surfaced by an [`ObjectModel`][crate::model::ObjectModel]
/// implementation. The engine maps these onto its own taxonomy depending on
/// the accessor: a member missing on the candidate's *runtime* type is
/// recoverable, a member the path condition itself named is not.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no such class `{0}`")]
    NoSuchClass(String),

    #[error("no such field `{field}` on `{class}`")]
    NoSuchField { class: String, field: String },

    #[error("no such method `{class}:{descriptor}:{name}`")]
    NoSuchMethod {
        class: String,
        descriptor: String,
        name: String,
    },

    #[error("array index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: i32, len: i32 },

    #[error("value is not an array")]
    NotAnArray,

    #[error("unknown object handle {0}")]
    UnknownObject(u64),

    #[error("method invocation failed: {0}")]
    Invocation(String),
}
