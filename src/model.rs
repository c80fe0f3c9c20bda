//! The object-access capability consumed by the engine.
//!
//! The engine never implements reflection itself: every field read, static
//! read, array access, and method application goes through [`ObjectModel`].
//! A JVM-backed host implements it over native reflection; a host without
//! reflection wires up a generated accessor table such as
//! [`MiniHeap`][crate::heap::MiniHeap].

use std::collections::HashMap;

use crate::error::ModelError;
use crate::value::{ObjRef, Value};

/// Pluggable reflective capability over the candidate's object graph.
///
/// All methods take `&self`: the model is read-mostly from the engine's point
/// of view, although invoked methods may themselves mutate the candidate's
/// object graph behind the handle (the engine does not sandbox such effects;
/// callers must only register methods that are safe to call for evaluation).
pub trait ObjectModel {
    /// Read an instance field. `class_hint` is the declaring class named by
    /// the origin expression, if any; implementations may use it to
    /// disambiguate shadowed fields.
    fn get_field(
        &self,
        obj: ObjRef,
        class_hint: Option<&str>,
        field: &str,
    ) -> Result<Value, ModelError>;

    /// Read a static field. No candidate dependency.
    fn get_static(&self, class: &str, field: &str) -> Result<Value, ModelError>;

    /// Invoke the method named by class, JVM-style descriptor, and name.
    /// For instance methods `args[0]` is the receiver.
    fn invoke(
        &self,
        class: &str,
        descriptor: &str,
        name: &str,
        args: &[Value],
    ) -> Result<Value, ModelError>;

    /// Whether the named method is static (i.e. takes no receiver argument).
    fn is_static_method(
        &self,
        class: &str,
        descriptor: &str,
        name: &str,
    ) -> Result<bool, ModelError>;

    fn array_length(&self, obj: ObjRef) -> Result<i32, ModelError>;

    fn array_get(&self, obj: ObjRef, index: i32) -> Result<Value, ModelError>;

    /// Identity hash of the object behind the handle.
    fn identity_hash(&self, obj: ObjRef) -> i32;

    /// Fully-qualified runtime class name of the object behind the handle.
    fn class_name(&self, obj: ObjRef) -> String;
}

/// Candidate inputs: one entry per root-variable origin appearing anywhere in
/// the clause set, keyed by the literal origin text (e.g. `"{p0}"`).
pub type CandidateInputs = HashMap<String, Value>;

/// Heap-resident string literals the path condition references by position.
pub type Constants = HashMap<i64, String>;

/// Everything needed to resolve origins against one candidate.
///
/// Bundles the borrowed, read-only evaluation inputs so they can be threaded
/// through accessors and handlers as one argument.
#[derive(Copy, Clone)]
pub struct EvalCtx<'a> {
    pub inputs: &'a CandidateInputs,
    pub constants: &'a Constants,
    pub model: &'a dyn ObjectModel,
}
