//! Per-candidate resolution state.
//!
//! A [`CandidateBackbone`] lives for exactly one candidate evaluation and
//! accumulates three tables while handlers run:
//!
//! - resolved values, memoized by origin text;
//! - an identity-to-origin alias table: the first origin that resolved to a
//!   given heap object becomes that object's canonical origin, so later
//!   aliasing clauses can compare "which path first reached this object";
//! - the set of invalid prefixes, fed by handlers whenever a clause fails,
//!   so downstream origins extending a failed path are cut off without
//!   touching the object model.

use std::collections::{HashMap, HashSet};

use log::trace;

use crate::cache::OriginCache;
use crate::error::OriginError;
use crate::model::EvalCtx;
use crate::value::{ObjRef, Value};

#[derive(Default)]
pub struct CandidateBackbone {
    resolved_by_origin: HashMap<String, Value>,
    origin_by_identity: HashMap<ObjRef, String>,
    invalid_prefixes: HashSet<String>,
}

impl CandidateBackbone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an origin against the candidate, memoized.
    ///
    /// On first successful resolution of a heap object the origin is
    /// recorded as the object's canonical origin; later origins resolving to
    /// the same object are aliases and do not overwrite it.
    pub fn resolve_or_visit(
        &mut self,
        origin: &str,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<Value, OriginError> {
        if let Some(value) = self.resolved_by_origin.get(origin) {
            return Ok(value.clone());
        }

        let parsed = cache.parsed_origin(origin)?;
        let value = parsed.resolve(self, ctx, cache)?;
        trace!("resolved `{}` to {}", origin, value);

        self.resolved_by_origin
            .insert(origin.to_string(), value.clone());
        if let Value::Ref(obj) = value {
            self.origin_by_identity
                .entry(obj)
                .or_insert_with(|| origin.to_string());
        }
        Ok(value)
    }

    /// Memoized value of an origin some handler already resolved, if any.
    pub fn value_for_origin(&self, origin: &str) -> Option<&Value> {
        self.resolved_by_origin.get(origin)
    }

    /// Canonical origin of a heap object, i.e. the first origin that
    /// resolved to it during this candidate's evaluation.
    pub fn origin_of(&self, obj: ObjRef) -> Option<&str> {
        self.origin_by_identity.get(&obj).map(String::as_str)
    }

    /// Mark an origin as invalid for this candidate. Origins depending on it
    /// fail fast with `DependsOnInvalidPath` from now on.
    pub fn add_invalid_prefix(&mut self, origin: &str) {
        trace!("invalid prefix: `{}`", origin);
        self.invalid_prefixes.insert(origin.to_string());
    }

    pub fn invalid_prefixes(&self) -> &HashSet<String> {
        &self.invalid_prefixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::{OriginFailure, SimilarityError};
    use crate::heap::MiniHeap;
    use crate::model::{CandidateInputs, Constants, ObjectModel};

    use test_log::test;

    fn list_candidate() -> (MiniHeap, CandidateInputs) {
        // {p0} -> List { head -> Node { value: 5, next: null }, size: 1 }
        let mut heap = MiniHeap::new();
        let node = heap.new_object("demo.Node");
        heap.set_field(node, "value", Value::Int(5));
        heap.set_field(node, "next", Value::Null);
        let list = heap.new_object("demo.List");
        heap.set_field(list, "head", Value::Ref(node));
        heap.set_field(list, "size", Value::Int(1));

        let mut inputs = CandidateInputs::new();
        inputs.insert("{p0}".to_string(), Value::Ref(list));
        (heap, inputs)
    }

    #[test]
    fn test_resolve_field_chain() {
        let (heap, inputs) = list_candidate();
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        let value = backbone
            .resolve_or_visit("{p0}.head.value", &ctx, &cache)
            .unwrap();
        assert_eq!(value, Value::Int(5));
        // Memoized.
        assert_eq!(
            backbone.value_for_origin("{p0}.head.value"),
            Some(&Value::Int(5))
        );
    }

    #[test]
    fn test_first_resolver_wins_identity() {
        let (heap, mut inputs) = list_candidate();
        // {p1} aliases the head node directly.
        let node = heap
            .object_named("demo.Node")
            .expect("node allocated by list_candidate");
        inputs.insert("{p1}".to_string(), Value::Ref(node));
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        backbone.resolve_or_visit("{p0}.head", &ctx, &cache).unwrap();
        backbone.resolve_or_visit("{p1}", &ctx, &cache).unwrap();
        // The first origin to reach the node is canonical.
        assert_eq!(backbone.origin_of(node), Some("{p0}.head"));
    }

    #[test]
    fn test_null_receiver_is_recoverable() {
        let (heap, mut inputs) = list_candidate();
        inputs.insert("{p2}".to_string(), Value::Null);
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        let err = backbone
            .resolve_or_visit("{p2}.head", &ctx, &cache)
            .unwrap_err();
        assert!(matches!(
            err,
            OriginError::Failure(OriginFailure::FieldNotInCandidate)
        ));
    }

    #[test]
    fn test_missing_field_is_recoverable() {
        let (heap, inputs) = list_candidate();
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        let err = backbone
            .resolve_or_visit("{p0}.nonexistent", &ctx, &cache)
            .unwrap_err();
        assert!(matches!(
            err,
            OriginError::Failure(OriginFailure::FieldNotInCandidate)
        ));
    }

    #[test]
    fn test_invalid_prefix_cuts_off_extensions() {
        let (heap, inputs) = list_candidate();
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        backbone.add_invalid_prefix("{p0}.head");
        let err = backbone
            .resolve_or_visit("{p0}.head.value", &ctx, &cache)
            .unwrap_err();
        assert!(matches!(
            err,
            OriginError::Failure(OriginFailure::DependsOnInvalidPath(p)) if p == "{p0}.head"
        ));
        // Unrelated origins still resolve.
        assert_eq!(
            backbone.resolve_or_visit("{p0}.size", &ctx, &cache).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_unknown_root_is_fatal() {
        let (heap, inputs) = list_candidate();
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        let err = backbone
            .resolve_or_visit("{missing}", &ctx, &cache)
            .unwrap_err();
        assert!(matches!(
            err,
            OriginError::Fatal(SimilarityError::UnknownRoot(_))
        ));
    }

    #[test]
    fn test_identity_hash_accessor() {
        let (heap, inputs) = list_candidate();
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        let head = backbone
            .resolve_or_visit("{p0}.head", &ctx, &cache)
            .unwrap()
            .as_obj()
            .unwrap();
        let hash = backbone
            .resolve_or_visit("{p0}.head.<identityHashCode>", &ctx, &cache)
            .unwrap();
        assert_eq!(hash, Value::Int(heap.identity_hash(head)));
    }

    #[test]
    fn test_static_root_and_method_application() {
        let (mut heap, inputs) = list_candidate();
        heap.set_static("demo.Limits", "MAX", Value::Int(100));
        heap.register_method("demo.Math", "(I)I", "twice", true, |args| match args {
            [Value::Int(x)] => Ok(Value::Int(x * 2)),
            _ => Err(crate::error::ModelError::Invocation(
                "expected one int".to_string(),
            )),
        });
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        assert_eq!(
            backbone
                .resolve_or_visit("[demo/Limits:MAX]", &ctx, &cache)
                .unwrap(),
            Value::Int(100)
        );
        assert_eq!(
            backbone
                .resolve_or_visit("<demo/Math:(I)I:twice@{p0}.head.value>", &ctx, &cache)
                .unwrap(),
            Value::Int(10)
        );
    }

    #[test]
    fn test_array_index_expression() {
        let mut heap = MiniHeap::new();
        let arr = heap.new_array(
            "[I",
            vec![Value::Int(7), Value::Int(8), Value::Int(9)],
        );
        let holder = heap.new_object("demo.Buf");
        heap.set_field(holder, "data", Value::Ref(arr));
        heap.set_field(holder, "size", Value::Int(3));
        let mut inputs = CandidateInputs::new();
        inputs.insert("{p0}".to_string(), Value::Ref(holder));
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let mut backbone = CandidateBackbone::new();
        let cache = OriginCache::new();

        assert_eq!(
            backbone
                .resolve_or_visit("{p0}.data.length", &ctx, &cache)
                .unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            backbone
                .resolve_or_visit("{p0}.data[1]", &ctx, &cache)
                .unwrap(),
            Value::Int(8)
        );
        // Index computed from another origin of the same candidate.
        assert_eq!(
            backbone
                .resolve_or_visit("{p0}.data[({p0}.size)-(1)]", &ctx, &cache)
                .unwrap(),
            Value::Int(9)
        );
        // Out of bounds is recoverable.
        let err = backbone
            .resolve_or_visit("{p0}.data[3]", &ctx, &cache)
            .unwrap_err();
        assert!(matches!(
            err,
            OriginError::Failure(OriginFailure::FieldNotInCandidate)
        ));
    }

    #[test]
    fn test_accessors_build_lazily_and_persist() {
        let (heap, inputs) = list_candidate();
        let constants = Constants::new();
        let ctx = EvalCtx {
            inputs: &inputs,
            constants: &constants,
            model: &heap,
        };
        let cache = OriginCache::new();

        let parsed = cache.parsed_origin("{p0}.head.value").unwrap();
        assert_eq!(parsed.built_accessors(), 0);

        let mut backbone = CandidateBackbone::new();
        backbone
            .resolve_or_visit("{p0}.head.value", &ctx, &cache)
            .unwrap();
        assert_eq!(parsed.built_accessors(), 3);

        // A second candidate reuses the built accessors.
        let mut backbone = CandidateBackbone::new();
        backbone
            .resolve_or_visit("{p0}.head.value", &ctx, &cache)
            .unwrap();
        assert_eq!(parsed.built_accessors(), 3);
    }
}
