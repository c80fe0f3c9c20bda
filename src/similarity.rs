//! Per-clause similarity handlers.
//!
//! A path condition compiles into one handler per clause. Each handler
//! scores one candidate in `[0, 1]`: 1.0 for a satisfied clause, 0.0 for a
//! hard miss, and a fractional score when the candidate is lexically or
//! numerically close to satisfying it. Handlers run in clause order and
//! share one [`CandidateBackbone`], so an early miss poisons the paths that
//! depend on it.
//!
//! Recoverable origin failures become 0.0 scores here; only
//! [`SimilarityError`] escapes to the caller.

use log::debug;

use crate::backbone::CandidateBackbone;
use crate::cache::OriginCache;
use crate::error::{OriginError, OriginFailure, SimilarityError};
use crate::model::EvalCtx;
use crate::strdist::{edge_distance, inverse_distance_exp, inverse_distance_ratio};
use crate::value::Value;

pub trait ClauseSimilarityHandler {
    /// Score one candidate against this clause.
    fn evaluate(
        &self,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<f64, SimilarityError>;
}

/// Resolve `origin` and score its value, with the shared failure protocol:
/// a path missing from the candidate scores 0.0 and invalidates the origin,
/// a path depending on an already-invalid prefix scores 0.0 without marking
/// anything, and any non-perfect score invalidates the origin for the
/// clauses still to come.
fn evaluate_with_ref<F>(
    origin: &str,
    backbone: &mut CandidateBackbone,
    ctx: &EvalCtx<'_>,
    cache: &OriginCache,
    score: F,
) -> Result<f64, SimilarityError>
where
    F: FnOnce(&CandidateBackbone, &Value) -> f64,
{
    match backbone.resolve_or_visit(origin, ctx, cache) {
        Ok(value) => {
            let similarity = score(backbone, &value);
            if similarity != 1.0 {
                backbone.add_invalid_prefix(origin);
            }
            Ok(similarity)
        }
        Err(OriginError::Failure(OriginFailure::FieldNotInCandidate)) => {
            debug!("clause on `{}`: path not in candidate", origin);
            backbone.add_invalid_prefix(origin);
            Ok(0.0)
        }
        Err(OriginError::Failure(OriginFailure::DependsOnInvalidPath(prefix))) => {
            debug!("clause on `{}`: depends on invalid `{}`", origin, prefix);
            Ok(0.0)
        }
        Err(OriginError::Fatal(e)) => Err(e),
    }
}

/// Clause `origin != null`.
pub struct RefNotNull {
    origin: String,
}

impl RefNotNull {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }
}

impl ClauseSimilarityHandler for RefNotNull {
    fn evaluate(
        &self,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<f64, SimilarityError> {
        evaluate_with_ref(&self.origin, backbone, ctx, cache, |_, value| {
            if value.is_null() {
                0.0
            } else {
                1.0
            }
        })
    }
}

/// Clause `origin == null`.
pub struct RefIsNull {
    origin: String,
}

impl RefIsNull {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }
}

impl ClauseSimilarityHandler for RefIsNull {
    fn evaluate(
        &self,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<f64, SimilarityError> {
        evaluate_with_ref(&self.origin, backbone, ctx, cache, |_, value| {
            if value.is_null() {
                1.0
            } else {
                0.0
            }
        })
    }
}

/// Clause `origin` aliases the object first reached through `alias_origin`.
///
/// On an identity miss the score degrades with the lexical distance between
/// the wanted alias origin and the origin that actually first reached the
/// candidate's object, so the search is pulled toward structurally closer
/// aliasing.
pub struct RefAliasOf {
    origin: String,
    alias_origin: String,
}

impl RefAliasOf {
    pub fn new(origin: impl Into<String>, alias_origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            alias_origin: alias_origin.into(),
        }
    }
}

impl ClauseSimilarityHandler for RefAliasOf {
    fn evaluate(
        &self,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<f64, SimilarityError> {
        evaluate_with_ref(&self.origin, backbone, ctx, cache, |backbone, value| {
            if value.is_null() {
                return 0.0;
            }
            let aliased = match value.as_obj() {
                Some(obj) => backbone
                    .value_for_origin(&self.alias_origin)
                    .and_then(Value::as_obj)
                    == Some(obj),
                // Value-typed (e.g. interned string): aliasing degenerates
                // to equality.
                None => backbone.value_for_origin(&self.alias_origin) == Some(value),
            };
            if aliased {
                return 1.0;
            }
            let actual = value
                .as_obj()
                .and_then(|obj| backbone.origin_of(obj))
                .unwrap_or(&self.origin);
            let distance = edge_distance(&self.alias_origin, actual) as f64;
            debug_assert!(distance != 0.0);
            inverse_distance_exp(distance, 1.0)
        })
    }
}

/// Clause `origin` does not alias the object behind `alias_origin`.
pub struct RefNotAliasOf {
    origin: String,
    alias_origin: String,
}

impl RefNotAliasOf {
    pub fn new(origin: impl Into<String>, alias_origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            alias_origin: alias_origin.into(),
        }
    }
}

impl ClauseSimilarityHandler for RefNotAliasOf {
    fn evaluate(
        &self,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<f64, SimilarityError> {
        evaluate_with_ref(&self.origin, backbone, ctx, cache, |backbone, value| {
            if value.is_null() {
                return 0.0;
            }
            let aliased = match value.as_obj() {
                Some(obj) => backbone
                    .value_for_origin(&self.alias_origin)
                    .and_then(Value::as_obj)
                    == Some(obj),
                None => backbone.value_for_origin(&self.alias_origin) == Some(value),
            };
            if aliased {
                0.0
            } else {
                1.0
            }
        })
    }
}

/// Runtime-type constraint carried by a fresh-object clause.
pub enum TypeConstraint {
    Unconstrained,
    /// Exact runtime class, fully qualified.
    Exactly(String),
    /// Any class except the listed ones.
    NoneOf(Vec<String>),
}

/// Clause `origin` points to an object no earlier origin reached, optionally
/// of a constrained runtime type.
///
/// Scoring is split: 0.3 for freshness, and for an `Exactly` constraint 0.3
/// for the package and 0.4 for the class name, each degrading by lexical
/// distance so a near-type candidate outranks a far-type one.
pub struct RefFreshObject {
    origin: String,
    constraint: TypeConstraint,
}

impl RefFreshObject {
    pub fn new(origin: impl Into<String>, constraint: TypeConstraint) -> Self {
        Self {
            origin: origin.into(),
            constraint,
        }
    }
}

impl ClauseSimilarityHandler for RefFreshObject {
    fn evaluate(
        &self,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<f64, SimilarityError> {
        evaluate_with_ref(&self.origin, backbone, ctx, cache, |backbone, value| {
            let class = match value {
                Value::Null => return 0.0,
                Value::Ref(obj) => {
                    let fresh = backbone.origin_of(*obj) == Some(self.origin.as_str());
                    if !fresh {
                        // Aliases an object reached earlier: only the
                        // freshness share is in play, degraded by how far
                        // the canonical origin is from this one.
                        let actual = backbone.origin_of(*obj).unwrap_or(&self.origin);
                        let distance = edge_distance(&self.origin, actual) as f64;
                        return inverse_distance_exp(distance, 0.3);
                    }
                    ctx.model.class_name(*obj)
                }
                // Value-typed strings are always fresh copies.
                Value::Str(_) => "java.lang.String".to_string(),
                _ => return 0.0,
            };

            let mut similarity = 0.3;
            match &self.constraint {
                TypeConstraint::Unconstrained => similarity += 0.7,
                TypeConstraint::NoneOf(forbidden) => {
                    if !forbidden.iter().any(|f| f == &class) {
                        similarity += 0.7;
                    }
                }
                TypeConstraint::Exactly(expected) => {
                    if *expected == class {
                        similarity += 0.7;
                    } else {
                        let (want_pkg, want_cls) = split_class(expected);
                        let (have_pkg, have_cls) = split_class(&class);
                        let package_distance = edge_distance(want_pkg, have_pkg) as f64;
                        similarity += inverse_distance_exp(package_distance, 0.3);
                        if package_distance == 0.0 {
                            let class_distance = edge_distance(want_cls, have_cls) as f64;
                            similarity += inverse_distance_exp(class_distance, 0.4);
                        }
                    }
                }
            }
            similarity
        })
    }
}

fn split_class(qualified: &str) -> (&str, &str) {
    match qualified.rsplit_once('.') {
        Some((package, class)) => (package, class),
        None => ("", qualified),
    }
}

/// Distance function over the values of a fixed list of origins, compiled
/// from a numeric or string clause.
///
/// `calculate` returns a non-negative distance: 0.0 (or less) means the
/// clause holds.
pub trait ValueCalculator {
    fn variable_origins(&self) -> &[String];

    fn calculate(&self, values: &[Value]) -> Result<f64, SimilarityError>;
}

/// [`ValueCalculator`] over a closure, for generated clause code.
pub struct FnCalculator {
    origins: Vec<String>,
    f: Box<dyn Fn(&[Value]) -> Result<f64, SimilarityError>>,
}

impl FnCalculator {
    pub fn new(
        origins: Vec<String>,
        f: impl Fn(&[Value]) -> Result<f64, SimilarityError> + 'static,
    ) -> Self {
        Self {
            origins,
            f: Box::new(f),
        }
    }
}

impl ValueCalculator for FnCalculator {
    fn variable_origins(&self) -> &[String] {
        &self.origins
    }

    fn calculate(&self, values: &[Value]) -> Result<f64, SimilarityError> {
        (self.f)(values)
    }
}

/// Numeric (or string-distance) clause over resolved origin values.
///
/// An unsatisfied clause scores by inverse distance but does not invalidate
/// its origins: the paths exist in the candidate, only the values are off.
pub struct NumericExpression {
    calculator: Box<dyn ValueCalculator>,
}

impl NumericExpression {
    pub fn new(calculator: Box<dyn ValueCalculator>) -> Self {
        Self { calculator }
    }
}

impl ClauseSimilarityHandler for NumericExpression {
    fn evaluate(
        &self,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<f64, SimilarityError> {
        let origins = self.calculator.variable_origins();
        let mut values = Vec::with_capacity(origins.len());
        for origin in origins {
            match backbone.resolve_or_visit(origin, ctx, cache) {
                Ok(value) => values.push(value),
                Err(OriginError::Failure(OriginFailure::FieldNotInCandidate)) => {
                    debug!("numeric clause: `{}` not in candidate", origin);
                    backbone.add_invalid_prefix(origin);
                    return Ok(0.0);
                }
                Err(OriginError::Failure(OriginFailure::DependsOnInvalidPath(prefix))) => {
                    debug!("numeric clause: `{}` depends on invalid `{}`", origin, prefix);
                    return Ok(0.0);
                }
                Err(OriginError::Fatal(e)) => return Err(e),
            }
        }

        let distance = self.calculator.calculate(&values)?;
        Ok(if distance <= 0.0 {
            1.0
        } else {
            inverse_distance_ratio(distance, 1.0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::heap::MiniHeap;
    use crate::model::{CandidateInputs, Constants};

    use test_log::test;

    struct Scenario {
        heap: MiniHeap,
        inputs: CandidateInputs,
        constants: Constants,
    }

    impl Scenario {
        fn eval(&self, handler: &dyn ClauseSimilarityHandler) -> f64 {
            let mut backbone = CandidateBackbone::new();
            self.eval_with(&mut backbone, handler)
        }

        fn eval_with(
            &self,
            backbone: &mut CandidateBackbone,
            handler: &dyn ClauseSimilarityHandler,
        ) -> f64 {
            let ctx = EvalCtx {
                inputs: &self.inputs,
                constants: &self.constants,
                model: &self.heap,
            };
            let cache = OriginCache::new();
            handler.evaluate(backbone, &ctx, &cache).unwrap()
        }
    }

    /// `{p0}` is a two-node list whose tail points back to the head's next,
    /// `{p1}` aliases the head node.
    fn shared_list() -> Scenario {
        let mut heap = MiniHeap::new();
        let head = heap.new_object("demo.Node");
        let tail = heap.new_object("demo.Node");
        heap.set_field(head, "next", Value::Ref(tail));
        heap.set_field(head, "value", Value::Int(10));
        heap.set_field(tail, "next", Value::Null);
        heap.set_field(tail, "value", Value::Int(20));
        let list = heap.new_object("demo.List");
        heap.set_field(list, "head", Value::Ref(head));
        heap.set_field(list, "size", Value::Int(2));

        let mut inputs = CandidateInputs::new();
        inputs.insert("{p0}".to_string(), Value::Ref(list));
        inputs.insert("{p1}".to_string(), Value::Ref(head));
        Scenario {
            heap,
            inputs,
            constants: Constants::new(),
        }
    }

    #[test]
    fn test_not_null() {
        let s = shared_list();
        assert_eq!(s.eval(&RefNotNull::new("{p0}.head")), 1.0);
        assert_eq!(s.eval(&RefNotNull::new("{p0}.head.next.next")), 0.0);
    }

    #[test]
    fn test_is_null() {
        let s = shared_list();
        assert_eq!(s.eval(&RefIsNull::new("{p0}.head.next.next")), 1.0);
        assert_eq!(s.eval(&RefIsNull::new("{p0}.head")), 0.0);
    }

    #[test]
    fn test_missing_path_scores_zero_and_poisons() {
        let s = shared_list();
        let mut backbone = CandidateBackbone::new();
        assert_eq!(s.eval_with(&mut backbone, &RefNotNull::new("{p0}.missing")), 0.0);
        // A later clause extending the failed path is cut off.
        assert_eq!(
            s.eval_with(&mut backbone, &RefNotNull::new("{p0}.missing.next")),
            0.0
        );
        assert!(backbone.invalid_prefixes().contains("{p0}.missing"));
        assert!(!backbone.invalid_prefixes().contains("{p0}.missing.next"));
    }

    #[test]
    fn test_alias_exact() {
        let s = shared_list();
        let mut backbone = CandidateBackbone::new();
        // Resolve the alias origin first, as clause order guarantees.
        assert_eq!(s.eval_with(&mut backbone, &RefNotNull::new("{p1}")), 1.0);
        assert_eq!(
            s.eval_with(&mut backbone, &RefAliasOf::new("{p0}.head", "{p1}")),
            1.0
        );
    }

    #[test]
    fn test_alias_miss_is_partial() {
        let s = shared_list();
        let mut backbone = CandidateBackbone::new();
        assert_eq!(s.eval_with(&mut backbone, &RefNotNull::new("{p1}")), 1.0);
        // {p0}.head.next is the tail, not the head.
        let score = s.eval_with(&mut backbone, &RefAliasOf::new("{p0}.head.next", "{p1}"));
        assert!(score > 0.0 && score < 1.0, "got {}", score);
    }

    #[test]
    fn test_not_alias() {
        let s = shared_list();
        let mut backbone = CandidateBackbone::new();
        assert_eq!(s.eval_with(&mut backbone, &RefNotNull::new("{p1}")), 1.0);
        assert_eq!(
            s.eval_with(&mut backbone, &RefNotAliasOf::new("{p0}.head.next", "{p1}")),
            1.0
        );
        assert_eq!(
            s.eval_with(&mut backbone, &RefNotAliasOf::new("{p0}.head", "{p1}")),
            0.0
        );
    }

    #[test]
    fn test_fresh_object() {
        let s = shared_list();
        // First reach of the tail node: fresh, unconstrained.
        assert_eq!(
            s.eval(&RefFreshObject::new(
                "{p0}.head.next",
                TypeConstraint::Unconstrained
            )),
            1.0
        );
        // Exact type match.
        assert_eq!(
            s.eval(&RefFreshObject::new(
                "{p0}.head.next",
                TypeConstraint::Exactly("demo.Node".to_string())
            )),
            1.0
        );
        // Wrong class in the right package: freshness + partial type score.
        let score = s.eval(&RefFreshObject::new(
            "{p0}.head.next",
            TypeConstraint::Exactly("demo.Leaf".to_string()),
        ));
        assert!(score > 0.3 && score < 1.0, "got {}", score);
        // Forbidden class.
        let score = s.eval(&RefFreshObject::new(
            "{p0}.head.next",
            TypeConstraint::NoneOf(vec!["demo.Node".to_string()]),
        ));
        assert_eq!(score, 0.3);
    }

    #[test]
    fn test_fresh_object_alias_is_partial() {
        let s = shared_list();
        let mut backbone = CandidateBackbone::new();
        assert_eq!(s.eval_with(&mut backbone, &RefNotNull::new("{p1}")), 1.0);
        // {p0}.head aliases {p1}, so it is not fresh.
        let score = s.eval_with(
            &mut backbone,
            &RefFreshObject::new("{p0}.head", TypeConstraint::Unconstrained),
        );
        assert!(score > 0.0 && score < 0.3, "got {}", score);
    }

    #[test]
    fn test_numeric_expression() {
        let s = shared_list();
        // |{p0}.size - 2| as the clause distance.
        let size_is = |want: i32| {
            NumericExpression::new(Box::new(FnCalculator::new(
                vec!["{p0}.size".to_string()],
                move |values| match values {
                    [Value::Int(x)] => Ok((*x - want).abs() as f64),
                    _ => Err(SimilarityError::Reflection("expected int".to_string())),
                },
            )))
        };
        assert_eq!(s.eval(&size_is(2)), 1.0);
        let near = s.eval(&size_is(3));
        let far = s.eval(&size_is(10));
        assert!(near < 1.0);
        assert!(far < near, "near {} far {}", near, far);
    }

    #[test]
    fn test_numeric_expression_missing_origin() {
        let s = shared_list();
        let handler = NumericExpression::new(Box::new(FnCalculator::new(
            vec!["{p0}.missing".to_string()],
            |_| Ok(0.0),
        )));
        let mut backbone = CandidateBackbone::new();
        assert_eq!(s.eval_with(&mut backbone, &handler), 0.0);
        assert!(backbone.invalid_prefixes().contains("{p0}.missing"));
    }
}
