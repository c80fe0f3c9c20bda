//! Whole-path-condition distance.
//!
//! The fitness a search minimizes: `clause count - sum of per-clause
//! similarities`, 0.0 exactly when the candidate satisfies every clause.
//! Handlers run in clause order over one fresh [`CandidateBackbone`] per
//! candidate; the [`OriginCache`] is the only state worth sharing across
//! candidates.

use std::collections::BTreeMap;

use log::debug;

use crate::backbone::CandidateBackbone;
use crate::cache::OriginCache;
use crate::error::{OriginError, SimilarityError};
use crate::model::{CandidateInputs, Constants, EvalCtx, ObjectModel};
use crate::similarity::ClauseSimilarityHandler;
use crate::value::Value;

/// Distance of one candidate from satisfying the path condition compiled
/// into `handlers`.
///
/// Pass the same `cache` for every candidate of a search run; with `None` a
/// throw-away cache is used and parsing work repeats per call.
pub fn distance(
    handlers: &[Box<dyn ClauseSimilarityHandler>],
    inputs: &CandidateInputs,
    constants: &Constants,
    model: &dyn ObjectModel,
    cache: Option<&OriginCache>,
) -> Result<f64, SimilarityError> {
    let local;
    let cache = match cache {
        Some(cache) => cache,
        None => {
            local = OriginCache::new();
            &local
        }
    };

    let ctx = EvalCtx {
        inputs,
        constants,
        model,
    };
    let mut backbone = CandidateBackbone::new();
    let mut similarity = 0.0;
    for handler in handlers {
        similarity += handler.evaluate(&mut backbone, &ctx, cache)?;
    }

    let distance = handlers.len() as f64 - similarity;
    assert!(distance >= 0.0, "similarity exceeds clause count");
    debug!(
        "distance = {} over {} clauses",
        distance,
        handlers.len()
    );
    Ok(distance)
}

/// Recipe for a string the path condition derived from candidate state (a
/// concatenation, a substring, a `toString`), keyed by heap position like
/// plain constants.
pub trait StringCalculator {
    fn variable_origins(&self) -> &[String];

    fn build(&self, values: &[Value]) -> Result<String, SimilarityError>;
}

/// [`StringCalculator`] over a closure.
pub struct FnStringCalculator {
    origins: Vec<String>,
    f: Box<dyn Fn(&[Value]) -> Result<String, SimilarityError>>,
}

impl FnStringCalculator {
    pub fn new(
        origins: Vec<String>,
        f: impl Fn(&[Value]) -> Result<String, SimilarityError> + 'static,
    ) -> Self {
        Self {
            origins,
            f: Box::new(f),
        }
    }
}

impl StringCalculator for FnStringCalculator {
    fn variable_origins(&self) -> &[String] {
        &self.origins
    }

    fn build(&self, values: &[Value]) -> Result<String, SimilarityError> {
        (self.f)(values)
    }
}

/// Materialize derived string constants for one candidate, in position
/// order, before scoring it.
///
/// Positions already present in `constants` are left alone. A recipe whose
/// origins the candidate cannot produce is skipped; scoring will then fail
/// softly on the missing constant's clause rather than here.
pub fn complete_derived_values(
    recipes: &BTreeMap<i64, Box<dyn StringCalculator>>,
    inputs: &CandidateInputs,
    constants: &mut Constants,
    model: &dyn ObjectModel,
    cache: Option<&OriginCache>,
) -> Result<(), SimilarityError> {
    let local;
    let cache = match cache {
        Some(cache) => cache,
        None => {
            local = OriginCache::new();
            &local
        }
    };

    for (&position, recipe) in recipes {
        if constants.contains_key(&position) {
            continue;
        }

        let mut backbone = CandidateBackbone::new();
        let mut values = Vec::with_capacity(recipe.variable_origins().len());
        let mut unresolvable = false;
        {
            let ctx = EvalCtx {
                inputs,
                constants,
                model,
            };
            for origin in recipe.variable_origins() {
                match backbone.resolve_or_visit(origin, &ctx, cache) {
                    Ok(value) => values.push(value),
                    Err(OriginError::Failure(failure)) => {
                        debug!("derived string {} skipped: {}", position, failure);
                        unresolvable = true;
                        break;
                    }
                    Err(OriginError::Fatal(e)) => return Err(e),
                }
            }
        }
        if unresolvable {
            continue;
        }

        let derived = recipe.build(&values)?;
        constants.insert(position, derived);
    }
    Ok(())
}
