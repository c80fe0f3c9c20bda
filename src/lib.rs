//! # pathdist: path-condition distance for search-based test generation
//!
//! **`pathdist`** scores how close a concrete candidate input is to
//! satisfying a symbolic-execution path condition. It is the fitness core
//! of a search-based test generator: the search proposes candidates, this
//! crate turns each one into a single non-negative distance, and the search
//! minimizes it until a candidate drives execution down the wanted path.
//!
//! ## How scoring works
//!
//! A path condition compiles into one
//! [`ClauseSimilarityHandler`][crate::similarity::ClauseSimilarityHandler]
//! per clause. Each handler resolves *origin expressions* (symbolic paths
//! like `{p0}.head.next` into the candidate's object graph) and scores the
//! clause in `[0, 1]`; partial credit comes from string and numeric
//! distance kernels, so the fitness landscape stays smooth where boolean
//! satisfaction would plateau. The candidate's distance is
//! `clause count - total similarity`, exactly 0.0 on a satisfying
//! candidate — see [`distance`][crate::distance::distance].
//!
//! Object access is abstracted behind the
//! [`ObjectModel`][crate::model::ObjectModel] trait; hosts without native
//! reflection can use the bundled [`MiniHeap`][crate::heap::MiniHeap].
//!
//! ## Basic Usage
//!
//! ```rust
//! use pathdist::distance::distance;
//! use pathdist::heap::MiniHeap;
//! use pathdist::model::{CandidateInputs, Constants};
//! use pathdist::similarity::{ClauseSimilarityHandler, RefNotNull};
//! use pathdist::value::Value;
//!
//! // Path condition: {p0} != null, {p0}.head != null.
//! let handlers: Vec<Box<dyn ClauseSimilarityHandler>> = vec![
//!     Box::new(RefNotNull::new("{p0}")),
//!     Box::new(RefNotNull::new("{p0}.head")),
//! ];
//!
//! // A candidate whose list has a head node.
//! let mut heap = MiniHeap::new();
//! let node = heap.new_object("demo.Node");
//! let list = heap.new_object("demo.List");
//! heap.set_field(list, "head", Value::Ref(node));
//! let mut inputs = CandidateInputs::new();
//! inputs.insert("{p0}".to_string(), Value::Ref(list));
//!
//! let d = distance(&handlers, &inputs, &Constants::new(), &heap, None).unwrap();
//! assert_eq!(d, 0.0);
//! ```
//!
//! ## Core Components
//!
//! - **[`similarity`]**: the per-clause handlers and calculator traits.
//! - **[`distance`]**: the aggregator and derived string constants.
//! - **[`origin`]** / **[`backbone`]** / **[`cache`]**: origin parsing,
//!   per-candidate resolution state, and the cross-candidate parse cache.
//! - **[`strdist`]**: the string distance kernels.

pub mod backbone;
pub mod cache;
pub mod distance;
pub mod error;
pub mod heap;
pub mod model;
pub mod origin;
pub mod similarity;
pub mod strdist;
pub mod value;

mod eval;
