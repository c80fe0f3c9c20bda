//! Parsed origin expressions.
//!
//! An origin expression names a value reachable from a candidate's inputs by
//! a chain of accesses. The grammar has three root forms,
//!
//! ```text
//! {var}                                  root variable
//! [class:field]                          static field
//! <class:descriptor:name@p1,...,pn>      method application
//! ```
//!
//! followed by `.class:field` (or bare `.field`), `.length`,
//! `.<identityHashCode>`, and `[index-expr]` suffixes, where `index-expr` is
//! itself a value expression (see [`eval`][crate::eval]).
//!
//! A [`ParsedOrigin`] is built once per unique expression text and cached in
//! an [`OriginCache`][crate::cache::OriginCache]. Tokenization happens
//! eagerly, but each segment's [`Accessor`] is only built when that segment
//! is first walked, so evaluation can short-circuit on a missing field
//! without paying resolution cost for never-reached segments. Built
//! accessors are written back into the slot vector and reused by every later
//! candidate evaluating the same text.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use log::trace;

use crate::backbone::CandidateBackbone;
use crate::cache::OriginCache;
use crate::error::{ModelError, OriginError, OriginFailure, SimilarityError};
use crate::eval::eval_value;
use crate::model::EvalCtx;
use crate::value::{ObjRef, Value};

pub struct ParsedOrigin {
    origin: String,
    segments: Vec<String>,
    /// Every prefix of the origin truncated at a segment boundary, the full
    /// origin included. Matched against the backbone's invalid-prefix set.
    depended_origins: HashSet<String>,
    /// One slot per segment, filled on first walk. Slots below
    /// `next_unbuilt` are always `Some`.
    accessors: RefCell<Vec<Option<Accessor>>>,
    next_unbuilt: Cell<usize>,
}

impl ParsedOrigin {
    pub fn new(origin: &str) -> Result<Self, SimilarityError> {
        let (segments, depended_origins) = split_segments(origin)?;
        let slots = std::iter::repeat_with(|| None).take(segments.len()).collect();
        Ok(Self {
            origin: origin.to_string(),
            segments,
            depended_origins,
            accessors: RefCell::new(slots),
            next_unbuilt: Cell::new(0),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of accessors built so far (grows monotonically across
    /// evaluations; observable laziness).
    pub fn built_accessors(&self) -> usize {
        self.next_unbuilt.get()
    }

    /// Resolve this origin against one candidate.
    ///
    /// Fails with [`OriginFailure::DependsOnInvalidPath`] if any dependency
    /// prefix is already invalid in the backbone, else walks the built
    /// accessors, then builds and applies the remaining ones in order.
    pub fn resolve(
        &self,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<Value, OriginError> {
        self.check_invalid_prefixes(backbone)?;

        // Walk the already-built accessors.
        let mut value: Option<Value> = None;
        let built = self.next_unbuilt.get();
        {
            let slots = self.accessors.borrow();
            for i in 0..built {
                let accessor = slots[i].as_ref().expect("slots below the cursor are built");
                value = Some(accessor.apply(value.as_ref(), backbone, ctx, cache)?);
            }
        }

        // Build and apply the rest. An accessor is stored only after it
        // applied successfully, so a failed segment is retried from scratch
        // by the next candidate.
        let mut i = built;
        while i < self.segments.len() {
            let accessor = if i == 0 {
                self.build_root(ctx)?
            } else {
                self.build_suffix(&self.segments[i])?
            };
            trace!("built accessor #{} of `{}`", i, self.origin);
            let next = accessor.apply(value.as_ref(), backbone, ctx, cache)?;
            self.accessors.borrow_mut()[i] = Some(accessor);
            self.next_unbuilt.set(i + 1);
            value = Some(next);
            i += 1;
        }

        Ok(value.expect("origins have at least one segment"))
    }

    fn check_invalid_prefixes(&self, backbone: &CandidateBackbone) -> Result<(), OriginError> {
        let invalid = backbone.invalid_prefixes();
        if invalid.is_empty() {
            return Ok(());
        }
        // Membership scan over the smaller of the two sets.
        let (smaller, bigger) = if invalid.len() <= self.depended_origins.len() {
            (invalid, &self.depended_origins)
        } else {
            (&self.depended_origins, invalid)
        };
        for prefix in smaller {
            if bigger.contains(prefix) {
                return Err(OriginFailure::DependsOnInvalidPath(prefix.clone()).into());
            }
        }
        Ok(())
    }

    fn malformed(&self) -> SimilarityError {
        SimilarityError::MalformedOrigin(self.origin.clone())
    }

    fn build_root(&self, ctx: &EvalCtx<'_>) -> Result<Accessor, SimilarityError> {
        let root = &self.segments[0];
        match root.chars().next() {
            Some('{') => {
                if ctx.inputs.contains_key(root.as_str()) {
                    Ok(Accessor::Root { name: root.clone() })
                } else {
                    Err(SimilarityError::UnknownRoot(root.clone()))
                }
            }
            Some('[') => {
                let inner = &root[1..root.len() - 1];
                let (class, field) = inner.split_once(':').ok_or_else(|| self.malformed())?;
                Ok(Accessor::StaticField {
                    class: normalize_class(class),
                    field: field.to_string(),
                })
            }
            Some('<') => self.build_method_root(ctx),
            _ => Err(self.malformed()),
        }
    }

    fn build_method_root(&self, ctx: &EvalCtx<'_>) -> Result<Accessor, SimilarityError> {
        let root = &self.segments[0];
        let inner = &root[1..root.len() - 1];
        let (class, rest) = inner.split_once(':').ok_or_else(|| self.malformed())?;
        let (descriptor, rest) = rest.split_once(':').ok_or_else(|| self.malformed())?;

        // The method name ends at the first top-level '@'; nested method
        // applications inside the parameter list carry their own '@'s.
        let mut nesting = 0usize;
        let mut at_sign = None;
        for (i, c) in rest.char_indices() {
            match c {
                '<' | '[' => nesting += 1,
                '>' | ']' => nesting = nesting.saturating_sub(1),
                '@' if nesting == 0 => {
                    at_sign = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let at_sign = at_sign.ok_or_else(|| self.malformed())?;
        let name = &rest[..at_sign];
        let params = split_parameters(&rest[at_sign + 1..]);

        let class = normalize_class(class);
        let is_static = ctx
            .model
            .is_static_method(&class, descriptor, name)
            .map_err(|e| SimilarityError::Reflection(e.to_string()))?;
        let expected = descriptor_parameter_count(descriptor, &self.origin)? + usize::from(!is_static);
        if params.len() != expected {
            return Err(SimilarityError::ParameterMismatch {
                origin: self.origin.clone(),
                expected,
                actual: params.len(),
            });
        }

        Ok(Accessor::Method {
            class,
            descriptor: descriptor.to_string(),
            name: name.to_string(),
            is_static,
            params,
        })
    }

    fn build_suffix(&self, segment: &str) -> Result<Accessor, SimilarityError> {
        if segment == "<identityHashCode>" {
            return Ok(Accessor::IdentityHash);
        }
        if segment == "length" {
            return Ok(Accessor::ArrayLength);
        }
        if let Some(rest) = segment.strip_prefix('[') {
            let index_text = rest.strip_suffix(']').ok_or_else(|| self.malformed())?;
            return Ok(match index_text.parse::<i32>() {
                Ok(index) => Accessor::ArrayIndex { index },
                Err(_) => Accessor::ArrayIndexExpr {
                    expr: index_text.to_string(),
                },
            });
        }
        if segment.is_empty() || segment.starts_with('<') {
            return Err(self.malformed());
        }
        Ok(match segment.split_once(':') {
            Some((class, field)) => Accessor::Field {
                class: Some(normalize_class(class)),
                field: field.to_string(),
            },
            None => Accessor::Field {
                class: None,
                field: segment.to_string(),
            },
        })
    }
}

/// One segment of a parsed origin, immutable once constructed and stateless
/// with respect to which candidate it is applied to.
#[derive(Debug, Clone)]
enum Accessor {
    Root {
        name: String,
    },
    StaticField {
        class: String,
        field: String,
    },
    Method {
        class: String,
        descriptor: String,
        name: String,
        is_static: bool,
        params: Vec<String>,
    },
    Field {
        class: Option<String>,
        field: String,
    },
    ArrayLength,
    ArrayIndex {
        index: i32,
    },
    ArrayIndexExpr {
        expr: String,
    },
    IdentityHash,
}

impl Accessor {
    fn apply(
        &self,
        carried: Option<&Value>,
        backbone: &mut CandidateBackbone,
        ctx: &EvalCtx<'_>,
        cache: &OriginCache,
    ) -> Result<Value, OriginError> {
        match self {
            Accessor::Root { name } => ctx
                .inputs
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| SimilarityError::UnknownRoot(name.clone()).into()),
            Accessor::StaticField { class, field } => ctx
                .model
                .get_static(class, field)
                .map_err(|e| SimilarityError::Reflection(e.to_string()).into()),
            Accessor::Method {
                class,
                descriptor,
                name,
                is_static,
                params,
            } => {
                let mut args = Vec::with_capacity(params.len());
                for param in params {
                    args.push(eval_value(param, backbone, ctx, cache)?);
                }
                if !is_static && args.first().map_or(true, Value::is_null) {
                    // Instance method with a null receiver.
                    return Err(OriginError::not_in_candidate());
                }
                ctx.model
                    .invoke(class, descriptor, name, &args)
                    .map_err(|e| SimilarityError::Reflection(e.to_string()).into())
            }
            Accessor::Field { class, field } => {
                let obj = carried_obj(carried)?;
                match ctx.model.get_field(obj, class.as_deref(), field) {
                    Ok(value) => Ok(value),
                    // The origin may refer to a field of a sub-type the
                    // candidate's runtime type does not have.
                    Err(ModelError::NoSuchField { .. }) => Err(OriginError::not_in_candidate()),
                    Err(e) => Err(SimilarityError::Reflection(e.to_string()).into()),
                }
            }
            Accessor::ArrayLength => {
                let obj = carried_obj(carried)?;
                ctx.model
                    .array_length(obj)
                    .map(Value::Int)
                    .map_err(|e| SimilarityError::Reflection(e.to_string()).into())
            }
            Accessor::ArrayIndex { index } => {
                let obj = carried_obj(carried)?;
                array_get(obj, *index, ctx)
            }
            Accessor::ArrayIndexExpr { expr } => {
                let obj = carried_obj(carried)?;
                let index = eval_value(expr, backbone, ctx, cache)?;
                let index = index
                    .as_int()
                    .ok_or_else(|| OriginError::from(SimilarityError::NonIntegerIndex(expr.clone())))?;
                array_get(obj, index, ctx)
            }
            Accessor::IdentityHash => match carried {
                None | Some(Value::Null) => Err(OriginError::not_in_candidate()),
                Some(Value::Ref(obj)) => Ok(Value::Int(ctx.model.identity_hash(*obj))),
                Some(value) => Err(SimilarityError::Reflection(format!(
                    "identityHashCode applied to value-typed {}",
                    value.type_name()
                ))
                .into()),
            },
        }
    }
}

/// Null or value-typed carried values cannot be dereferenced further.
fn carried_obj(carried: Option<&Value>) -> Result<ObjRef, OriginError> {
    match carried {
        Some(Value::Ref(obj)) => Ok(*obj),
        _ => Err(OriginError::not_in_candidate()),
    }
}

fn array_get(obj: ObjRef, index: i32, ctx: &EvalCtx<'_>) -> Result<Value, OriginError> {
    match ctx.model.array_get(obj, index) {
        Ok(value) => Ok(value),
        Err(ModelError::IndexOutOfBounds { .. }) => Err(OriginError::not_in_candidate()),
        Err(e) => Err(SimilarityError::Reflection(e.to_string()).into()),
    }
}

/// Origin class references use `/` separators; the model speaks dotted names.
fn normalize_class(name: &str) -> String {
    name.replace('/', ".")
}

/// Split an origin into segments and collect its prefix set.
///
/// Splitting is bracket-nesting aware: dots and brackets inside `{}`, `[]`,
/// and `<>` groups do not terminate a segment. Prefixes are the origin text
/// truncated at each segment boundary, so they compare equal to the origin
/// strings of sub-paths.
fn split_segments(origin: &str) -> Result<(Vec<String>, HashSet<String>), SimilarityError> {
    let malformed = || SimilarityError::MalformedOrigin(origin.to_string());
    let chars: Vec<char> = origin.chars().collect();
    if chars.is_empty() {
        return Err(malformed());
    }

    let mut segments: Vec<String> = Vec::new();
    let mut prefixes: HashSet<String> = HashSet::new();

    let mut i = match chars[0] {
        '{' => matching_close(&chars, 0, '{', '}').ok_or_else(malformed)?,
        '[' => matching_close(&chars, 0, '[', ']').ok_or_else(malformed)?,
        '<' => matching_close(&chars, 0, '<', '>').ok_or_else(malformed)?,
        _ => return Err(malformed()),
    };
    segments.push(chars[..i].iter().collect());
    prefixes.insert(chars[..i].iter().collect());

    while i < chars.len() {
        let (start, end) = match chars[i] {
            '.' => {
                let start = i + 1;
                if start >= chars.len() {
                    return Err(malformed());
                }
                let end = if chars[start] == '<' {
                    matching_close(&chars, start, '<', '>').ok_or_else(malformed)?
                } else {
                    let mut j = start;
                    while j < chars.len() && chars[j] != '.' && chars[j] != '[' {
                        j += 1;
                    }
                    if j == start {
                        return Err(malformed());
                    }
                    j
                };
                (start, end)
            }
            '[' => (i, matching_close(&chars, i, '[', ']').ok_or_else(malformed)?),
            _ => return Err(malformed()),
        };
        segments.push(chars[start..end].iter().collect());
        prefixes.insert(chars[..end].iter().collect());
        i = end;
    }

    Ok((segments, prefixes))
}

/// Index one past the bracket matching the one at `open_at`.
fn matching_close(chars: &[char], open_at: usize, open: char, close: char) -> Option<usize> {
    let mut nesting = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(open_at) {
        if c == open {
            nesting += 1;
        } else if c == close {
            nesting -= 1;
            if nesting == 0 {
                return Some(i + 1);
            }
        }
    }
    None
}

/// Split a method parameter list on top-level commas.
fn split_parameters(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut params = Vec::new();
    let mut nesting = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '[' => nesting += 1,
            '>' | ']' => nesting = nesting.saturating_sub(1),
            ',' if nesting == 0 => {
                params.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(text[start..].trim().to_string());
    params
}

/// Number of parameters a JVM-style method descriptor declares.
fn descriptor_parameter_count(descriptor: &str, origin: &str) -> Result<usize, SimilarityError> {
    let inner = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(params, _)| params)
        .ok_or_else(|| SimilarityError::MalformedOrigin(origin.to_string()))?;

    let mut count = 0;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => count += 1,
            // Array dimension prefix: the element type that follows counts.
            '[' => {}
            'L' => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
                count += 1;
            }
            _ => return Err(SimilarityError::MalformedOrigin(origin.to_string())),
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn segments(origin: &str) -> Vec<String> {
        split_segments(origin).unwrap().0
    }

    fn prefixes(origin: &str) -> HashSet<String> {
        split_segments(origin).unwrap().1
    }

    #[test]
    fn test_split_root_variable() {
        assert_eq!(segments("{p0}"), vec!["{p0}"]);
    }

    #[test]
    fn test_split_field_chain() {
        assert_eq!(
            segments("{p0}.List:head.Node:next"),
            vec!["{p0}", "List:head", "Node:next"]
        );
    }

    #[test]
    fn test_split_array_and_length() {
        assert_eq!(segments("{p0}.data[3]"), vec!["{p0}", "data", "[3]"]);
        assert_eq!(segments("{p0}.data.length"), vec!["{p0}", "data", "length"]);
    }

    #[test]
    fn test_split_identity_hash() {
        assert_eq!(
            segments("{x}.<identityHashCode>"),
            vec!["{x}", "<identityHashCode>"]
        );
    }

    #[test]
    fn test_split_nested_index_expression() {
        assert_eq!(
            segments("{a}.data[({a}.size)-(1)]"),
            vec!["{a}", "data", "[({a}.size)-(1)]"]
        );
    }

    #[test]
    fn test_split_static_root() {
        assert_eq!(segments("[java/lang/Integer:MAX_VALUE]"), vec!["[java/lang/Integer:MAX_VALUE]"]);
    }

    #[test]
    fn test_split_method_root() {
        assert_eq!(
            segments("<my/Class:(I)I:twice@{p0},2>.result"),
            vec!["<my/Class:(I)I:twice@{p0},2>", "result"]
        );
    }

    #[test]
    fn test_prefixes_match_subpath_origins() {
        // Prefixes are exact origin texts of sub-paths, array segments
        // joining without a dot.
        let p = prefixes("{a}.b[3].c");
        assert!(p.contains("{a}"));
        assert!(p.contains("{a}.b"));
        assert!(p.contains("{a}.b[3]"));
        assert!(p.contains("{a}.b[3].c"));
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn test_split_rejects_garbage() {
        assert!(split_segments("").is_err());
        assert!(split_segments("p0").is_err());
        assert!(split_segments("{p0").is_err());
        assert!(split_segments("{p0}.").is_err());
        assert!(split_segments("{p0}..x").is_err());
    }

    #[test]
    fn test_descriptor_parameter_count() {
        assert_eq!(descriptor_parameter_count("()V", "o").unwrap(), 0);
        assert_eq!(descriptor_parameter_count("(I)I", "o").unwrap(), 1);
        assert_eq!(descriptor_parameter_count("(IJ)V", "o").unwrap(), 2);
        assert_eq!(
            descriptor_parameter_count("(Ljava/lang/String;I)Z", "o").unwrap(),
            2
        );
        assert_eq!(descriptor_parameter_count("([[I[J)V", "o").unwrap(), 2);
        assert!(descriptor_parameter_count("I)V", "o").is_err());
        assert!(descriptor_parameter_count("(Q)V", "o").is_err());
    }

    #[test]
    fn test_split_parameters_nesting() {
        assert_eq!(split_parameters(""), Vec::<String>::new());
        assert_eq!(split_parameters("{p0},2"), vec!["{p0}", "2"]);
        assert_eq!(
            split_parameters("<c:(I)I:f@{x},1>,{y}.data[0]"),
            vec!["<c:(I)I:f@{x},1>", "{y}.data[0]"]
        );
    }
}
