//! Cross-candidate cache of parsed origins.
//!
//! Origin texts repeat across every candidate a search evaluates, so parsing
//! (and lazily built accessors, which live inside [`ParsedOrigin`]) are
//! shared through this cache. One cache per path condition, or one per
//! search run when the clause sets overlap.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::SimilarityError;
use crate::origin::ParsedOrigin;

pub struct OriginCache {
    parsed: RefCell<HashMap<String, Rc<ParsedOrigin>>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl OriginCache {
    pub fn new() -> Self {
        Self {
            parsed: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// Look up the parsed form of `origin`, parsing on first sight.
    ///
    /// A malformed origin fails every time it is looked up; parse failures
    /// are not cached because they abort the whole evaluation anyway.
    pub fn parsed_origin(&self, origin: &str) -> Result<Rc<ParsedOrigin>, SimilarityError> {
        if let Some(parsed) = self.parsed.borrow().get(origin) {
            self.hits.set(self.hits.get() + 1);
            return Ok(Rc::clone(parsed));
        }
        self.misses.set(self.misses.get() + 1);
        let parsed = Rc::new(ParsedOrigin::new(origin)?);
        self.parsed
            .borrow_mut()
            .insert(origin.to_string(), Rc::clone(&parsed));
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.parsed.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.borrow().is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    pub fn log_stats(&self) {
        debug!(
            "origin cache: size = {}, hits = {}, misses = {}",
            self.len(),
            self.hits(),
            self.misses()
        );
    }
}

impl Default for OriginCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_cache_returns_same_parse() {
        let cache = OriginCache::new();
        let a = cache.parsed_origin("{p0}.head").unwrap();
        let b = cache.parsed_origin("{p0}.head").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_cache_distinct_origins() {
        let cache = OriginCache::new();
        let a = cache.parsed_origin("{p0}").unwrap();
        let b = cache.parsed_origin("{p1}").unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_malformed_is_not_cached() {
        let cache = OriginCache::new();
        assert!(cache.parsed_origin("garbage").is_err());
        assert!(cache.parsed_origin("garbage").is_err());
        assert!(cache.is_empty());
    }
}
