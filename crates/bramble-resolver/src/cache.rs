//! Per-run recipe cache.
//!
//! Every name is fetched from the source at most once per resolution, and
//! failures are remembered as well as successes. A cache belongs to exactly
//! one run; it is moved into the resolver and never shared.

use std::collections::HashMap;
use std::sync::Arc;

use bramble_core::recipe::Recipe;
use bramble_core::repository::{LookupError, RecipeSource};

#[derive(Debug, Default)]
pub struct RecipeCache {
    entries: HashMap<String, Result<Arc<Recipe>, LookupError>>,
    fetches: usize,
}

impl RecipeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `name`, consulting `source` on first use.
    pub fn get_or_fetch(
        &mut self,
        name: &str,
        source: &dyn RecipeSource,
    ) -> Result<Arc<Recipe>, LookupError> {
        if let Some(entry) = self.entries.get(name) {
            return entry.clone();
        }
        tracing::trace!("fetching recipe {name}");
        self.fetches += 1;
        let result = source.lookup(name).map(Arc::new);
        self.entries.insert(name.to_string(), result.clone());
        result
    }

    /// Store a result obtained elsewhere (prefetching). An existing entry is
    /// kept.
    pub fn insert(&mut self, name: impl Into<String>, result: Result<Recipe, LookupError>) {
        self.entries
            .entry(name.into())
            .or_insert_with(|| result.map(Arc::new));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Result<Arc<Recipe>, LookupError>> {
        self.entries.get(name)
    }

    /// Number of lookups this cache made against a source itself.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl RecipeSource for Counting {
        fn lookup(&self, name: &str) -> Result<Recipe, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name == "zlib" {
                Ok(Recipe::new("zlib").with_versions(["1.3"]).unwrap())
            } else {
                Err(LookupError::NotFound { name: name.into() })
            }
        }

        fn names(&self) -> Result<Vec<String>, LookupError> {
            Ok(vec!["zlib".into()])
        }
    }

    #[test]
    fn each_name_fetched_once() {
        let source = Counting {
            calls: AtomicUsize::new(0),
        };
        let mut cache = RecipeCache::new();
        for _ in 0..3 {
            assert!(cache.get_or_fetch("zlib", &source).is_ok());
            assert!(cache.get_or_fetch("hdf5", &source).is_err());
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.fetch_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn inserted_entries_are_not_refetched() {
        let source = Counting {
            calls: AtomicUsize::new(0),
        };
        let mut cache = RecipeCache::new();
        cache.insert("zlib", Ok(Recipe::new("zlib").with_versions(["1.2"]).unwrap()));
        let recipe = cache.get_or_fetch("zlib", &source).unwrap();
        assert_eq!(recipe.versions[0].version.as_str(), "1.2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.fetch_count(), 0);
    }
}
