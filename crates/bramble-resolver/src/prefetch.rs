//! Concurrent recipe prefetching.
//!
//! Walks the declared dependency closure of the requested packages level by
//! level, ignoring guards, and loads every distinct name on the blocking
//! pool. The results seed a fresh [`RecipeCache`] for a single resolution;
//! the resolver itself stays sequential.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bramble_core::recipe::Recipe;
use bramble_core::repository::{LookupError, RecipeSource};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::RecipeCache;

/// Load the declared closure of `roots` with at most `jobs` lookups in
/// flight.
pub async fn prefetch_closure(
    source: Arc<dyn RecipeSource>,
    roots: &[String],
    jobs: usize,
) -> RecipeCache {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut cache = RecipeCache::new();
    let mut seen: BTreeSet<String> = roots.iter().cloned().collect();
    let mut frontier: Vec<String> = seen.iter().cloned().collect();
    let mut level = 0usize;

    while !frontier.is_empty() {
        tracing::debug!("prefetching {} recipes at depth {level}", frontier.len());
        let mut join_set = JoinSet::new();
        for name in frontier.drain(..) {
            let source = Arc::clone(&source);
            let sem = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await;
                let lookup_name = name.clone();
                let result = tokio::task::spawn_blocking(move || source.lookup(&lookup_name)).await;
                (name, result)
            });
        }

        // Insert in name order so the cache contents do not depend on
        // completion order.
        let mut loaded: BTreeMap<String, Result<Recipe, LookupError>> = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(result))) => {
                    loaded.insert(name, result);
                }
                Ok((name, Err(e))) => {
                    tracing::warn!("prefetch of {name} did not complete: {e}");
                }
                Err(e) => tracing::warn!("prefetch task failed: {e}"),
            }
        }

        for (name, result) in loaded {
            if let Ok(recipe) = &result {
                for edge in &recipe.depends {
                    if seen.insert(edge.target.clone()) {
                        frontier.push(edge.target.clone());
                    }
                }
            }
            cache.insert(name, result);
        }
        level += 1;
    }

    cache
}
