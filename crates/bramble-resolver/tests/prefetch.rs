use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bramble_core::config::ResolveConfig;
use bramble_core::recipe::Recipe;
use bramble_core::repository::{LookupError, MemorySource, RecipeSource};
use bramble_core::spec::SpecRequest;
use bramble_resolver::prefetch::prefetch_closure;
use bramble_resolver::Resolver;

/// Counts lookups so tests can tell prefetched recipes from fresh fetches.
struct Counting {
    inner: MemorySource,
    calls: AtomicUsize,
}

impl RecipeSource for Counting {
    fn lookup(&self, name: &str) -> Result<Recipe, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(name)
    }

    fn names(&self) -> Result<Vec<String>, LookupError> {
        self.inner.names()
    }
}

fn counting() -> Arc<Counting> {
    let inner = MemorySource::from_toml([
        "[package]\nname = \"metplus\"\n[[versions]]\nversion = \"4.1.1\"\n[variants.makeplots]\ndefault = false\n[[depends]]\nspec = \"met+python\"\ntype = \"run\"\n[[depends]]\nspec = \"py-cartopy\"\nwhen = \"+makeplots\"\ntype = \"run\"\n",
        "[package]\nname = \"met\"\n[[versions]]\nversion = \"10.1.1\"\n[variants.python]\ndefault = false\n",
        "[package]\nname = \"py-cartopy\"\n[[versions]]\nversion = \"0.21.1\"\n",
    ])
    .unwrap();
    Arc::new(Counting {
        inner,
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn prefetched_cache_serves_the_whole_resolution() {
    let source = counting();
    let cache = prefetch_closure(source.clone(), &["metplus".to_string()], 4).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    let config = ResolveConfig::default();
    let request = SpecRequest::parse("metplus").unwrap();
    let graph = Resolver::new(source.as_ref(), &config)
        .with_cache(cache)
        .resolve(&request)
        .unwrap();

    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    assert!(graph.get("met").unwrap().variants["python"] == bramble_core::variant::VariantValue::Bool(true));
    assert!(graph.get("py-cartopy").is_none());
}

#[tokio::test]
async fn prefetch_records_missing_names() {
    let source = counting();
    let cache = prefetch_closure(source.clone(), &["nope".to_string()], 1).await;
    assert!(matches!(
        cache.get("nope"),
        Some(Err(LookupError::NotFound { .. }))
    ));
}
