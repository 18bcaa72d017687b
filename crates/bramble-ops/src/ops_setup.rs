//! Shared setup for the operations: opening the recipe repository, parsing
//! the requested spec, and running a resolution to completion.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bramble_core::config::ResolveConfig;
use bramble_core::repository::{DirectorySource, RecipeSource};
use bramble_core::spec::SpecRequest;
use bramble_resolver::prefetch::prefetch_closure;
use bramble_resolver::{ResolveError, ResolvedGraph, Resolver};
use bramble_util::errors::BrambleError;

/// Open the recipe directory at `repo`.
pub fn open_repository(repo: &Path) -> miette::Result<Arc<DirectorySource>> {
    if !repo.is_dir() {
        return Err(BrambleError::Repository {
            message: format!("{} is not a directory", repo.display()),
        }
        .into());
    }
    Ok(Arc::new(DirectorySource::new(repo)))
}

/// Parse a command-line spec such as `crtm@v2.4-jedi.1 +fix`.
pub fn parse_request(text: &str) -> miette::Result<SpecRequest> {
    SpecRequest::parse(text).map_err(|e| {
        BrambleError::Spec {
            message: format!("`{text}`: {e}"),
        }
        .into()
    })
}

/// Resolve `request` against the recipes in `repo`.
///
/// The declared closure is prefetched concurrently first; the search itself
/// runs on the blocking pool and is cancelled on Ctrl-C.
pub async fn resolve_graph(
    repo: &Path,
    request: &SpecRequest,
    config: &ResolveConfig,
) -> miette::Result<ResolvedGraph> {
    let source = open_repository(repo)?;
    let shared: Arc<dyn RecipeSource> = source.clone();
    let cache = prefetch_closure(
        shared,
        std::slice::from_ref(&request.name),
        config.resolver.prefetch_jobs,
    )
    .await;
    tracing::info!("prefetched {} recipes from {}", cache.len(), repo.display());

    let cancel = Arc::new(AtomicBool::new(false));
    let mut task = {
        let config = config.clone();
        let request = request.clone();
        let cancel = Arc::clone(&cancel);
        tokio::task::spawn_blocking(move || {
            Resolver::new(source.as_ref(), &config)
                .with_cache(cache)
                .with_cancel(cancel)
                .resolve(&request)
        })
    };

    let joined = tokio::select! {
        joined = &mut task => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            cancel.store(true, Ordering::Relaxed);
            task.await
        }
    };

    let result = joined.map_err(|e| BrambleError::Generic {
        message: format!("resolver task failed: {e}"),
    })?;
    result.map_err(|e| resolution_error(&e).into())
}

/// Turn a failed resolution into the user-facing error.
pub fn resolution_error(error: &ResolveError) -> BrambleError {
    match error.report() {
        Some(report) => BrambleError::Resolution {
            message: report.explain().trim_end().to_string(),
        },
        None => BrambleError::Resolution {
            message: error.to_string(),
        },
    }
}
