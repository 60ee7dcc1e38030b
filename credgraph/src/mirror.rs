//! Mirror orchestration
//!
//! Brings every applicable source's cache store up to date. Updates run
//! concurrently and are joined; the stage fails only after every update has
//! settled.

use crate::plugins::initiatives::LoadedInitiativesDirectory;
use crate::plugins::{applicable_sources, settle, Adapters, PipelineEnv};
use crate::types::SourceKind;
use credgraph_common::db::CacheProvider;
use credgraph_common::{Project, Result};
use futures::future::join_all;
use tracing::{debug, info};

/// A project whose mirror update has been attempted.
///
/// Carries no staleness guarantee: the cache holds whatever the last update
/// managed to fetch.
#[derive(Clone)]
pub struct CachedProject {
    pub project: Project,
    pub cache: CacheProvider,
    pub loaded_initiatives: Option<LoadedInitiativesDirectory>,
}

/// Run the mirror update of every applicable source.
///
/// # Errors
/// - [`Error::Config`](credgraph_common::Error::Config) if a source lacks its
///   credential or directory; no adapter is invoked in that case
/// - [`Error::SourceIo`](credgraph_common::Error::SourceIo) for the first
///   failing source in fixed order, once all updates have settled
pub async fn update_mirror(
    adapters: &Adapters,
    env: &PipelineEnv,
    project: Project,
) -> Result<CachedProject> {
    let sources = applicable_sources(adapters, &project, env)?;
    info!(
        project = project.id(),
        sources = sources.len(),
        "Updating mirrors"
    );

    let updates = sources.iter().map(|source| async move {
        let kind = source.kind();
        debug!(source = kind.name(), "Mirror update started");
        let result = source
            .adapter
            .update_mirror(&source.config, &env.cache, env.reporter.as_ref())
            .await;
        if result.is_ok() {
            debug!(source = kind.name(), "Mirror update finished");
        }
        (kind, result)
    });
    let outcomes = settle("mirror", join_all(updates).await)?;

    let loaded_initiatives = outcomes
        .into_iter()
        .find(|(kind, _)| *kind == SourceKind::Initiatives)
        .and_then(|(_, outcome)| outcome.loaded_initiatives);

    Ok(CachedProject {
        project,
        cache: env.cache.clone(),
        loaded_initiatives,
    })
}
