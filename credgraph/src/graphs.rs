//! Graph composition
//!
//! Each applicable source builds its own weighted graph; the per-source graphs
//! are then merged into one and, when the project declares identities,
//! contracted so each person is a single node.

use crate::mirror::CachedProject;
use crate::plugins::{applicable_sources, settle, Adapters, PipelineEnv};
use crate::types::{GraphInput, ReferenceDetector, SourceKind};
use credgraph_common::{Result, WeightedGraph};
use futures::future::join_all;
use tracing::{debug, info};

/// Per-source graphs of one cached project, in fixed source order
#[derive(Clone)]
pub struct PluginGraphs {
    pub cached_project: CachedProject,
    pub graphs: Vec<(SourceKind, WeightedGraph)>,
}

/// Build every applicable source's graph concurrently.
///
/// Every adapter receives the composed reference detector; the initiatives
/// adapter also receives the loaded directory.
pub async fn create_plugin_graphs(
    adapters: &Adapters,
    env: &PipelineEnv,
    cached_project: CachedProject,
    reference_detector: &dyn ReferenceDetector,
) -> Result<PluginGraphs> {
    let sources = applicable_sources(adapters, &cached_project.project, env)?;
    info!(
        project = cached_project.project.id(),
        sources = sources.len(),
        "Creating plugin graphs"
    );

    let cached = &cached_project;
    let builds = sources.iter().map(|source| async move {
        let kind = source.kind();
        let input = GraphInput {
            config: &source.config,
            cache: &cached.cache,
            reference_detector,
            loaded_initiatives: match kind {
                SourceKind::Initiatives => cached.loaded_initiatives.as_ref(),
                _ => None,
            },
        };
        let result = source.adapter.create_graph(input).await;
        if let Ok(graph) = &result {
            debug!(
                source = kind.name(),
                nodes = graph.graph.node_count(),
                edges = graph.graph.edge_count(),
                "Plugin graph created"
            );
        }
        (kind, result)
    });
    let graphs = settle("graph", join_all(builds).await)?;

    Ok(PluginGraphs {
        cached_project,
        graphs,
    })
}

/// Merge the per-source graphs and contract identities.
///
/// Without identities the merged graph is returned untouched and the
/// identity contractor is never consulted.
pub fn contract_plugin_graphs(
    adapters: &Adapters,
    plugin_graphs: PluginGraphs,
) -> Result<WeightedGraph> {
    let PluginGraphs {
        cached_project,
        graphs,
    } = plugin_graphs;
    let merged = WeightedGraph::merge(graphs.into_iter().map(|(_, graph)| graph))?;

    let project = &cached_project.project;
    if project.identities().is_empty() {
        debug!(project = project.id(), "No identities to contract");
        return Ok(merged);
    }

    let server_url = project.discourse_server().map(|s| s.server_url.as_str());
    adapters
        .identity()
        .contract(merged, project.identities(), server_url)
}
