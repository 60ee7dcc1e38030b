//! Core Types and Trait Definitions for credgraph
//!
//! Defines the contracts every data source implements:
//! - **SourceKind:** the closed set of sources and when each applies
//! - **SourceConfig:** per-source configuration, credentials included
//! - **SourceAdapter:** declaration, mirror update, graph construction and
//!   optional reference detection
//! - **ReferenceDetector:** token -> node address resolution

use crate::plugins::initiatives::LoadedInitiativesDirectory;
use crate::progress::ProgressReporter;
use credgraph_common::db::CacheProvider;
use credgraph_common::project::{DiscourseServer, InitiativesConfig, RepoId};
use credgraph_common::{NodeAddress, PluginDeclaration, Project, Result, WeightedGraph};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// Sources
// ============================================================================

/// The data sources a project can draw on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Code-hosting platform
    Github,
    /// Discussion forum
    Discourse,
    /// Manually authored initiative set
    Initiatives,
}

impl SourceKind {
    /// Every source, in the fixed order stages use to report and compose
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Github,
        SourceKind::Discourse,
        SourceKind::Initiatives,
    ];

    /// Stable name, also used as the cache store id
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Github => "github",
            SourceKind::Discourse => "discourse",
            SourceKind::Initiatives => "initiatives",
        }
    }

    /// Whether `project` draws on this source
    pub fn applies(&self, project: &Project) -> bool {
        match self {
            SourceKind::Github => !project.repo_ids().is_empty(),
            SourceKind::Discourse => project.discourse_server().is_some(),
            SourceKind::Initiatives => project.initiatives().is_some(),
        }
    }

    /// Applicable sources for `project`, in fixed order
    pub fn applicable(project: &Project) -> Vec<SourceKind> {
        Self::ALL
            .into_iter()
            .filter(|kind| kind.applies(project))
            .collect()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration handed to one source adapter
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Github {
        repo_ids: Vec<RepoId>,
        token: String,
    },
    Discourse {
        server: DiscourseServer,
    },
    Initiatives {
        config: InitiativesConfig,
        directory: PathBuf,
    },
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::Github { .. } => SourceKind::Github,
            SourceConfig::Discourse { .. } => SourceKind::Discourse,
            SourceConfig::Initiatives { .. } => SourceKind::Initiatives,
        }
    }
}

// ============================================================================
// Reference detection
// ============================================================================

/// Resolve a free-text token (usually a URL) to the node it refers to
pub trait ReferenceDetector: Send + Sync {
    fn detect(&self, token: &str) -> Option<NodeAddress>;
}

// ============================================================================
// Source Adapter Trait
// ============================================================================

/// Result of one source's mirror update
#[derive(Clone, Default)]
pub struct MirrorOutcome {
    /// Only the initiatives source produces this
    pub loaded_initiatives: Option<LoadedInitiativesDirectory>,
}

/// Everything a source may consult while building its graph
pub struct GraphInput<'a> {
    pub config: &'a SourceConfig,
    pub cache: &'a CacheProvider,
    /// Composed detector over every applicable source
    pub reference_detector: &'a dyn ReferenceDetector,
    pub loaded_initiatives: Option<&'a LoadedInitiativesDirectory>,
}

/// Source adapter trait
///
/// All sources implement this trait for uniform concurrent execution. Each
/// source addresses its nodes and edges under its own prefix and keeps its
/// raw data in its own cache store.
///
/// # Example
/// ```rust,ignore
/// pub struct ForumAdapter { client: ForumClient }
///
/// #[async_trait::async_trait]
/// impl SourceAdapter for ForumAdapter {
///     fn declaration(&self) -> PluginDeclaration { forum_declaration() }
///
///     async fn update_mirror(&self, config: &SourceConfig, cache: &CacheProvider,
///                            reporter: &dyn ProgressReporter) -> Result<MirrorOutcome> {
///         let store = cache.open("discourse").await?;
///         let _scope = TaskScope::start(reporter, "discourse");
///         self.client.fetch_into(&store).await?;
///         Ok(MirrorOutcome::default())
///     }
///
///     async fn create_graph(&self, input: GraphInput<'_>) -> Result<WeightedGraph> {
///         let store = input.cache.open("discourse").await?;
///         build_forum_graph(&store, input.reference_detector).await
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Static node/edge types and default weights (no I/O)
    fn declaration(&self) -> PluginDeclaration;

    /// Bring this source's cache store up to date
    async fn update_mirror(
        &self,
        config: &SourceConfig,
        cache: &CacheProvider,
        reporter: &dyn ProgressReporter,
    ) -> Result<MirrorOutcome>;

    /// Build this source's weighted graph from its cache store
    async fn create_graph(&self, input: GraphInput<'_>) -> Result<WeightedGraph>;

    /// Detector for references to this source's nodes, if it has one
    async fn reference_detector(
        &self,
        _config: &SourceConfig,
        _cache: &CacheProvider,
    ) -> Result<Option<Arc<dyn ReferenceDetector>>> {
        Ok(None)
    }
}
