//! Initiatives adapter
//!
//! Initiatives are authored by hand as one JSON file per initiative in a
//! local directory. The directory is published at the project's remote URL,
//! so `<remoteUrl>/<fileName>` is how other sources refer to an initiative.
//!
//! ```json
//! {
//!   "title": "Write the onboarding guide",
//!   "timestampMs": 1571498171000,
//!   "completed": false,
//!   "champions": ["https://github.com/alice"],
//!   "dependencies": [],
//!   "references": ["https://github.com/org/repo/issues/12"],
//!   "contributions": ["https://github.com/org/repo/pull/13"]
//! }
//! ```

use crate::progress::{ProgressReporter, TaskScope};
use crate::reference::MappedReferenceDetector;
use crate::types::{
    GraphInput, MirrorOutcome, ReferenceDetector, SourceAdapter, SourceConfig, SourceKind,
};
use credgraph_common::db::{set_metadata, CacheProvider};
use credgraph_common::declaration::{EdgeType, NodeType};
use credgraph_common::{
    Edge, EdgeAddress, EdgeWeight, Error, Graph, Node, NodeAddress, PluginDeclaration, Result,
    WeightedGraph,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SOURCE_NAME: &str = "initiatives";

/// On-disk initiative record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InitiativeFile {
    pub title: String,
    pub timestamp_ms: i64,
    pub completed: bool,
    #[serde(default)]
    pub champions: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub contributions: Vec<String>,
}

/// A loaded initiative and where it lives
#[derive(Debug, Clone, PartialEq)]
pub struct Initiative {
    pub file_name: String,
    /// `<remoteUrl>/<fileName>`
    pub url: String,
    pub address: NodeAddress,
    pub record: InitiativeFile,
}

/// Materialized initiatives plus the detector for references to them
#[derive(Clone)]
pub struct LoadedInitiativesDirectory {
    pub initiatives: Vec<Initiative>,
    pub reference_detector: Arc<dyn ReferenceDetector>,
}

impl LoadedInitiativesDirectory {
    pub fn len(&self) -> usize {
        self.initiatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initiatives.is_empty()
    }
}

// ============================================================================
// Declaration
// ============================================================================

/// Edge kinds, each relating an initiative to one of its URL lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitiativeEdge {
    /// champion -> initiative
    Champions,
    /// initiative -> dependency
    DependsOn,
    /// initiative -> reference
    References,
    /// contribution -> initiative
    ContributesTo,
}

impl InitiativeEdge {
    const ALL: [InitiativeEdge; 4] = [
        InitiativeEdge::Champions,
        InitiativeEdge::DependsOn,
        InitiativeEdge::References,
        InitiativeEdge::ContributesTo,
    ];

    fn tag(self) -> &'static str {
        match self {
            InitiativeEdge::Champions => "CHAMPIONS",
            InitiativeEdge::DependsOn => "DEPENDS_ON",
            InitiativeEdge::References => "REFERENCES",
            InitiativeEdge::ContributesTo => "CONTRIBUTES_TO",
        }
    }

    fn urls(self, record: &InitiativeFile) -> &[String] {
        match self {
            InitiativeEdge::Champions => &record.champions,
            InitiativeEdge::DependsOn => &record.dependencies,
            InitiativeEdge::References => &record.references,
            InitiativeEdge::ContributesTo => &record.contributions,
        }
    }

    /// Whether the initiative is the edge's destination
    fn points_at_initiative(self) -> bool {
        matches!(self, InitiativeEdge::Champions | InitiativeEdge::ContributesTo)
    }

    fn prefix(self) -> EdgeAddress {
        EdgeAddress::from_parts(["sourcecred", "initiatives", self.tag()])
    }

    fn edge_type(self) -> EdgeType {
        let (forward_name, backward_name, forwards, backwards, description) = match self {
            InitiativeEdge::Champions => (
                "champions",
                "is championed by",
                1.0,
                0.125,
                "Connects a champion to the initiative they take responsibility for",
            ),
            InitiativeEdge::DependsOn => (
                "depends on",
                "is depended on by",
                1.0,
                0.0625,
                "Connects an initiative to work it depends on",
            ),
            InitiativeEdge::References => (
                "references",
                "is referenced by",
                0.5,
                0.0625,
                "Connects an initiative to related material",
            ),
            InitiativeEdge::ContributesTo => (
                "contributes to",
                "is contributed to by",
                2.0,
                0.25,
                "Connects a contribution to the initiative it advances",
            ),
        };
        EdgeType {
            forward_name: forward_name.to_string(),
            backward_name: backward_name.to_string(),
            prefix: self.prefix(),
            default_weight: EdgeWeight {
                forwards,
                backwards,
            },
            description: description.to_string(),
        }
    }
}

fn initiative_prefix() -> NodeAddress {
    NodeAddress::from_parts(["sourcecred", "initiatives", "initiative"])
}

pub fn declaration() -> PluginDeclaration {
    PluginDeclaration {
        name: SOURCE_NAME.to_string(),
        node_prefix: NodeAddress::from_parts(["sourcecred", "initiatives"]),
        edge_prefix: EdgeAddress::from_parts(["sourcecred", "initiatives"]),
        node_types: vec![NodeType {
            name: "initiative".to_string(),
            plural_name: "initiatives".to_string(),
            prefix: initiative_prefix(),
            default_weight: 0.0,
            description: "A project-level goal with champions and contributions".to_string(),
        }],
        edge_types: InitiativeEdge::ALL.iter().map(|e| e.edge_type()).collect(),
        user_types: Vec::new(),
    }
}

pub fn initiative_address(remote_url: &str, file_name: &str) -> Result<NodeAddress> {
    initiative_prefix().append([remote_url, file_name])
}

// ============================================================================
// Loading
// ============================================================================

fn source_error(message: String) -> Error {
    Error::SourceIo {
        source_name: SOURCE_NAME.to_string(),
        message,
    }
}

/// Load every `*.json` initiative in `directory`, sorted by file name
pub async fn load_directory(directory: &Path, remote_url: &str) -> Result<LoadedInitiativesDirectory> {
    let remote_url = remote_url.trim_end_matches('/');

    let mut entries = tokio::fs::read_dir(directory).await.map_err(|e| {
        source_error(format!(
            "cannot read initiatives directory {}: {}",
            directory.display(),
            e
        ))
    })?;
    let mut file_names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| source_error(format!("cannot list {}: {}", directory.display(), e)))?
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => file_names.push(name.to_string()),
            None => warn!("Skipping initiative with non UTF-8 file name: {}", path.display()),
        }
    }
    file_names.sort();

    let mut initiatives = Vec::with_capacity(file_names.len());
    let mut table = HashMap::with_capacity(file_names.len());
    for file_name in file_names {
        let path = directory.join(&file_name);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| source_error(format!("cannot read {}: {}", path.display(), e)))?;
        let record: InitiativeFile = serde_json::from_str(&contents)
            .map_err(|e| source_error(format!("malformed initiative {}: {}", path.display(), e)))?;

        let url = format!("{}/{}", remote_url, file_name);
        let address = initiative_address(remote_url, &file_name)?;
        debug!(initiative = %url, title = %record.title, "Loaded initiative");

        table.insert(url.clone(), address.clone());
        initiatives.push(Initiative {
            file_name,
            url,
            address,
            record,
        });
    }

    info!(
        directory = %directory.display(),
        count = initiatives.len(),
        "Initiatives directory loaded"
    );
    Ok(LoadedInitiativesDirectory {
        initiatives,
        reference_detector: Arc::new(MappedReferenceDetector::new(table)),
    })
}

// ============================================================================
// Graph
// ============================================================================

/// Graph of the loaded initiatives; URLs `detector` cannot resolve are skipped
pub fn create_graph(
    loaded: &LoadedInitiativesDirectory,
    detector: &dyn ReferenceDetector,
) -> Result<WeightedGraph> {
    let mut graph = Graph::new();
    let mut skipped = 0usize;

    for initiative in &loaded.initiatives {
        graph.add_node(Node {
            address: initiative.address.clone(),
            description: initiative.record.title.clone(),
            timestamp_ms: Some(initiative.record.timestamp_ms),
        })?;

        for kind in InitiativeEdge::ALL {
            for url in kind.urls(&initiative.record) {
                let Some(target) = detector.detect(url) else {
                    warn!(
                        initiative = %initiative.url,
                        edge = kind.tag(),
                        url = %url,
                        "Skipping unresolved reference"
                    );
                    skipped += 1;
                    continue;
                };
                let (src, dst) = if kind.points_at_initiative() {
                    (target, initiative.address.clone())
                } else {
                    (initiative.address.clone(), target)
                };
                let address = kind.prefix().append(
                    initiative
                        .address
                        .parts()
                        .iter()
                        .skip(initiative_prefix().len())
                        .cloned()
                        .chain(std::iter::once(url.clone())),
                )?;
                graph.add_edge(Edge {
                    address,
                    src,
                    dst,
                    timestamp_ms: initiative.record.timestamp_ms,
                })?;
            }
        }
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        skipped,
        "Initiatives graph built"
    );
    Ok(WeightedGraph::new(graph, declaration().default_weights()))
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct InitiativesAdapter;

impl InitiativesAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl SourceAdapter for InitiativesAdapter {
    fn declaration(&self) -> PluginDeclaration {
        declaration()
    }

    async fn update_mirror(
        &self,
        config: &SourceConfig,
        cache: &CacheProvider,
        reporter: &dyn ProgressReporter,
    ) -> Result<MirrorOutcome> {
        let SourceConfig::Initiatives { config, directory } = config else {
            return Err(Error::Internal(format!(
                "initiatives adapter given {} configuration",
                config.kind()
            )));
        };

        let _scope = TaskScope::start(reporter, SOURCE_NAME);
        let loaded = load_directory(directory, &config.remote_url).await?;

        let store = cache.open(SourceKind::Initiatives.name()).await?;
        set_metadata(&store, "directory", &directory.display().to_string()).await?;
        set_metadata(&store, "initiative_count", &loaded.len().to_string()).await?;

        Ok(MirrorOutcome {
            loaded_initiatives: Some(loaded),
        })
    }

    async fn create_graph(&self, input: GraphInput<'_>) -> Result<WeightedGraph> {
        let loaded = input.loaded_initiatives.ok_or_else(|| {
            Error::Internal("initiatives graph requested before the directory was loaded".to_string())
        })?;
        create_graph(loaded, input.reference_detector)
    }
}
