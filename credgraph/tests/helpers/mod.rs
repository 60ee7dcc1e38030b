//! Test Helper Utilities
//!
//! Mock adapters that record every invocation, a counting identity
//! contractor, and environment builders backed by temp directories.

#![allow(dead_code)]

use credgraph::plugins::identity::{IdentityContractor, IdentityPlugin};
use credgraph::plugins::PipelineEnv;
use credgraph::progress::{ProgressReporter, TaskScope, TracingReporter};
use credgraph::reference::MappedReferenceDetector;
use credgraph::types::{GraphInput, MirrorOutcome, ReferenceDetector, SourceAdapter, SourceConfig, SourceKind};
use credgraph_common::db::{set_metadata, CacheProvider};
use credgraph_common::declaration::NodeType;
use credgraph_common::project::Identity;
use credgraph_common::{
    Edge, EdgeAddress, Error, Graph, Node, NodeAddress, PluginDeclaration, Result, WeightedGraph,
    Weights,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered log of adapter invocations (`"<source>:<operation>"`)
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }
}

/// Configurable adapter for one source kind
pub struct MockAdapter {
    pub kind: SourceKind,
    pub log: CallLog,
    pub fail_mirror: bool,
    pub fail_graph: bool,
    pub delay: Duration,
    pub graph: WeightedGraph,
    pub detections: HashMap<String, NodeAddress>,
    /// Reference tokens looked up (through the composed detector) while
    /// building the graph
    pub lookups: Vec<String>,
    pub resolved: Arc<Mutex<Vec<Option<NodeAddress>>>>,
}

impl MockAdapter {
    pub fn new(kind: SourceKind, log: &CallLog) -> Self {
        Self {
            kind,
            log: log.clone(),
            fail_mirror: false,
            fail_graph: false,
            delay: Duration::ZERO,
            graph: WeightedGraph::empty(),
            detections: HashMap::new(),
            lookups: Vec::new(),
            resolved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_mirror(mut self) -> Self {
        self.fail_mirror = true;
        self
    }

    pub fn failing_graph(mut self) -> Self {
        self.fail_graph = true;
        self
    }

    pub fn with_delay(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn with_graph(mut self, graph: WeightedGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn detecting(mut self, token: &str, address: NodeAddress) -> Self {
        self.detections.insert(token.to_string(), address);
        self
    }

    pub fn looking_up(mut self, token: &str) -> Self {
        self.lookups.push(token.to_string());
        self
    }

    fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for MockAdapter {
    fn declaration(&self) -> PluginDeclaration {
        mock_declaration(self.name())
    }

    async fn update_mirror(
        &self,
        config: &SourceConfig,
        cache: &CacheProvider,
        reporter: &dyn ProgressReporter,
    ) -> Result<MirrorOutcome> {
        assert_eq!(config.kind(), self.kind);
        self.log.record(format!("{}:mirror:start", self.name()));
        let _scope = TaskScope::start(reporter, self.name());
        tokio::time::sleep(self.delay).await;

        if self.fail_mirror {
            self.log.record(format!("{}:mirror:failed", self.name()));
            return Err(Error::Internal(format!("{} unreachable", self.name())));
        }

        let store = cache.open(self.name()).await?;
        set_metadata(&store, "mirrored", "true").await?;
        self.log.record(format!("{}:mirror:done", self.name()));
        Ok(MirrorOutcome::default())
    }

    async fn create_graph(&self, input: GraphInput<'_>) -> Result<WeightedGraph> {
        self.log.record(format!("{}:graph:start", self.name()));
        tokio::time::sleep(self.delay).await;

        if self.fail_graph {
            self.log.record(format!("{}:graph:failed", self.name()));
            return Err(Error::Internal(format!("{} graph broken", self.name())));
        }

        let resolved: Vec<Option<NodeAddress>> = self
            .lookups
            .iter()
            .map(|token| input.reference_detector.detect(token))
            .collect();
        self.resolved.lock().unwrap().extend(resolved);

        self.log.record(format!("{}:graph:done", self.name()));
        Ok(self.graph.clone())
    }

    async fn reference_detector(
        &self,
        _config: &SourceConfig,
        _cache: &CacheProvider,
    ) -> Result<Option<Arc<dyn ReferenceDetector>>> {
        self.log.record(format!("{}:detector", self.name()));
        if self.detections.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(MappedReferenceDetector::new(
            self.detections.clone(),
        ))))
    }
}

/// Declaration with a single `user` node type under `sourcecred/<name>/user`
pub fn mock_declaration(name: &str) -> PluginDeclaration {
    let user = NodeType {
        name: "user".to_string(),
        plural_name: "users".to_string(),
        prefix: NodeAddress::from_parts(["sourcecred", name, "user"]),
        default_weight: 1.0,
        description: "A user".to_string(),
    };
    PluginDeclaration {
        name: name.to_string(),
        node_prefix: NodeAddress::from_parts(["sourcecred", name]),
        edge_prefix: EdgeAddress::from_parts(["sourcecred", name]),
        node_types: vec![user.clone()],
        edge_types: Vec::new(),
        user_types: vec![user],
    }
}

/// Identity contractor that counts how often it is consulted
#[derive(Default)]
pub struct CountingContractor {
    pub calls: AtomicUsize,
    inner: IdentityPlugin,
}

impl CountingContractor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityContractor for CountingContractor {
    fn declaration(&self) -> PluginDeclaration {
        self.inner.declaration()
    }

    fn contract(
        &self,
        graph: WeightedGraph,
        identities: &[Identity],
        discourse_server_url: Option<&str>,
    ) -> Result<WeightedGraph> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.contract(graph, identities, discourse_server_url)
    }
}

/// Pipeline environment with a temp cache and credentials for every source
pub fn test_env(root: &Path) -> PipelineEnv {
    PipelineEnv::new(
        CacheProvider::new(root.join("cache")),
        Arc::new(TracingReporter::new()),
    )
    .with_github_token(Some("test-token".to_string()))
    .with_initiatives_directory(Some(root.join("initiatives")))
}

pub fn node(parts: &[&str]) -> Node {
    Node {
        address: NodeAddress::from_parts(parts.iter().copied()),
        description: parts.last().copied().unwrap_or_default().to_string(),
        timestamp_ms: None,
    }
}

/// Graph with one node per `names` under `sourcecred/<source>/user` and a
/// chain of edges between them
pub fn user_graph(source: &str, names: &[&str]) -> WeightedGraph {
    let mut graph = Graph::new();
    let nodes: Vec<Node> = names
        .iter()
        .map(|name| node(&["sourcecred", source, "user", name]))
        .collect();
    for n in &nodes {
        graph.add_node(n.clone()).unwrap();
    }
    for (i, pair) in nodes.windows(2).enumerate() {
        graph
            .add_edge(Edge {
                address: EdgeAddress::from_parts(["sourcecred", source, "follows", i.to_string().as_str()]),
                src: pair[0].address.clone(),
                dst: pair[1].address.clone(),
                timestamp_ms: 0,
            })
            .unwrap();
    }
    let mut weights = Weights::new();
    weights
        .node_weights
        .insert(NodeAddress::from_parts(["sourcecred", source, "user"]), 1.0);
    WeightedGraph::new(graph, weights)
}
