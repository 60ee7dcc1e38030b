//! Graph composition tests
//!
//! Per-source graph construction, merge, and identity contraction.

mod helpers;

use credgraph::graphs::{contract_plugin_graphs, create_plugin_graphs};
use credgraph::mirror::update_mirror;
use credgraph::plugins::identity::identity_address;
use credgraph::plugins::Adapters;
use credgraph::reference::create_reference_detector;
use credgraph::types::SourceKind;
use credgraph_common::project::{DiscourseServer, Identity};
use credgraph_common::{Error, NodeAddress, Project, WeightedGraph};
use helpers::{test_env, user_graph, CallLog, CountingContractor, MockAdapter};
use std::sync::Arc;
use tempfile::TempDir;

const FORUM: &str = "https://forum.example";

fn two_source_project() -> Project {
    Project::new("p")
        .unwrap()
        .with_repo_ids(vec!["sourcecred/example".parse().unwrap()])
        .with_discourse_server(Some(DiscourseServer {
            server_url: FORUM.to_string(),
        }))
}

async fn compose(adapters: &Adapters, project: Project, dir: &TempDir) -> credgraph_common::Result<WeightedGraph> {
    let env = test_env(dir.path());
    let cached = update_mirror(adapters, &env, project).await?;
    let detector = create_reference_detector(adapters, &env, &cached).await?;
    let graphs = create_plugin_graphs(adapters, &env, cached, &detector).await?;
    contract_plugin_graphs(adapters, graphs)
}

#[tokio::test]
async fn test_merge_without_identities_skips_contractor() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::default();
    let contractor = Arc::new(CountingContractor::default());
    let github = user_graph("github", &["alice", "bob"]);
    let discourse = user_graph("discourse", &["carol"]);

    let adapters = Adapters::new()
        .with_source(
            SourceKind::Github,
            Arc::new(MockAdapter::new(SourceKind::Github, &log).with_graph(github.clone())),
        )
        .with_source(
            SourceKind::Discourse,
            Arc::new(MockAdapter::new(SourceKind::Discourse, &log).with_graph(discourse.clone())),
        )
        .with_identity(contractor.clone());

    let merged = compose(&adapters, two_source_project(), &dir).await.unwrap();

    assert_eq!(merged, WeightedGraph::merge(vec![github, discourse]).unwrap());
    assert_eq!(contractor.calls(), 0);
}

#[tokio::test]
async fn test_identities_contract_alias_nodes() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::default();
    let contractor = Arc::new(CountingContractor::default());

    let alice_github = NodeAddress::from_parts(["sourcecred", "github", "USERLIKE", "USER", "alice"]);
    let alice_forum = NodeAddress::from_parts(["sourcecred", "discourse", "user", FORUM, "alice"]);

    let mut github = WeightedGraph::empty();
    github.graph.add_node(helpers::node(&["sourcecred", "github", "USERLIKE", "USER", "alice"])).unwrap();
    let mut discourse = user_graph("discourse", &["topic-author"]);
    discourse.graph.add_node(helpers::node(&["sourcecred", "discourse", "user", FORUM, "alice"])).unwrap();
    discourse
        .graph
        .add_edge(credgraph_common::Edge {
            address: credgraph_common::EdgeAddress::from_parts(["sourcecred", "discourse", "likes", "1"]),
            src: alice_forum.clone(),
            dst: alice_github.clone(),
            timestamp_ms: 10,
        })
        .unwrap();

    let adapters = Adapters::new()
        .with_source(
            SourceKind::Github,
            Arc::new(MockAdapter::new(SourceKind::Github, &log).with_graph(github)),
        )
        .with_source(
            SourceKind::Discourse,
            Arc::new(MockAdapter::new(SourceKind::Discourse, &log).with_graph(discourse)),
        )
        .with_identity(contractor.clone());

    let project = two_source_project().with_identities(vec![Identity {
        username: "alice".to_string(),
        aliases: vec!["github/alice".to_string(), "discourse/alice".to_string()],
    }]);
    let contracted = compose(&adapters, project, &dir).await.unwrap();

    assert_eq!(contractor.calls(), 1);
    let alice = identity_address("alice").unwrap();
    assert!(contracted.graph.has_node(&alice));
    assert!(!contracted.graph.has_node(&alice_github));
    assert!(!contracted.graph.has_node(&alice_forum));

    let likes = contracted
        .graph
        .edge(&credgraph_common::EdgeAddress::from_parts([
            "sourcecred",
            "discourse",
            "likes",
            "1",
        ]))
        .unwrap();
    assert_eq!(likes.src, alice);
    assert_eq!(likes.dst, alice);
}

#[tokio::test]
async fn test_overlapping_graphs_fail_to_merge() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::default();
    let shared = user_graph("shared", &["x"]);

    let adapters = Adapters::new()
        .with_source(
            SourceKind::Github,
            Arc::new(MockAdapter::new(SourceKind::Github, &log).with_graph(shared.clone())),
        )
        .with_source(
            SourceKind::Discourse,
            Arc::new(MockAdapter::new(SourceKind::Discourse, &log).with_graph(shared)),
        );

    let result = compose(&adapters, two_source_project(), &dir).await;
    assert!(matches!(result, Err(Error::GraphMerge(_))));
}

#[tokio::test]
async fn test_graph_failure_waits_for_siblings() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::default();

    let adapters = Adapters::new()
        .with_source(
            SourceKind::Github,
            Arc::new(MockAdapter::new(SourceKind::Github, &log).with_delay(40)),
        )
        .with_source(
            SourceKind::Discourse,
            Arc::new(MockAdapter::new(SourceKind::Discourse, &log).failing_graph()),
        );

    match compose(&adapters, two_source_project(), &dir).await {
        Err(Error::SourceIo { source_name, .. }) => assert_eq!(source_name, "discourse"),
        other => panic!("unexpected result: {:?}", other.map(|g| g.graph.node_count())),
    }
    assert!(log.contains("github:graph:done"));
}

#[tokio::test]
async fn test_every_adapter_sees_composed_detector() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::default();
    let topic = NodeAddress::from_parts(["sourcecred", "discourse", "topic", "7"]);

    let github = MockAdapter::new(SourceKind::Github, &log).looking_up("https://forum.example/t/7");
    let resolved = Arc::clone(&github.resolved);
    let adapters = Adapters::new()
        .with_source(SourceKind::Github, Arc::new(github))
        .with_source(
            SourceKind::Discourse,
            Arc::new(
                MockAdapter::new(SourceKind::Discourse, &log)
                    .detecting("https://forum.example/t/7", topic.clone()),
            ),
        );

    compose(&adapters, two_source_project(), &dir).await.unwrap();
    assert_eq!(*resolved.lock().unwrap(), vec![Some(topic)]);
}

#[tokio::test]
async fn test_no_sources_yields_empty_graph() {
    let dir = TempDir::new().unwrap();
    let graph = compose(&Adapters::new(), Project::new("empty").unwrap(), &dir)
        .await
        .unwrap();
    assert_eq!(graph, WeightedGraph::empty());
}
