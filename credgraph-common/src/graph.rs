//! Address graph and weighted graph
//!
//! Nodes and edges are keyed by address. Edges may dangle: a per-source graph
//! routinely points at nodes owned by another source, and those endpoints only
//! appear once the per-source graphs are merged.
//!
//! Merging is a namespace-disjoint union. Any address present in two inputs is
//! an adapter namespace bug and fails with [`Error::GraphMerge`] instead of one
//! side silently winning.

use crate::address::{EdgeAddress, NodeAddress};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub address: NodeAddress,
    pub description: String,
    /// Creation time in milliseconds since the epoch; `None` for timeless
    /// nodes such as users and identities
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub address: EdgeAddress,
    pub src: NodeAddress,
    pub dst: NodeAddress,
    pub timestamp_ms: i64,
}

/// Replace every address in `old` with the single `replacement` node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeContraction {
    pub old: Vec<NodeAddress>,
    pub replacement: Node,
}

#[derive(Serialize, Deserialize)]
struct GraphJson {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// Node/edge address graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphJson", into = "GraphJson")]
pub struct Graph {
    nodes: BTreeMap<NodeAddress, Node>,
    edges: BTreeMap<EdgeAddress, Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Re-adding an identical node is a no-op; a different node
    /// under the same address is rejected.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        match self.nodes.get(&node.address) {
            Some(existing) if *existing == node => Ok(()),
            Some(existing) => Err(Error::InvalidInput(format!(
                "conflicting node at {}: {:?} vs {:?}",
                node.address, existing.description, node.description
            ))),
            None => {
                self.nodes.insert(node.address.clone(), node);
                Ok(())
            }
        }
    }

    /// Add an edge. Endpoints do not have to be present.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        match self.edges.get(&edge.address) {
            Some(existing) if *existing == edge => Ok(()),
            Some(_) => Err(Error::InvalidInput(format!(
                "conflicting edge at {}",
                edge.address
            ))),
            None => {
                self.edges.insert(edge.address.clone(), edge);
                Ok(())
            }
        }
    }

    pub fn node(&self, address: &NodeAddress) -> Option<&Node> {
        self.nodes.get(address)
    }

    pub fn edge(&self, address: &EdgeAddress) -> Option<&Edge> {
        self.edges.get(address)
    }

    pub fn has_node(&self, address: &NodeAddress) -> bool {
        self.nodes.contains_key(address)
    }

    /// Nodes in address order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in address order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Namespace-disjoint union of `graphs`
    pub fn merge<I>(graphs: I) -> Result<Graph>
    where
        I: IntoIterator<Item = Graph>,
    {
        let mut merged = Graph::new();
        for graph in graphs {
            for (address, node) in graph.nodes {
                if merged.nodes.contains_key(&address) {
                    return Err(Error::GraphMerge(format!(
                        "node address {} produced by more than one graph",
                        address
                    )));
                }
                merged.nodes.insert(address, node);
            }
            for (address, edge) in graph.edges {
                if merged.edges.contains_key(&address) {
                    return Err(Error::GraphMerge(format!(
                        "edge address {} produced by more than one graph",
                        address
                    )));
                }
                merged.edges.insert(address, edge);
            }
        }
        Ok(merged)
    }

    /// Rewrite the graph so each contraction's `old` nodes become its
    /// replacement node. Edges are re-pointed, never dropped.
    ///
    /// When an address appears in more than one contraction the later
    /// contraction wins.
    pub fn contract_nodes(self, contractions: &[NodeContraction]) -> Graph {
        let mut remap: HashMap<&NodeAddress, &NodeAddress> = HashMap::new();
        for contraction in contractions {
            for old in &contraction.old {
                remap.insert(old, &contraction.replacement.address);
            }
        }

        let mut nodes: BTreeMap<NodeAddress, Node> = self
            .nodes
            .into_iter()
            .filter(|(address, _)| !remap.contains_key(address))
            .collect();
        for contraction in contractions {
            nodes.insert(
                contraction.replacement.address.clone(),
                contraction.replacement.clone(),
            );
        }

        let resolve = |address: NodeAddress| -> NodeAddress {
            match remap.get(&address) {
                Some(replacement) => (*replacement).clone(),
                None => address,
            }
        };
        let edges = self
            .edges
            .into_iter()
            .map(|(address, edge)| {
                let edge = Edge {
                    src: resolve(edge.src),
                    dst: resolve(edge.dst),
                    ..edge
                };
                (address, edge)
            })
            .collect();

        debug!(
            contractions = contractions.len(),
            contracted_nodes = remap.len(),
            "Contracted graph nodes"
        );

        Graph { nodes, edges }
    }
}

impl TryFrom<GraphJson> for Graph {
    type Error = Error;

    fn try_from(json: GraphJson) -> Result<Self> {
        let mut graph = Graph::new();
        for node in json.nodes {
            graph.add_node(node)?;
        }
        for edge in json.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }
}

impl From<Graph> for GraphJson {
    fn from(graph: Graph) -> Self {
        GraphJson {
            nodes: graph.nodes.into_values().collect(),
            edges: graph.edges.into_values().collect(),
        }
    }
}

/// Weight of an edge in each direction of the random walk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeWeight {
    pub forwards: f64,
    pub backwards: f64,
}

/// Importance weights keyed by address prefix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weights {
    pub node_weights: BTreeMap<NodeAddress, f64>,
    pub edge_weights: BTreeMap<EdgeAddress, EdgeWeight>,
}

impl Weights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of weight tables. Equal duplicates are accepted; two different
    /// weights for one prefix are a merge error.
    pub fn merge<I>(all: I) -> Result<Weights>
    where
        I: IntoIterator<Item = Weights>,
    {
        let mut merged = Weights::new();
        for weights in all {
            for (prefix, weight) in weights.node_weights {
                match merged.node_weights.get(&prefix) {
                    Some(existing) if *existing != weight => {
                        return Err(Error::GraphMerge(format!(
                            "conflicting node weights for {}: {} vs {}",
                            prefix, existing, weight
                        )));
                    }
                    _ => {
                        merged.node_weights.insert(prefix, weight);
                    }
                }
            }
            for (prefix, weight) in weights.edge_weights {
                match merged.edge_weights.get(&prefix) {
                    Some(existing) if *existing != weight => {
                        return Err(Error::GraphMerge(format!(
                            "conflicting edge weights for {}: {:?} vs {:?}",
                            prefix, existing, weight
                        )));
                    }
                    _ => {
                        merged.edge_weights.insert(prefix, weight);
                    }
                }
            }
        }
        Ok(merged)
    }
}

/// A graph plus the weights the solver uses to walk it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedGraph {
    pub graph: Graph,
    pub weights: Weights,
}

impl WeightedGraph {
    pub fn new(graph: Graph, weights: Weights) -> Self {
        Self { graph, weights }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge graphs and weights; merging nothing yields the empty graph
    pub fn merge<I>(all: I) -> Result<WeightedGraph>
    where
        I: IntoIterator<Item = WeightedGraph>,
    {
        let (graphs, weights): (Vec<Graph>, Vec<Weights>) =
            all.into_iter().map(|wg| (wg.graph, wg.weights)).unzip();
        Ok(WeightedGraph {
            graph: Graph::merge(graphs)?,
            weights: Weights::merge(weights)?,
        })
    }
}
