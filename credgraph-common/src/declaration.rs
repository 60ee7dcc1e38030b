//! Static per-source metadata
//!
//! A declaration lists the node and edge types a source contributes and their
//! default weights. It never depends on fetched data.

use crate::address::{EdgeAddress, NodeAddress};
use crate::compat::CompatInfo;
use crate::graph::{EdgeWeight, Weights};
use serde::{Deserialize, Serialize};

pub const DECLARATIONS_COMPAT: CompatInfo = CompatInfo {
    type_name: "sourcecred/pluginDeclarations",
    version: "0.1.0",
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeType {
    pub name: String,
    pub plural_name: String,
    pub prefix: NodeAddress,
    pub default_weight: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeType {
    pub forward_name: String,
    pub backward_name: String,
    pub prefix: EdgeAddress,
    pub default_weight: EdgeWeight,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDeclaration {
    pub name: String,
    pub node_prefix: NodeAddress,
    pub edge_prefix: EdgeAddress,
    pub node_types: Vec<NodeType>,
    pub edge_types: Vec<EdgeType>,
    /// Node types that represent people; their prefixes are the default
    /// scoring set
    pub user_types: Vec<NodeType>,
}

impl PluginDeclaration {
    /// Weight table seeded from the declared defaults
    pub fn default_weights(&self) -> Weights {
        let mut weights = Weights::new();
        for node_type in &self.node_types {
            weights
                .node_weights
                .insert(node_type.prefix.clone(), node_type.default_weight);
        }
        for edge_type in &self.edge_types {
            weights
                .edge_weights
                .insert(edge_type.prefix.clone(), edge_type.default_weight);
        }
        weights
    }
}

/// Prefixes of every declared user type, in declaration order
pub fn scoring_prefixes(declarations: &[PluginDeclaration]) -> Vec<NodeAddress> {
    let mut prefixes: Vec<NodeAddress> = Vec::new();
    for prefix in declarations
        .iter()
        .flat_map(|d| d.user_types.iter().map(|t| &t.prefix))
    {
        if !prefixes.contains(prefix) {
            prefixes.push(prefix.clone());
        }
    }
    prefixes
}
