//! Identity contraction
//!
//! A project may declare that several per-source user accounts belong to one
//! person. Each such identity gets a node at `sourcecred/identity/<username>`
//! and every alias node is contracted into it.

use credgraph_common::declaration::NodeType;
use credgraph_common::graph::NodeContraction;
use credgraph_common::project::Identity;
use credgraph_common::{
    EdgeAddress, Error, Node, NodeAddress, PluginDeclaration, Result, WeightedGraph,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// Rewrites a merged graph so each identity's aliases become one node
pub trait IdentityContractor: Send + Sync {
    fn declaration(&self) -> PluginDeclaration;

    fn contract(
        &self,
        graph: WeightedGraph,
        identities: &[Identity],
        discourse_server_url: Option<&str>,
    ) -> Result<WeightedGraph>;
}

fn identity_prefix() -> NodeAddress {
    NodeAddress::from_parts(["sourcecred", "identity"])
}

fn identity_node_type() -> NodeType {
    NodeType {
        name: "identity".to_string(),
        plural_name: "identities".to_string(),
        prefix: identity_prefix(),
        default_weight: 0.0,
        description: "A contributor with one or more linked accounts".to_string(),
    }
}

pub fn declaration() -> PluginDeclaration {
    let node_type = identity_node_type();
    PluginDeclaration {
        name: "identity".to_string(),
        node_prefix: identity_prefix(),
        edge_prefix: EdgeAddress::from_parts(["sourcecred", "identity"]),
        node_types: vec![node_type.clone()],
        edge_types: Vec::new(),
        user_types: vec![node_type],
    }
}

/// Validate a username, stripping one leading `@`
pub fn normalize_username(username: &str) -> Result<&str> {
    let name = username.strip_prefix('@').unwrap_or(username);
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidInput(format!("invalid username: {:?}", username)))
    }
}

pub fn identity_address(username: &str) -> Result<NodeAddress> {
    identity_prefix().append([normalize_username(username)?])
}

pub fn github_user_address(login: &str) -> Result<NodeAddress> {
    NodeAddress::try_from_parts(["sourcecred", "github", "USERLIKE", "USER", login])
}

pub fn discourse_user_address(server_url: &str, name: &str) -> Result<NodeAddress> {
    NodeAddress::try_from_parts(["sourcecred", "discourse", "user", server_url, name])
}

/// Resolve an alias such as `github/alice` to the user node it names
pub fn resolve_alias(alias: &str, discourse_server_url: Option<&str>) -> Result<NodeAddress> {
    let (source, name) = alias
        .split_once('/')
        .filter(|(_, name)| !name.is_empty())
        .ok_or_else(|| {
            Error::InvalidInput(format!("alias must look like <source>/<name>: {:?}", alias))
        })?;
    match source {
        "github" => github_user_address(normalize_username(name)?),
        "discourse" => {
            let server_url = discourse_server_url.ok_or_else(|| {
                Error::Config(format!(
                    "alias {:?} needs a discourse server, but the project has none",
                    alias
                ))
            })?;
            discourse_user_address(server_url, normalize_username(name)?)
        }
        other => Err(Error::InvalidInput(format!(
            "unknown alias source {:?} in {:?}",
            other, alias
        ))),
    }
}

/// One contraction per identity. An alias claimed by two identities, or two
/// identities with the same username, is rejected.
pub fn identity_contractions(
    identities: &[Identity],
    discourse_server_url: Option<&str>,
) -> Result<Vec<NodeContraction>> {
    let mut claimed: HashMap<NodeAddress, &str> = HashMap::new();
    let mut contractions = Vec::with_capacity(identities.len());

    for identity in identities {
        let username = normalize_username(&identity.username)?;
        let replacement = Node {
            address: identity_address(username)?,
            description: username.to_string(),
            timestamp_ms: None,
        };
        if contractions
            .iter()
            .any(|c: &NodeContraction| c.replacement.address == replacement.address)
        {
            return Err(Error::InvalidInput(format!(
                "identity {:?} is declared twice",
                username
            )));
        }

        let mut old = Vec::with_capacity(identity.aliases.len());
        for alias in &identity.aliases {
            let address = resolve_alias(alias, discourse_server_url)?;
            match claimed.get(&address) {
                Some(owner) if *owner != username => {
                    return Err(Error::InvalidInput(format!(
                        "alias {:?} is claimed by both {:?} and {:?}",
                        alias, owner, username
                    )));
                }
                Some(_) => continue,
                None => {
                    claimed.insert(address.clone(), username);
                    old.push(address);
                }
            }
        }
        debug!(identity = username, aliases = old.len(), "Identity resolved");
        contractions.push(NodeContraction { old, replacement });
    }
    Ok(contractions)
}

/// Default identity contractor
#[derive(Debug, Clone, Default)]
pub struct IdentityPlugin;

impl IdentityPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl IdentityContractor for IdentityPlugin {
    fn declaration(&self) -> PluginDeclaration {
        declaration()
    }

    fn contract(
        &self,
        graph: WeightedGraph,
        identities: &[Identity],
        discourse_server_url: Option<&str>,
    ) -> Result<WeightedGraph> {
        let contractions = identity_contractions(identities, discourse_server_url)?;
        let WeightedGraph { graph, mut weights } = graph;
        let graph = graph.contract_nodes(&contractions);

        let node_type = identity_node_type();
        weights
            .node_weights
            .entry(node_type.prefix)
            .or_insert(node_type.default_weight);

        info!(
            identities = contractions.len(),
            nodes = graph.node_count(),
            "Identities contracted"
        );
        Ok(WeightedGraph::new(graph, weights))
    }
}
