//! # credgraph Common Library
//!
//! Shared code for the credgraph crates:
//! - Node/edge addresses and the weighted graph
//! - Plugin declarations
//! - Project configuration and its versioned compat documents
//! - Per-source cache stores
//! - Configuration loading

pub mod address;
pub mod compat;
pub mod config;
pub mod db;
pub mod declaration;
pub mod error;
pub mod graph;
pub mod project;

pub use address::{EdgeAddress, NodeAddress};
pub use declaration::PluginDeclaration;
pub use error::{Error, Result};
pub use graph::{Edge, EdgeWeight, Graph, Node, WeightedGraph, Weights};
pub use project::Project;
