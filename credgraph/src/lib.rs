//! # credgraph
//!
//! Composes per-source contribution graphs into one weighted graph and turns
//! solver output into cred.
//!
//! **Stages (in order):**
//! 1. [`mirror`] - concurrent per-source cache updates
//! 2. [`reference`] - cascading reference detector over every source
//! 3. [`graphs`] - concurrent per-source graphs, merge, identity contraction
//! 4. [`normalize`] - distributions to cred
//!
//! [`load::Loader`] runs the stages for one project and hands the results to
//! [`storage::ProjectStorage`].

pub mod graphs;
pub mod load;
pub mod mirror;
pub mod normalize;
pub mod plugins;
pub mod progress;
pub mod reference;
pub mod storage;
pub mod types;

pub use graphs::{contract_plugin_graphs, create_plugin_graphs, PluginGraphs};
pub use load::{LoadResult, Loader, MassSolver, SolverOutput};
pub use mirror::{update_mirror, CachedProject};
pub use normalize::{distribution_to_cred, try_distribution_to_cred, CredScores};
pub use plugins::{Adapters, PipelineEnv};
pub use reference::{create_reference_detector, CascadingReferenceDetector};
pub use types::{ReferenceDetector, SourceAdapter, SourceConfig, SourceKind};
