//! Load pipeline
//!
//! Runs every stage for one project, strictly in order:
//!
//! 1. **Mirror** - update every applicable source's cache store
//! 2. **Reference detection** - compose the per-source detectors
//! 3. **Graph** - build per-source graphs, merge, contract identities
//! 4. **Cred** (only with a solver) - solve, then normalize with the user-type
//!    prefixes of the project's declarations
//! 5. **Store** - hand the project and its artifacts to storage
//!
//! Any stage failure aborts the run before storage is touched.
//!
//! # Example
//! ```rust,ignore
//! let loader = Loader::new(Adapters::builtin(), env, ProjectStorage::new(&root));
//! let result = loader.load(project).await?;
//! ```

use crate::graphs::{contract_plugin_graphs, create_plugin_graphs};
use crate::mirror::update_mirror;
use crate::normalize::{try_distribution_to_cred, CredScores, IntervalDistribution};
use crate::plugins::{Adapters, PipelineEnv};
use crate::progress::TaskScope;
use crate::reference::create_reference_detector;
use crate::storage::{ProjectArtifacts, ProjectStorage};
use credgraph_common::declaration::scoring_prefixes;
use credgraph_common::{NodeAddress, PluginDeclaration, Project, Result, WeightedGraph};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Solver output: per-interval distributions over `node_order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverOutput {
    pub node_order: Vec<NodeAddress>,
    pub distributions: Vec<IntervalDistribution>,
}

/// Computes per-interval stationary distributions of a weighted graph
#[async_trait::async_trait]
pub trait MassSolver: Send + Sync {
    async fn solve(&self, graph: &WeightedGraph) -> Result<SolverOutput>;
}

/// Everything a load produced
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub project: Project,
    pub weighted_graph: WeightedGraph,
    pub plugin_declarations: Vec<PluginDeclaration>,
    pub cred_scores: Option<CredScores>,
}

pub struct Loader {
    adapters: Adapters,
    env: PipelineEnv,
    storage: ProjectStorage,
    solver: Option<Arc<dyn MassSolver>>,
}

impl Loader {
    pub fn new(adapters: Adapters, env: PipelineEnv, storage: ProjectStorage) -> Self {
        Self {
            adapters,
            env,
            storage,
            solver: None,
        }
    }

    pub fn with_solver(mut self, solver: Arc<dyn MassSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Run every stage for `project` and store the results
    pub async fn load(&self, project: Project) -> Result<LoadResult> {
        let project_id = project.id().to_string();
        info!(project = %project_id, "Load started");
        let task = |stage: &str| format!("load/{}/{}", project_id, stage);
        let reporter = self.env.reporter.as_ref();

        let cached = {
            let _scope = TaskScope::start(reporter, task("mirror"));
            update_mirror(&self.adapters, &self.env, project).await?
        };

        let (project, weighted_graph) = {
            let _scope = TaskScope::start(reporter, task("graph"));
            let detector = create_reference_detector(&self.adapters, &self.env, &cached).await?;
            let plugin_graphs =
                create_plugin_graphs(&self.adapters, &self.env, cached, &detector).await?;
            let project = plugin_graphs.cached_project.project.clone();
            (project, contract_plugin_graphs(&self.adapters, plugin_graphs)?)
        };

        let plugin_declarations = self.adapters.declarations(&project);

        let cred_scores = match &self.solver {
            Some(solver) => {
                let _scope = TaskScope::start(reporter, task("cred"));
                let output = solver.solve(&weighted_graph).await?;
                let prefixes = scoring_prefixes(&plugin_declarations);
                let cred =
                    try_distribution_to_cred(&output.distributions, &output.node_order, &prefixes)?;
                Some(cred)
            }
            None => None,
        };

        let artifacts = ProjectArtifacts {
            weighted_graph: Some(&weighted_graph),
            cred_scores: cred_scores.as_ref(),
            plugin_declarations: Some(plugin_declarations.as_slice()),
        };
        self.storage.store(&project, &artifacts).await?;

        info!(
            project = %project_id,
            cred = cred_scores.is_some(),
            "Load finished"
        );
        Ok(LoadResult {
            project,
            weighted_graph,
            plugin_declarations,
            cred_scores,
        })
    }
}
