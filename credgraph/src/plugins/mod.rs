//! Source adapters and their per-run environment
//!
//! # Adapters
//! - **initiatives** - manually authored initiative set, read from a local
//!   directory (linked into the binary)
//! - **identity** - contracts user nodes that belong to one person
//!
//! Code-hosting and forum adapters talk to network services and are supplied
//! by the embedding application through [`Adapters::with_source`]. A project
//! that needs a source with no linked adapter fails with a configuration
//! error before any adapter runs.

pub mod identity;
pub mod initiatives;

use crate::progress::ProgressReporter;
use crate::types::{SourceAdapter, SourceConfig, SourceKind};
use credgraph_common::db::CacheProvider;
use credgraph_common::{Error, PluginDeclaration, Project, Result};
use identity::{IdentityContractor, IdentityPlugin};
use initiatives::InitiativesAdapter;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// The adapter linked for each source kind, plus the identity contractor
#[derive(Clone)]
pub struct Adapters {
    sources: BTreeMap<SourceKind, Arc<dyn SourceAdapter>>,
    identity: Arc<dyn IdentityContractor>,
}

impl Default for Adapters {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapters {
    /// No source adapters, default identity contractor
    pub fn new() -> Self {
        Self {
            sources: BTreeMap::new(),
            identity: Arc::new(IdentityPlugin::new()),
        }
    }

    /// Adapters that ship with the binary
    pub fn builtin() -> Self {
        Self::new().with_source(SourceKind::Initiatives, Arc::new(InitiativesAdapter::new()))
    }

    pub fn with_source(mut self, kind: SourceKind, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.sources.insert(kind, adapter);
        self
    }

    pub fn with_identity(mut self, contractor: Arc<dyn IdentityContractor>) -> Self {
        self.identity = contractor;
        self
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn SourceAdapter>> {
        self.sources.get(&kind)
    }

    pub fn identity(&self) -> &Arc<dyn IdentityContractor> {
        &self.identity
    }

    /// Declarations of every linked applicable source, plus the identity
    /// declaration when the project merges identities
    pub fn declarations(&self, project: &Project) -> Vec<PluginDeclaration> {
        let mut declarations: Vec<PluginDeclaration> = SourceKind::applicable(project)
            .into_iter()
            .filter_map(|kind| self.get(kind))
            .map(|adapter| adapter.declaration())
            .collect();
        if !project.identities().is_empty() {
            declarations.push(self.identity.declaration());
        }
        declarations
    }
}

/// Credentials, local paths and shared handles for one pipeline run
#[derive(Clone)]
pub struct PipelineEnv {
    pub github_token: Option<String>,
    pub initiatives_directory: Option<PathBuf>,
    pub cache: CacheProvider,
    pub reporter: Arc<dyn ProgressReporter>,
}

impl PipelineEnv {
    pub fn new(cache: CacheProvider, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            github_token: None,
            initiatives_directory: None,
            cache,
            reporter,
        }
    }

    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token;
        self
    }

    pub fn with_initiatives_directory(mut self, directory: Option<PathBuf>) -> Self {
        self.initiatives_directory = directory;
        self
    }
}

/// An applicable source with its adapter and resolved configuration
#[derive(Clone)]
pub struct PreparedSource {
    pub config: SourceConfig,
    pub adapter: Arc<dyn SourceAdapter>,
}

impl PreparedSource {
    pub fn kind(&self) -> SourceKind {
        self.config.kind()
    }
}

/// Resolve the configuration of every applicable source, in fixed order.
///
/// Performs no I/O and invokes no adapter. Fails with [`Error::Config`] when
/// a required credential or local directory is missing, or when no adapter is
/// linked for a source the project needs.
pub fn applicable_sources(
    adapters: &Adapters,
    project: &Project,
    env: &PipelineEnv,
) -> Result<Vec<PreparedSource>> {
    let mut prepared = Vec::new();
    for kind in SourceKind::applicable(project) {
        let config = match kind {
            SourceKind::Github => {
                let token = env.github_token.clone().ok_or_else(|| {
                    Error::Config(
                        "project has repositories but no GitHub token is configured".to_string(),
                    )
                })?;
                SourceConfig::Github {
                    repo_ids: project.repo_ids().to_vec(),
                    token,
                }
            }
            SourceKind::Discourse => match project.discourse_server() {
                Some(server) => SourceConfig::Discourse {
                    server: server.clone(),
                },
                None => continue,
            },
            SourceKind::Initiatives => {
                let directory = env.initiatives_directory.clone().ok_or_else(|| {
                    Error::Config(
                        "project has initiatives but no initiatives directory is configured"
                            .to_string(),
                    )
                })?;
                match project.initiatives() {
                    Some(config) => SourceConfig::Initiatives {
                        config: config.clone(),
                        directory,
                    },
                    None => continue,
                }
            }
        };

        let adapter = adapters.get(kind).cloned().ok_or_else(|| {
            Error::Config(format!("no {} adapter is available in this build", kind))
        })?;
        prepared.push(PreparedSource { config, adapter });
    }
    Ok(prepared)
}

/// Collect the settled results of one concurrent stage.
///
/// Every failure is logged; the first failure in source order is returned,
/// wrapped as a source I/O error.
pub(crate) fn settle<T>(stage: &str, results: Vec<(SourceKind, Result<T>)>) -> Result<Vec<(SourceKind, T)>> {
    let mut values = Vec::with_capacity(results.len());
    let mut first_error: Option<Error> = None;
    for (kind, result) in results {
        match result {
            Ok(value) => values.push((kind, value)),
            Err(e) => {
                warn!(stage, source = kind.name(), error = %e, "Source failed");
                if first_error.is_none() {
                    first_error = Some(Error::from_source(kind.name(), e));
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credgraph_common::project::{DiscourseServer, InitiativesConfig};

    fn env(dir: &std::path::Path) -> PipelineEnv {
        PipelineEnv::new(
            CacheProvider::new(dir.join("cache")),
            Arc::new(crate::progress::TracingReporter::new()),
        )
    }

    fn full_project() -> Project {
        Project::new("p")
            .unwrap()
            .with_repo_ids(vec!["a/b".parse().unwrap()])
            .with_discourse_server(Some(DiscourseServer {
                server_url: "https://forum.example".to_string(),
            }))
            .with_initiatives(Some(InitiativesConfig {
                remote_url: "https://example.com/initiatives".to_string(),
            }))
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = applicable_sources(&Adapters::builtin(), &full_project(), &env(dir.path()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_adapter_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(dir.path()).with_github_token(Some("t".to_string()));
        let project = Project::new("p")
            .unwrap()
            .with_repo_ids(vec!["a/b".parse().unwrap()]);
        match applicable_sources(&Adapters::builtin(), &project, &env) {
            Err(Error::Config(msg)) => assert!(msg.contains("github")),
            other => panic!("expected config error, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_missing_initiatives_directory_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("p")
            .unwrap()
            .with_initiatives(Some(InitiativesConfig {
                remote_url: "https://example.com/i".to_string(),
            }));
        let result = applicable_sources(&Adapters::builtin(), &project, &env(dir.path()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_project_has_no_sources() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("p").unwrap();
        let sources = applicable_sources(&Adapters::new(), &project, &env(dir.path())).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_settle_reports_first_failure_in_order() {
        let results: Vec<(SourceKind, Result<u32>)> = vec![
            (SourceKind::Github, Ok(1)),
            (SourceKind::Discourse, Err(Error::Internal("forum down".to_string()))),
            (SourceKind::Initiatives, Err(Error::Internal("bad file".to_string()))),
        ];
        match settle("test", results) {
            Err(Error::SourceIo { source_name, message }) => {
                assert_eq!(source_name, "discourse");
                assert!(message.contains("forum down"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_declarations_include_identity_only_with_identities() {
        let project = Project::new("p")
            .unwrap()
            .with_initiatives(Some(InitiativesConfig {
                remote_url: "https://example.com/i".to_string(),
            }));
        let adapters = Adapters::builtin();
        let names: Vec<String> = adapters
            .declarations(&project)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["initiatives"]);

        let project = project.with_identities(vec![credgraph_common::project::Identity {
            username: "alice".to_string(),
            aliases: vec![],
        }]);
        let names: Vec<String> = adapters
            .declarations(&project)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["initiatives", "identity"]);
    }
}
