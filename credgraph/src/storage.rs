//! Project storage
//!
//! Layout under the root folder:
//!
//! ```text
//! <root>/projects/<base64url(project id)>/
//!     project.json              sourcecred/project
//!     graph.json                sourcecred/weightedGraph
//!     cred.json                 sourcecred/cred
//!     pluginDeclarations.json   sourcecred/pluginDeclarations
//! ```
//!
//! Every file is a compat document. Writes go to a temporary file first and
//! are renamed into place.

use crate::normalize::{CredScores, CRED_COMPAT};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use credgraph_common::compat::{from_compat_current, to_compat, CompatInfo};
use credgraph_common::config::projects_directory;
use credgraph_common::declaration::DECLARATIONS_COMPAT;
use credgraph_common::project::{serialize_project, upgrade_project};
use credgraph_common::{Error, PluginDeclaration, Project, Result, WeightedGraph};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const GRAPH_COMPAT: CompatInfo = CompatInfo {
    type_name: "sourcecred/weightedGraph",
    version: "0.2.0",
};

const PROJECT_FILE: &str = "project.json";
const GRAPH_FILE: &str = "graph.json";
const CRED_FILE: &str = "cred.json";
const DECLARATIONS_FILE: &str = "pluginDeclarations.json";

/// Optional outputs of a load, stored alongside the project
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectArtifacts<'a> {
    pub weighted_graph: Option<&'a WeightedGraph>,
    pub cred_scores: Option<&'a CredScores>,
    pub plugin_declarations: Option<&'a [PluginDeclaration]>,
}

/// File-backed project storage under `<root>/projects`
#[derive(Debug, Clone)]
pub struct ProjectStorage {
    projects_dir: PathBuf,
}

impl ProjectStorage {
    pub fn new(root: &Path) -> Self {
        Self {
            projects_dir: projects_directory(root),
        }
    }

    /// Directory holding one project's files
    pub fn project_directory(&self, project_id: &str) -> PathBuf {
        self.projects_dir.join(URL_SAFE_NO_PAD.encode(project_id))
    }

    /// Write the project and every present artifact
    pub async fn store(&self, project: &Project, artifacts: &ProjectArtifacts<'_>) -> Result<()> {
        let dir = self.project_directory(project.id());
        tokio::fs::create_dir_all(&dir).await?;

        write_document(&dir.join(PROJECT_FILE), &serialize_project(project)?).await?;
        if let Some(graph) = artifacts.weighted_graph {
            write_compat(&dir.join(GRAPH_FILE), &GRAPH_COMPAT, graph).await?;
        }
        if let Some(cred) = artifacts.cred_scores {
            write_compat(&dir.join(CRED_FILE), &CRED_COMPAT, cred).await?;
        }
        if let Some(declarations) = artifacts.plugin_declarations {
            write_compat(&dir.join(DECLARATIONS_FILE), &DECLARATIONS_COMPAT, &declarations).await?;
        }

        info!(
            project = project.id(),
            directory = %dir.display(),
            graph = artifacts.weighted_graph.is_some(),
            cred = artifacts.cred_scores.is_some(),
            declarations = artifacts.plugin_declarations.is_some(),
            "Project stored"
        );
        Ok(())
    }

    /// Read and upgrade a stored project
    pub async fn load_project(&self, project_id: &str) -> Result<Project> {
        let value = read_document(&self.project_directory(project_id).join(PROJECT_FILE)).await?;
        upgrade_project(value)
    }

    pub async fn load_weighted_graph(&self, project_id: &str) -> Result<WeightedGraph> {
        let value = read_document(&self.project_directory(project_id).join(GRAPH_FILE)).await?;
        from_compat_current(&GRAPH_COMPAT, value)
    }

    pub async fn load_cred(&self, project_id: &str) -> Result<CredScores> {
        let value = read_document(&self.project_directory(project_id).join(CRED_FILE)).await?;
        from_compat_current(&CRED_COMPAT, value)
    }

    pub async fn load_plugin_declarations(&self, project_id: &str) -> Result<Vec<PluginDeclaration>> {
        let value =
            read_document(&self.project_directory(project_id).join(DECLARATIONS_FILE)).await?;
        from_compat_current(&DECLARATIONS_COMPAT, value)
    }

    /// Ids of every stored project, sorted
    pub async fn project_ids(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.projects_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let decoded = name
                .to_str()
                .and_then(|n| URL_SAFE_NO_PAD.decode(n).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(id) => ids.push(id),
                None => warn!("Ignoring unrecognized project directory: {:?}", name),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

async fn write_compat<T: Serialize>(path: &Path, info: &CompatInfo, payload: &T) -> Result<()> {
    write_document(path, &to_compat(info, payload)?).await
}

async fn write_document(path: &Path, value: &Value) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec(value)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!("Wrote {}", path.display());
    Ok(())
}

async fn read_document(path: &Path) -> Result<Value> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}
