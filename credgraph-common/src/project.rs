//! Project configuration and its persisted versions
//!
//! A project names which sources apply and how. It is persisted inside a
//! compat envelope tagged `sourcecred/project`; older documents are brought
//! up to the current shape by an explicit chain of migrations.
//!
//! # Version history
//!
//! | from  | to    | change                                           |
//! |-------|-------|--------------------------------------------------|
//! | 0.3.0 | 0.3.1 | `discourseServer` drops `apiUsername`            |
//! | 0.3.1 | 0.4.0 | adds `identities` (default `[]`)                 |
//! | 0.4.0 | 0.5.0 | adds `initiatives` (default `null`)              |
//!
//! Never modify an existing migration. A new shape gets a new version tag, a
//! new legacy struct, and a new row in [`MIGRATIONS`].

use crate::compat::{from_compat, to_compat, CompatInfo};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Current project document tag
pub const PROJECT_COMPAT: CompatInfo = CompatInfo {
    type_name: "sourcecred/project",
    version: "0.5.0",
};

/// Code-hosting repository identifier (`owner/name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawRepoId")]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

#[derive(Deserialize)]
struct RawRepoId {
    owner: String,
    name: String,
}

impl TryFrom<RawRepoId> for RepoId {
    type Error = Error;

    fn try_from(raw: RawRepoId) -> Result<Self> {
        RepoId::new(raw.owner, raw.name)
    }
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();
        let valid = |s: &str| !s.is_empty() && !s.contains('/') && !s.contains(char::is_whitespace);
        if !valid(&owner) || !valid(&name) {
            return Err(Error::InvalidInput(format!(
                "invalid repository id: {:?}/{:?}",
                owner, name
            )));
        }
        Ok(Self { owner, name })
    }
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, name)) => RepoId::new(owner, name),
            None => Err(Error::InvalidInput(format!(
                "repository id must look like owner/name: {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Discussion forum server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscourseServer {
    pub server_url: String,
}

/// Manual identity merge: every alias names the same person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    /// `<source>/<name>`, e.g. `github/alice` or `discourse/alice`
    pub aliases: Vec<String>,
}

/// Manually authored initiative set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativesConfig {
    pub remote_url: String,
}

/// Project configuration (current shape, 0.5.0)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ProjectV050")]
pub struct Project {
    id: String,
    repo_ids: Vec<RepoId>,
    discourse_server: Option<DiscourseServer>,
    identities: Vec<Identity>,
    initiatives: Option<InitiativesConfig>,
}

impl Project {
    /// New project with every optional field empty
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidInput("project id must not be empty".to_string()));
        }
        Ok(Self {
            id,
            repo_ids: Vec::new(),
            discourse_server: None,
            identities: Vec::new(),
            initiatives: None,
        })
    }

    pub fn with_repo_ids(mut self, repo_ids: Vec<RepoId>) -> Self {
        self.repo_ids = repo_ids;
        self
    }

    pub fn with_discourse_server(mut self, server: Option<DiscourseServer>) -> Self {
        self.discourse_server = server;
        self
    }

    pub fn with_identities(mut self, identities: Vec<Identity>) -> Self {
        self.identities = identities;
        self
    }

    pub fn with_initiatives(mut self, initiatives: Option<InitiativesConfig>) -> Self {
        self.initiatives = initiatives;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_ids(&self) -> &[RepoId] {
        &self.repo_ids
    }

    pub fn discourse_server(&self) -> Option<&DiscourseServer> {
        self.discourse_server.as_ref()
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn initiatives(&self) -> Option<&InitiativesConfig> {
        self.initiatives.as_ref()
    }
}

// ============================================================================
// Persisted shapes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscourseServerV030 {
    server_url: String,
    api_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectV030 {
    id: String,
    #[serde(default)]
    repo_ids: Vec<RepoId>,
    discourse_server: Option<DiscourseServerV030>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectV031 {
    id: String,
    #[serde(default)]
    repo_ids: Vec<RepoId>,
    discourse_server: Option<DiscourseServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectV040 {
    id: String,
    #[serde(default)]
    repo_ids: Vec<RepoId>,
    discourse_server: Option<DiscourseServer>,
    #[serde(default)]
    identities: Vec<Identity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectV050 {
    id: String,
    #[serde(default)]
    repo_ids: Vec<RepoId>,
    discourse_server: Option<DiscourseServer>,
    #[serde(default)]
    identities: Vec<Identity>,
    initiatives: Option<InitiativesConfig>,
}

impl TryFrom<ProjectV050> for Project {
    type Error = Error;

    fn try_from(p: ProjectV050) -> Result<Self> {
        Ok(Project::new(p.id)?
            .with_repo_ids(p.repo_ids)
            .with_discourse_server(p.discourse_server)
            .with_identities(p.identities)
            .with_initiatives(p.initiatives))
    }
}

fn upgrade_from_030(p: ProjectV030) -> ProjectV031 {
    ProjectV031 {
        id: p.id,
        repo_ids: p.repo_ids,
        discourse_server: p.discourse_server.map(|s| DiscourseServer {
            server_url: s.server_url,
        }),
    }
}

fn upgrade_from_031(p: ProjectV031) -> ProjectV040 {
    ProjectV040 {
        id: p.id,
        repo_ids: p.repo_ids,
        discourse_server: p.discourse_server,
        identities: Vec::new(),
    }
}

fn upgrade_from_040(p: ProjectV040) -> ProjectV050 {
    ProjectV050 {
        id: p.id,
        repo_ids: p.repo_ids,
        discourse_server: p.discourse_server,
        identities: p.identities,
        initiatives: None,
    }
}

type Migration = fn(Value) -> Result<Value>;

/// Ordered upgrade table: `(from, to, migration)`
const MIGRATIONS: &[(&str, &str, Migration)] = &[
    ("0.3.0", "0.3.1", migrate_030),
    ("0.3.1", "0.4.0", migrate_031),
    ("0.4.0", "0.5.0", migrate_040),
];

fn migrate_030(v: Value) -> Result<Value> {
    Ok(serde_json::to_value(upgrade_from_030(serde_json::from_value(v)?))?)
}

fn migrate_031(v: Value) -> Result<Value> {
    Ok(serde_json::to_value(upgrade_from_031(serde_json::from_value(v)?))?)
}

fn migrate_040(v: Value) -> Result<Value> {
    Ok(serde_json::to_value(upgrade_from_040(serde_json::from_value(v)?))?)
}

/// Serialize a project at the current version
pub fn serialize_project(project: &Project) -> Result<Value> {
    to_compat(&PROJECT_COMPAT, project)
}

/// Read a project document of any known version
pub fn upgrade_project(value: Value) -> Result<Project> {
    let (mut version, mut payload) = from_compat(PROJECT_COMPAT.type_name, value)?;
    let original_version = version.clone();

    while version != PROJECT_COMPAT.version {
        let (_, to, migrate) = MIGRATIONS
            .iter()
            .find(|(from, _, _)| *from == version)
            .ok_or_else(|| Error::Compat {
                expected_type: PROJECT_COMPAT.type_name.to_string(),
                found_type: PROJECT_COMPAT.type_name.to_string(),
                found_version: version.clone(),
            })?;
        payload = migrate(payload)?;
        debug!("Project migration {} -> {} applied", version, to);
        version = to.to_string();
    }

    if original_version != PROJECT_COMPAT.version {
        info!(
            "Upgraded project document v{} -> v{}",
            original_version, PROJECT_COMPAT.version
        );
    }

    Ok(serde_json::from_value(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_requires_id() {
        assert!(matches!(Project::new(""), Err(Error::InvalidInput(_))));
        let p = Project::new("p").unwrap();
        assert!(p.repo_ids().is_empty());
        assert!(p.discourse_server().is_none());
        assert!(p.identities().is_empty());
        assert!(p.initiatives().is_none());
    }

    #[test]
    fn test_repo_id_parse() {
        let repo: RepoId = "sourcecred/example".parse().unwrap();
        assert_eq!(repo.owner, "sourcecred");
        assert_eq!(repo.name, "example");
        assert_eq!(repo.to_string(), "sourcecred/example");

        assert!("no-slash".parse::<RepoId>().is_err());
        assert!("a/b/c".parse::<RepoId>().is_err());
        assert!("/b".parse::<RepoId>().is_err());
    }

    #[test]
    fn test_current_shape_field_names() {
        let project = Project::new("p")
            .unwrap()
            .with_discourse_server(Some(DiscourseServer {
                server_url: "https://forum.example".to_string(),
            }));
        let value = serialize_project(&project).unwrap();
        assert_eq!(value[0], json!({"type": "sourcecred/project", "version": "0.5.0"}));
        assert_eq!(value[1]["discourseServer"]["serverUrl"], "https://forum.example");
        assert_eq!(value[1]["repoIds"], json!([]));
        assert_eq!(value[1]["initiatives"], Value::Null);
    }

    #[test]
    fn test_unknown_version_is_compat_error() {
        let doc = json!([{"type": "sourcecred/project", "version": "0.2.0"}, {"id": "p"}]);
        assert!(matches!(upgrade_project(doc), Err(Error::Compat { .. })));
    }

    #[test]
    fn test_empty_id_rejected_on_load() {
        let doc = json!([
            {"type": "sourcecred/project", "version": "0.5.0"},
            {"id": "", "repoIds": [], "discourseServer": null, "identities": [], "initiatives": null}
        ]);
        assert!(upgrade_project(doc).is_err());
    }

    #[test]
    fn test_repo_id_validated_on_load() {
        let repo: RepoId = serde_json::from_value(json!({"owner": "a", "name": "b"})).unwrap();
        assert_eq!(repo, RepoId::new("a", "b").unwrap());
        assert!(serde_json::from_value::<RepoId>(json!({"owner": "", "name": "a/b"})).is_err());

        let doc = json!([
            {"type": "sourcecred/project", "version": "0.5.0"},
            {
                "id": "p",
                "repoIds": [{"owner": "", "name": "a/b"}],
                "discourseServer": null,
                "identities": [],
                "initiatives": null
            }
        ]);
        assert!(upgrade_project(doc).is_err());
    }
}
