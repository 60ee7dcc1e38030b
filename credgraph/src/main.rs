//! credgraph - cred computation front end
//!
//! Subcommands:
//! - `upgrade <file>`: print a project document at the current version
//! - `load <project-file>`: mirror, build and store a project's graph
//! - `score <distributions-file>`: normalize solver output into cred

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use credgraph::load::{Loader, SolverOutput};
use credgraph::normalize::{try_distribution_to_cred, CredScores, CRED_COMPAT};
use credgraph::plugins::{Adapters, PipelineEnv};
use credgraph::progress::TracingReporter;
use credgraph::storage::ProjectStorage;
use credgraph_common::compat::to_compat;
use credgraph_common::config::{
    cache_directory, ensure_root_folder, resolve_github_token, resolve_initiatives_directory,
    resolve_root_folder, LoggingConfig, TomlConfig,
};
use credgraph_common::db::CacheProvider;
use credgraph_common::project::{serialize_project, upgrade_project};
use credgraph_common::NodeAddress;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for credgraph
#[derive(Parser, Debug)]
#[command(name = "credgraph")]
#[command(about = "Compose contribution graphs and compute cred")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to the platform config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upgrade a project document to the current version and print it
    Upgrade {
        /// Project document, any known version
        file: PathBuf,
    },

    /// Mirror every source of a project, build its graph and store it
    Load {
        /// Project document, any known version
        project_file: PathBuf,

        /// Root data folder
        #[arg(short, long, value_name = "DIR")]
        root: Option<PathBuf>,
    },

    /// Convert solver distributions (`{nodeOrder, distributions}`) to cred
    Score {
        distributions_file: PathBuf,

        /// Scoring node prefix, parts separated by `/`; repeatable.
        /// Every node scores when omitted.
        #[arg(short, long, value_name = "PREFIX")]
        scoring: Vec<String>,
    },
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let file_layer = match &logging.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn parse_prefix(prefix: &str) -> Result<NodeAddress> {
    let parts = prefix.split('/').filter(|part| !part.is_empty());
    Ok(NodeAddress::try_from_parts(parts)?)
}

async fn load(toml: &TomlConfig, project_file: &Path, root: Option<&Path>) -> Result<()> {
    let project = upgrade_project(read_json(project_file)?)
        .with_context(|| format!("Cannot upgrade project in {}", project_file.display()))?;

    let root = resolve_root_folder(root, toml);
    ensure_root_folder(&root)?;
    info!("Root folder: {}", root.display());

    let cache = CacheProvider::new(cache_directory(&root));
    let env = PipelineEnv::new(cache.clone(), Arc::new(TracingReporter::new()))
        .with_github_token(resolve_github_token(toml))
        .with_initiatives_directory(resolve_initiatives_directory(toml));
    let loader = Loader::new(Adapters::builtin(), env, ProjectStorage::new(&root));

    let result = loader.load(project).await;
    cache.close().await;
    let result = result.context("Load failed")?;

    println!(
        "Loaded {}: {} nodes, {} edges",
        result.project.id(),
        result.weighted_graph.graph.node_count(),
        result.weighted_graph.graph.edge_count()
    );
    Ok(())
}

fn cred_from_file(distributions_file: &Path, scoring: &[String]) -> Result<CredScores> {
    let output: SolverOutput = serde_json::from_value(read_json(distributions_file)?)
        .with_context(|| format!("Expected {{nodeOrder, distributions}} in {}", distributions_file.display()))?;

    let prefixes = if scoring.is_empty() {
        vec![NodeAddress::empty()]
    } else {
        scoring
            .iter()
            .map(String::as_str)
            .map(parse_prefix)
            .collect::<Result<Vec<_>>>()?
    };

    try_distribution_to_cred(&output.distributions, &output.node_order, &prefixes)
        .with_context(|| format!("Invalid distributions in {}", distributions_file.display()))
}

fn score(distributions_file: &Path, scoring: &[String]) -> Result<()> {
    let cred = cred_from_file(distributions_file, scoring)?;
    println!("{}", serde_json::to_string_pretty(&to_compat(&CRED_COMPAT, &cred)?)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml, config_warning) = TomlConfig::load_with_warning(args.config.as_deref());
    init_logging(&toml.logging)?;
    if let Some(warning) = config_warning {
        warn!("{}", warning);
    }

    match args.command {
        Command::Upgrade { file } => {
            let project = upgrade_project(read_json(&file)?)
                .with_context(|| format!("Cannot upgrade project in {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&serialize_project(&project)?)?);
        }
        Command::Load { project_file, root } => {
            load(&toml, &project_file, root.as_deref()).await?;
        }
        Command::Score {
            distributions_file,
            scoring,
        } => {
            score(&distributions_file, &scoring)?;
        }
    }

    Ok(())
}
