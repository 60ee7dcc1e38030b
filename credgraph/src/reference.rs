//! Reference detection across sources
//!
//! Sources that can recognise references to their own nodes (a pull request
//! URL, a forum topic URL, an initiative file URL) each expose a detector. The
//! composer chains them into one [`CascadingReferenceDetector`] so a source
//! building its graph can resolve references to any other source's nodes.

use crate::mirror::CachedProject;
use crate::plugins::{applicable_sources, Adapters, PipelineEnv};
use crate::types::{ReferenceDetector, SourceKind};
use credgraph_common::{Error, NodeAddress, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered child detectors; the first match wins
#[derive(Clone, Default)]
pub struct CascadingReferenceDetector {
    detectors: Vec<Arc<dyn ReferenceDetector>>,
}

impl CascadingReferenceDetector {
    pub fn new(detectors: Vec<Arc<dyn ReferenceDetector>>) -> Self {
        Self { detectors }
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl ReferenceDetector for CascadingReferenceDetector {
    fn detect(&self, token: &str) -> Option<NodeAddress> {
        self.detectors.iter().find_map(|d| d.detect(token))
    }
}

/// Detector backed by an explicit token -> address table
#[derive(Debug, Clone, Default)]
pub struct MappedReferenceDetector {
    map: HashMap<String, NodeAddress>,
}

impl MappedReferenceDetector {
    pub fn new(map: HashMap<String, NodeAddress>) -> Self {
        Self { map }
    }
}

impl ReferenceDetector for MappedReferenceDetector {
    fn detect(&self, token: &str) -> Option<NodeAddress> {
        self.map.get(token).cloned()
    }
}

/// Compose the reference detectors of every applicable source.
///
/// Children are registered in fixed order: code-hosting, forum, initiatives.
/// The code-hosting and forum children are built from their cache stores;
/// the initiatives child was produced by the mirror pass.
pub async fn create_reference_detector(
    adapters: &Adapters,
    env: &PipelineEnv,
    cached: &CachedProject,
) -> Result<CascadingReferenceDetector> {
    let sources = applicable_sources(adapters, &cached.project, env)?;

    let mut detectors: Vec<Arc<dyn ReferenceDetector>> = Vec::new();
    for source in &sources {
        let kind = source.kind();
        let detector = match kind {
            SourceKind::Initiatives => {
                let loaded = cached.loaded_initiatives.as_ref().ok_or_else(|| {
                    Error::Config(
                        "initiatives directory has not been loaded; update the mirror first"
                            .to_string(),
                    )
                })?;
                Some(Arc::clone(&loaded.reference_detector))
            }
            _ => source
                .adapter
                .reference_detector(&source.config, &cached.cache)
                .await
                .map_err(|e| Error::from_source(kind.name(), e))?,
        };

        match detector {
            Some(detector) => {
                debug!(source = kind.name(), "Reference detector registered");
                detectors.push(detector);
            }
            None => debug!(source = kind.name(), "Source has no reference detector"),
        }
    }

    info!(
        project = cached.project.id(),
        detectors = detectors.len(),
        "Reference detector composed"
    );
    Ok(CascadingReferenceDetector::new(detectors))
}
