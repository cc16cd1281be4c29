//! Regulatory provisions: the optional grounding context for a reasoning task.
//!
//! The knowledge-graph loader proper lives elsewhere; the pipeline only needs
//! `ProvisionLookup`. `ProvisionCatalog` is the narrow file-backed collaborator:
//! a JSON catalog loaded once, with lookup by id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("provision catalog read: {0}")]
    Io(#[from] std::io::Error),
    #[error("provision catalog parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A regulatory text fragment used to bias planning and expert focus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provision {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Role identifiers responsible for this provision.
    #[serde(default)]
    pub roles_responsible: Vec<String>,
}

/// Grounding lookup seam. A lookup error is non-fatal for the pipeline:
/// planning proceeds without provision context and the failure is recorded
/// as an error note on the trace.
#[async_trait]
pub trait ProvisionLookup: Send + Sync {
    async fn get_provision_by_id(&self, id: &str) -> Result<Option<Provision>, CatalogError>;
}

/// JSON shape for the catalog file: { "provisions": [ {...}, ... ] }
#[derive(Debug, Deserialize)]
struct CatalogFile {
    provisions: Vec<Provision>,
}

/// In-memory catalog loaded from a JSON file. Missing or malformed files
/// yield an empty catalog so the service still answers ungrounded queries.
pub struct ProvisionCatalog {
    by_id: HashMap<String, Provision>,
}

impl ProvisionCatalog {
    pub fn empty() -> Self {
        Self {
            by_id: HashMap::new(),
        }
    }

    /// Load from a JSON file. Returns an empty catalog on error or missing file.
    pub fn load_json_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let s = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(
                    target: "ukfw::provisions",
                    path = %path.display(),
                    error = %e,
                    "provision catalog unreadable; starting empty"
                );
                return Self::empty();
            }
        };
        let file: CatalogFile = match serde_json::from_str(&s) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    target: "ukfw::provisions",
                    path = %path.display(),
                    error = %e,
                    "provision catalog malformed; starting empty"
                );
                return Self::empty();
            }
        };
        Self::from_provisions(file.provisions)
    }

    /// Build from in-memory provisions (e.g. for tests).
    pub fn from_provisions(provisions: Vec<Provision>) -> Self {
        let by_id = provisions.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self { by_id }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait]
impl ProvisionLookup for ProvisionCatalog {
    async fn get_provision_by_id(&self, id: &str) -> Result<Option<Provision>, CatalogError> {
        Ok(self.by_id.get(id.trim()).cloned())
    }
}
