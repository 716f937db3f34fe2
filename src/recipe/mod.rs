//! Recipe construction
//!
//! A recipe is the normalized, order-independent summary of a project's
//! dependency declarations: everything needed to build the dependency graph,
//! nothing from application source. Semantically identical dependency sets
//! serialize byte-identically, which is what makes the recipe a usable cache
//! address.

pub mod key;

use crate::scan::{ManifestFile, ManifestKind, ScanResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub use key::CacheKey;

/// Errors produced while building a recipe from scanned manifests
#[derive(Debug, Error)]
pub enum RecipeError {
    /// A manifest file could not be parsed
    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Two declarations for the same dependency disagree
    #[error(
        "Conflicting declarations for '{name}': '{existing}' ({existing_path}) vs '{incoming}' ({incoming_path})"
    )]
    Conflict {
        name: String,
        existing: String,
        existing_path: PathBuf,
        incoming: String,
        incoming_path: PathBuf,
    },

    /// Recipe file I/O or serialization failure
    #[error("Failed to read or write recipe file {path}: {message}")]
    Io { path: PathBuf, message: String },
}

/// Normalized constraint for one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConstraint {
    /// Version requirement as declared, or "*" when only a source is given
    pub version: String,

    /// Non-registry source (git URL or path), if any
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
}

impl DependencyConstraint {
    pub fn version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            source: None,
        }
    }
}

impl std::fmt::Display for DependencyConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({})", self.version, source),
            None => write!(f, "{}", self.version),
        }
    }
}

/// Canonical dependency summary, sorted by identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    dependencies: BTreeMap<String, DependencyConstraint>,
}

impl Recipe {
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DependencyConstraint> {
        self.dependencies.get(name)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = (&String, &DependencyConstraint)> {
        self.dependencies.iter()
    }

    /// Canonical serialization: sorted keys, fixed field order, no
    /// insignificant whitespace. This is the cache key input.
    pub fn canonical_json(&self) -> String {
        // BTreeMap ordering makes this deterministic.
        serde_json::to_string(&self.dependencies)
            .expect("string-keyed dependency map serializes infallibly")
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_json().into_bytes()
    }

    pub fn write_to(&self, path: &Path) -> Result<(), RecipeError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| RecipeError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| RecipeError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, RecipeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| RecipeError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| RecipeError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Builds a recipe from scanned manifest files.
///
/// Duplicate declarations across manifests must agree exactly; disagreement
/// is a hard error, never resolved by declaration order.
pub struct RecipeBuilder;

impl RecipeBuilder {
    pub fn build(scan: &ScanResult) -> Result<Recipe, RecipeError> {
        let mut dependencies: BTreeMap<String, (DependencyConstraint, PathBuf)> = BTreeMap::new();

        for manifest in &scan.manifests {
            if manifest.kind != ManifestKind::Manifest {
                continue;
            }
            for (name, constraint) in Self::parse_manifest(manifest)? {
                match dependencies.get(&name) {
                    None => {
                        dependencies.insert(name, (constraint, manifest.path.clone()));
                    }
                    Some((existing, existing_path)) if *existing != constraint => {
                        return Err(RecipeError::Conflict {
                            name,
                            existing: existing.to_string(),
                            existing_path: existing_path.clone(),
                            incoming: constraint.to_string(),
                            incoming_path: manifest.path.clone(),
                        });
                    }
                    Some(_) => {} // identical re-declaration, merge silently
                }
            }
        }

        debug!("Recipe built with {} dependencies", dependencies.len());

        Ok(Recipe {
            dependencies: dependencies
                .into_iter()
                .map(|(name, (constraint, _))| (name, constraint))
                .collect(),
        })
    }

    fn parse_manifest(
        manifest: &ManifestFile,
    ) -> Result<Vec<(String, DependencyConstraint)>, RecipeError> {
        let value: toml::Value =
            toml::from_str(&manifest.contents).map_err(|source| RecipeError::Parse {
                path: manifest.path.clone(),
                source,
            })?;

        let mut out = Vec::new();
        for table in Self::dependency_tables(&value) {
            for (name, spec) in table {
                out.push((name.clone(), Self::normalize(spec)));
            }
        }
        Ok(out)
    }

    /// All tables in a manifest that declare dependencies, including
    /// dev/build sections, workspace-level tables and target-specific ones.
    fn dependency_tables(value: &toml::Value) -> Vec<&toml::value::Table> {
        const SECTIONS: &[&str] = &["dependencies", "dev-dependencies", "build-dependencies"];

        let mut tables = Vec::new();
        for section in SECTIONS {
            if let Some(table) = value.get(section).and_then(|v| v.as_table()) {
                tables.push(table);
            }
        }
        if let Some(workspace) = value.get("workspace") {
            if let Some(table) = workspace.get("dependencies").and_then(|v| v.as_table()) {
                tables.push(table);
            }
        }
        if let Some(targets) = value.get("target").and_then(|v| v.as_table()) {
            for target in targets.values() {
                for section in SECTIONS {
                    if let Some(table) = target.get(section).and_then(|v| v.as_table()) {
                        tables.push(table);
                    }
                }
            }
        }
        tables
    }

    fn normalize(spec: &toml::Value) -> DependencyConstraint {
        match spec {
            toml::Value::String(version) => DependencyConstraint::version(version.trim()),
            toml::Value::Table(table) => {
                let version = table
                    .get("version")
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|| "*".to_string());
                let source = table
                    .get("git")
                    .or_else(|| table.get("path"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string());
                DependencyConstraint { version, source }
            }
            other => DependencyConstraint::version(other.to_string()),
        }
    }
}
