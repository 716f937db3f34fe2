//! Manifest scanning
//!
//! Walks a project tree and extracts the files that determine the dependency
//! graph (manifests and lockfiles), ignoring application source and
//! build-output directories. The scan is a pure read: nothing in the tree is
//! modified and results are sorted by path for deterministic downstream
//! processing.

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

/// Directories that hold build output or vendored artifacts, never
/// dependency declarations.
const EXCLUDED_DIRS: &[&str] = &["target", "node_modules", "vendor", "dist", ".prebake-cache"];

/// File names that declare dependencies.
const MANIFEST_NAMES: &[&str] = &["Cargo.toml"];

/// File names that pin resolved dependency versions.
const LOCKFILE_NAMES: &[&str] = &["Cargo.lock"];

/// Errors produced while scanning a project tree
#[derive(Debug, Error)]
pub enum ScanError {
    /// The tree root does not exist or is not a directory
    #[error("Project tree is unreadable: {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tree root exists but contains no files at all
    #[error("Project tree is empty: {0}")]
    EmptyTree(PathBuf),

    /// The tree contains files but no dependency-declaration files
    #[error("No dependency manifests found under: {0}")]
    NoManifests(PathBuf),
}

/// Read-only view of a project supplied by the caller
#[derive(Debug, Clone)]
pub struct ProjectTree {
    root: PathBuf,
}

impl ProjectTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a file relative to the tree root
    pub fn read_to_string(&self, rel: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(self.root.join(rel))
    }
}

/// Role a scanned file plays in dependency resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Manifest,
    Lockfile,
}

/// One dependency-declaration file found in the tree
#[derive(Debug, Clone)]
pub struct ManifestFile {
    /// Path relative to the tree root
    pub path: PathBuf,
    pub kind: ManifestKind,
    pub contents: String,
}

/// Scan result: manifests ordered by path, lockfiles alongside
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub tree_root: PathBuf,
    pub manifests: Vec<ManifestFile>,
}

impl ScanResult {
    pub fn manifest_count(&self) -> usize {
        self.manifests
            .iter()
            .filter(|m| m.kind == ManifestKind::Manifest)
            .count()
    }
}

/// Walks a project tree and collects dependency-declaration files.
///
/// Selection is by file name and nesting convention only; contents are read
/// but never interpreted here.
pub struct ManifestScanner;

impl ManifestScanner {
    pub fn scan(tree: &ProjectTree) -> Result<ScanResult, ScanError> {
        let root = tree.root();
        let meta = std::fs::metadata(root).map_err(|source| ScanError::Unreadable {
            path: root.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(ScanError::Unreadable {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
            });
        }

        let mut manifests = Vec::new();
        let mut file_count = 0usize;

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !EXCLUDED_DIRS.contains(&name.as_ref())
            })
            .build();

        for entry in walker {
            let entry = entry.map_err(|err| ScanError::Unreadable {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, err),
            })?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            file_count += 1;

            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if MANIFEST_NAMES.contains(&name.as_str()) {
                ManifestKind::Manifest
            } else if LOCKFILE_NAMES.contains(&name.as_str()) {
                ManifestKind::Lockfile
            } else {
                trace!("Skipping non-manifest file: {}", entry.path().display());
                continue;
            };

            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            let contents =
                std::fs::read_to_string(entry.path()).map_err(|source| ScanError::Unreadable {
                    path: entry.path().to_path_buf(),
                    source,
                })?;

            manifests.push(ManifestFile {
                path: rel,
                kind,
                contents,
            });
        }

        if file_count == 0 {
            return Err(ScanError::EmptyTree(root.to_path_buf()));
        }
        if manifests.iter().all(|m| m.kind != ManifestKind::Manifest) {
            return Err(ScanError::NoManifests(root.to_path_buf()));
        }

        // Stable order regardless of walk order
        manifests.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            "Scan found {} manifest(s) under {}",
            manifests.len(),
            root.display()
        );

        Ok(ScanResult {
            tree_root: root.to_path_buf(),
            manifests,
        })
    }
}
