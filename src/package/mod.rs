//! Artifact packaging
//!
//! Copies the final executable into a minimal runtime layout at a fixed path
//! and records it as the layout's entrypoint. Nothing else from the build
//! stages is carried forward.

use crate::compiler::ApplicationArtifact;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Fixed location of the executable inside the runtime layout
pub const ENTRYPOINT_PATH: &str = "usr/local/bin/app";

/// Marker file naming the default entrypoint
const ENTRYPOINT_MARKER: &str = "entrypoint";

#[derive(Debug, Error)]
pub enum PackagingError {
    /// The application artifact does not exist on disk
    #[error("Application artifact missing: {0}")]
    MissingArtifact(PathBuf),

    /// The artifact exists but is not an executable file
    #[error("Application artifact is not executable: {0}")]
    NotExecutable(PathBuf),

    #[error("Failed to assemble runtime layout at {path}: {message}")]
    Io { path: PathBuf, message: String },
}

/// The assembled runtime layout: success-terminal output of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedImage {
    pub root: PathBuf,
    pub entrypoint: PathBuf,
}

pub struct ArtifactPackager;

impl ArtifactPackager {
    pub fn package(
        artifact: &ApplicationArtifact,
        layout_root: &Path,
    ) -> Result<PackagedImage, PackagingError> {
        let meta = std::fs::metadata(&artifact.binary)
            .map_err(|_| PackagingError::MissingArtifact(artifact.binary.clone()))?;
        if !meta.is_file() {
            return Err(PackagingError::MissingArtifact(artifact.binary.clone()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if meta.permissions().mode() & 0o111 == 0 {
                return Err(PackagingError::NotExecutable(artifact.binary.clone()));
            }
        }

        let entrypoint = layout_root.join(ENTRYPOINT_PATH);
        let parent = entrypoint.parent().ok_or_else(|| PackagingError::Io {
            path: entrypoint.clone(),
            message: "entrypoint path has no parent directory".to_string(),
        })?;
        std::fs::create_dir_all(parent).map_err(|e| PackagingError::Io {
            path: parent.to_path_buf(),
            message: e.to_string(),
        })?;

        std::fs::copy(&artifact.binary, &entrypoint).map_err(|e| PackagingError::Io {
            path: entrypoint.clone(),
            message: e.to_string(),
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&entrypoint, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| PackagingError::Io {
                    path: entrypoint.clone(),
                    message: e.to_string(),
                })?;
        }

        // The runtime environment invokes this path with no arguments.
        let marker = layout_root.join(ENTRYPOINT_MARKER);
        std::fs::write(&marker, format!("/{ENTRYPOINT_PATH}\n")).map_err(|e| {
            PackagingError::Io {
                path: marker,
                message: e.to_string(),
            }
        })?;

        info!("Packaged executable at {}", entrypoint.display());

        Ok(PackagedImage {
            root: layout_root.to_path_buf(),
            entrypoint,
        })
    }
}
