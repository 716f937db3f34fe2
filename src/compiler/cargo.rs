//! Cargo-backed compiler
//!
//! Dependencies are compiled without application source by synthesizing a
//! scratch crate that declares only the one dependency, running
//! `cargo build --release` inside it, and copying the resulting rlib out of
//! cargo's target directory. The application stage runs the same command at
//! the project root and copies the built executable to `{out}/app`.

use super::process::run_command;
use super::{
    ApplicationArtifact, CompileFailure, Compiler, DependencyArtifact, DependencyArtifactSet,
};
use crate::recipe::DependencyConstraint;
use crate::scan::ProjectTree;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CargoCompiler {
    cargo_bin: PathBuf,
}

impl Default for CargoCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CargoCompiler {
    /// Uses the `cargo` executable found on PATH.
    pub fn new() -> Self {
        Self {
            cargo_bin: PathBuf::from("cargo"),
        }
    }

    /// Uses a specific cargo executable instead of the one on PATH.
    pub fn with_cargo_bin(cargo_bin: impl Into<PathBuf>) -> Self {
        Self {
            cargo_bin: cargo_bin.into(),
        }
    }

    fn build_args(&self, target_dir: &Path) -> Vec<String> {
        vec![
            self.cargo_bin.to_string_lossy().to_string(),
            "build".to_string(),
            "--release".to_string(),
            "--target-dir".to_string(),
            target_dir.to_string_lossy().to_string(),
        ]
    }

    /// Manifest for a scratch crate whose only dependency is the one being
    /// compiled. A source that looks like a URL becomes a `git` entry, any
    /// other source a `path` entry.
    fn scratch_manifest(
        name: &str,
        constraint: &DependencyConstraint,
    ) -> Result<String, CompileFailure> {
        let spec = match &constraint.source {
            Some(source) => {
                let kind = if source.contains("://") || source.starts_with("git@") {
                    "git"
                } else {
                    "path"
                };
                let mut table = toml::value::Table::new();
                table.insert(kind.to_string(), toml::Value::String(source.clone()));
                if constraint.version != "*" {
                    table.insert(
                        "version".to_string(),
                        toml::Value::String(constraint.version.clone()),
                    );
                }
                toml::Value::Table(table)
            }
            None => toml::Value::String(constraint.version.clone()),
        };

        let mut package = toml::value::Table::new();
        package.insert(
            "name".to_string(),
            toml::Value::String("prebake-dep-shim".to_string()),
        );
        package.insert(
            "version".to_string(),
            toml::Value::String("0.0.0".to_string()),
        );
        package.insert(
            "edition".to_string(),
            toml::Value::String("2021".to_string()),
        );

        let mut dependencies = toml::value::Table::new();
        dependencies.insert(name.to_string(), spec);

        let mut doc = toml::value::Table::new();
        doc.insert("package".to_string(), toml::Value::Table(package));
        doc.insert("dependencies".to_string(), toml::Value::Table(dependencies));

        toml::to_string(&toml::Value::Table(doc))
            .map_err(|e| CompileFailure::Launch(format!("scratch manifest for {name}: {e}")))
    }

    /// Cargo names compiled units `lib<crate>-<hash>.rlib` under
    /// `release/deps`, with hyphens in the crate name mapped to underscores.
    fn find_rlib(deps_dir: &Path, name: &str) -> Result<PathBuf, CompileFailure> {
        let prefix = format!("lib{}-", name.replace('-', "_"));
        let entries = std::fs::read_dir(deps_dir)
            .map_err(|_| CompileFailure::MissingOutput(deps_dir.to_path_buf()))?;

        let mut matches: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().map(|ext| ext == "rlib").unwrap_or(false)
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(&prefix))
                        .unwrap_or(false)
            })
            .collect();
        matches.sort();
        matches
            .pop()
            .ok_or_else(|| CompileFailure::MissingOutput(deps_dir.join(format!("{prefix}*.rlib"))))
    }

    /// The executable name cargo will produce for a project: an explicit
    /// `[[bin]]` name when declared, the package name otherwise.
    fn binary_name(tree: &ProjectTree) -> Result<String, CompileFailure> {
        let raw = tree
            .read_to_string(Path::new("Cargo.toml"))
            .map_err(|e| CompileFailure::Launch(format!("project manifest: {e}")))?;
        let value: toml::Value = toml::from_str(&raw)
            .map_err(|e| CompileFailure::Launch(format!("project manifest: {e}")))?;

        let from_bin = value
            .get("bin")
            .and_then(|b| b.as_array())
            .and_then(|bins| bins.first())
            .and_then(|bin| bin.get("name"))
            .and_then(|n| n.as_str());
        let from_package = value
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str());

        from_bin
            .or(from_package)
            .map(str::to_string)
            .ok_or_else(|| {
                CompileFailure::Launch("project manifest declares no binary name".to_string())
            })
    }
}

#[async_trait]
impl Compiler for CargoCompiler {
    async fn compile_dependency(
        &self,
        name: &str,
        constraint: &DependencyConstraint,
        out_dir: &Path,
    ) -> Result<DependencyArtifact, CompileFailure> {
        let io = |e: std::io::Error| CompileFailure::Launch(format!("scratch crate setup: {e}"));

        let scratch = out_dir.join(format!("build-{name}"));
        tokio::fs::create_dir_all(scratch.join("src"))
            .await
            .map_err(io)?;
        tokio::fs::write(scratch.join("src/lib.rs"), "")
            .await
            .map_err(io)?;
        let manifest = Self::scratch_manifest(name, constraint)?;
        tokio::fs::write(scratch.join("Cargo.toml"), manifest)
            .await
            .map_err(io)?;

        debug!("Compiling dependency {} {} via cargo", name, constraint);
        let target_dir = scratch.join("target");
        run_command(&self.build_args(&target_dir), &scratch).await?;

        let compiled = Self::find_rlib(&target_dir.join("release/deps"), name)?;
        let object = out_dir.join(format!("{}-{}.rlib", name, constraint.version));
        tokio::fs::copy(&compiled, &object).await.map_err(io)?;

        Ok(DependencyArtifact {
            name: name.to_string(),
            version: constraint.version.clone(),
            object,
        })
    }

    async fn compile_application(
        &self,
        tree: &ProjectTree,
        deps: &DependencyArtifactSet,
        out_dir: &Path,
    ) -> Result<ApplicationArtifact, CompileFailure> {
        let io = |e: std::io::Error| CompileFailure::Launch(format!("output staging: {e}"));

        tokio::fs::create_dir_all(out_dir).await.map_err(io)?;
        let target_dir = out_dir.join("target");
        run_command(&self.build_args(&target_dir), tree.root()).await?;

        let bin_name = Self::binary_name(tree)?;
        let built = target_dir.join("release").join(&bin_name);
        if !built.is_file() {
            return Err(CompileFailure::MissingOutput(built));
        }

        // fs::copy carries the source mode, so the executable bit survives
        let binary = out_dir.join("app");
        tokio::fs::copy(&built, &binary).await.map_err(io)?;

        Ok(ApplicationArtifact {
            binary,
            dependency_key: deps.key.clone(),
        })
    }
}
