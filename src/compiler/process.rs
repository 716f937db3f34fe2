//! Process-backed compiler
//!
//! Runs an external toolchain via command templates, for toolchains with no
//! dedicated adapter. Each argument may contain the placeholders `{name}`,
//! `{version}`, `{out}`, `{deps}` and `{src}`, substituted per invocation.
//! The dependency template must leave its compiled unit at
//! `{out}/{name}-{version}.rlib`; the application template must leave the
//! executable at `{out}/app`.

use super::{
    ApplicationArtifact, CompileFailure, Compiler, DependencyArtifact, DependencyArtifactSet,
};
use crate::recipe::DependencyConstraint;
use crate::scan::ProjectTree;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run a toolchain command to completion, mapping failure to
/// [`CompileFailure`] with captured stderr.
pub(crate) async fn run_command(args: &[String], cwd: &Path) -> Result<(), CompileFailure> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| CompileFailure::Launch("empty command template".to_string()))?;

    debug!("Running compiler: {} {:?}", program, rest);
    let output = Command::new(program)
        .args(rest)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| CompileFailure::Launch(format!("{program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!("Compiler failed: {}", stderr);
        return Err(CompileFailure::Failed {
            status: output.status.code().unwrap_or(-1),
            stderr,
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    dep_template: Vec<String>,
    app_template: Vec<String>,
}

impl ProcessCompiler {
    pub fn new(
        dep_template: impl IntoIterator<Item = impl Into<String>>,
        app_template: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            dep_template: dep_template.into_iter().map(Into::into).collect(),
            app_template: app_template.into_iter().map(Into::into).collect(),
        }
    }

    fn render(template: &[String], subs: &[(&str, &str)]) -> Vec<String> {
        template
            .iter()
            .map(|arg| {
                let mut rendered = arg.clone();
                for (placeholder, value) in subs {
                    rendered = rendered.replace(placeholder, value);
                }
                rendered
            })
            .collect()
    }
}

#[async_trait]
impl Compiler for ProcessCompiler {
    async fn compile_dependency(
        &self,
        name: &str,
        constraint: &DependencyConstraint,
        out_dir: &Path,
    ) -> Result<DependencyArtifact, CompileFailure> {
        let out = out_dir.to_string_lossy().to_string();
        let args = Self::render(
            &self.dep_template,
            &[
                ("{name}", name),
                ("{version}", &constraint.version),
                ("{out}", &out),
            ],
        );
        run_command(&args, out_dir).await?;

        let object = out_dir.join(format!("{}-{}.rlib", name, constraint.version));
        if !object.is_file() {
            return Err(CompileFailure::MissingOutput(object));
        }

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
        let out = out_dir.to_string_lossy().to_string();
        let deps_dir = out_dir.to_string_lossy().to_string();
        let src = tree.root().to_string_lossy().to_string();
        let args = Self::render(
            &self.app_template,
            &[("{out}", &out), ("{deps}", &deps_dir), ("{src}", &src)],
        );
        run_command(&args, tree.root()).await?;

        let binary = out_dir.join("app");
        if !binary.is_file() {
            return Err(CompileFailure::MissingOutput(binary));
        }

        Ok(ApplicationArtifact {
            binary,
            dependency_key: deps.key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::CacheKey;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn test_key() -> CacheKey {
        CacheKey::from_str(&format!("sha256:{}", "ab".repeat(32))).unwrap()
    }

    #[tokio::test]
    async fn test_dependency_compile_via_shell() {
        let out = TempDir::new().unwrap();
        let compiler = ProcessCompiler::new(
            ["sh", "-c", "echo unit > '{out}/{name}-{version}.rlib'"],
            ["true"],
        );

        let artifact = compiler
            .compile_dependency(
                "libfoo",
                &DependencyConstraint::version("1.0"),
                out.path(),
            )
            .await
            .unwrap();

        assert_eq!(artifact.name, "libfoo");
        assert!(artifact.object.is_file());
    }

    #[tokio::test]
    async fn test_dependency_compile_failure_surfaces_stderr() {
        let out = TempDir::new().unwrap();
        let compiler = ProcessCompiler::new(["sh", "-c", "echo boom >&2; exit 3"], ["true"]);

        let err = compiler
            .compile_dependency("libfoo", &DependencyConstraint::version("1.0"), out.path())
            .await
            .unwrap_err();

        match err {
            CompileFailure::Failed { status, stderr } => {
                assert_eq!(status, 3);
                assert!(stderr.contains("boom"));
            }
            other => panic!("Expected Failed, got: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_output_detected() {
        let out = TempDir::new().unwrap();
        let compiler = ProcessCompiler::new(["true"], ["true"]);

        let err = compiler
            .compile_dependency("libfoo", &DependencyConstraint::version("1.0"), out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CompileFailure::MissingOutput(_)));
    }

    #[tokio::test]
    async fn test_application_compile_via_shell() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let compiler = ProcessCompiler::new(["true"], ["sh", "-c", "echo binary > '{out}/app'"]);

        let deps = DependencyArtifactSet::new(test_key(), vec![]);
        let artifact = compiler
            .compile_application(&ProjectTree::new(src.path()), &deps, out.path())
            .await
            .unwrap();

        assert!(artifact.binary.is_file());
        assert_eq!(artifact.dependency_key, test_key());
    }
}
