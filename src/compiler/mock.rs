//! Mock compiler for tests
//!
//! Writes synthetic artifacts and counts invocations, so tests can prove
//! whether the dependency stage recompiled anything or was served from cache.

use super::{
    ApplicationArtifact, CompileFailure, Compiler, DependencyArtifact, DependencyArtifactSet,
};
use crate::recipe::DependencyConstraint;
use crate::scan::ProjectTree;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct MockCompiler {
    dependency_builds: AtomicUsize,
    application_builds: AtomicUsize,
    failing_dependencies: Mutex<HashSet<String>>,
    fail_application: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MockCompiler {
    pub fn new() -> Self {
        Self {
            dependency_builds: AtomicUsize::new(0),
            application_builds: AtomicUsize::new(0),
            failing_dependencies: Mutex::new(HashSet::new()),
            fail_application: AtomicUsize::new(0),
            delay: Mutex::new(None),
        }
    }

    /// Make compilation of the named dependency fail
    pub fn fail_dependency(&self, name: impl Into<String>) {
        self.failing_dependencies.lock().unwrap().insert(name.into());
    }

    /// Make the next application compile fail
    pub fn fail_application(&self) {
        self.fail_application.store(1, Ordering::SeqCst);
    }

    /// Add artificial latency to every compile, for timeout tests
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn dependency_builds(&self) -> usize {
        self.dependency_builds.load(Ordering::SeqCst)
    }

    pub fn application_builds(&self) -> usize {
        self.application_builds.load(Ordering::SeqCst)
    }

    async fn maybe_sleep(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Compiler for MockCompiler {
    async fn compile_dependency(
        &self,
        name: &str,
        constraint: &DependencyConstraint,
        out_dir: &Path,
    ) -> Result<DependencyArtifact, CompileFailure> {
        self.maybe_sleep().await;
        self.dependency_builds.fetch_add(1, Ordering::SeqCst);

        if self.failing_dependencies.lock().unwrap().contains(name) {
            return Err(CompileFailure::Failed {
                status: 1,
                stderr: format!("error: could not compile `{name}`"),
            });
        }

        let object = out_dir.join(format!("{}-{}.rlib", name, constraint.version));
        tokio::fs::write(&object, format!("unit {name} {}", constraint.version))
            .await
            .map_err(|e| CompileFailure::Launch(e.to_string()))?;

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
        self.maybe_sleep().await;
        self.application_builds.fetch_add(1, Ordering::SeqCst);

        if self.fail_application.swap(0, Ordering::SeqCst) == 1 {
            return Err(CompileFailure::Failed {
                status: 1,
                stderr: "error: could not compile application".to_string(),
            });
        }

        // Reflect the application source so content changes are observable
        // in the produced binary.
        let source = tree
            .read_to_string(Path::new("src/main.rs"))
            .unwrap_or_default();
        let binary = out_dir.join("app");
        tokio::fs::write(&binary, format!("binary[{}] deps={}", source, deps.len()))
            .await
            .map_err(|e| CompileFailure::Launch(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            std::fs::set_permissions(&binary, perms)
                .map_err(|e| CompileFailure::Launch(e.to_string()))?;
        }

        Ok(ApplicationArtifact {
            binary,
            dependency_key: deps.key.clone(),
        })
    }
}
