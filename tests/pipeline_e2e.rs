//! End-to-end pipeline scenarios with a mock compiler and both store kinds.

use prebake::{
    BuildConfig, BuildPipeline, CacheStore, Compiler, DiskCacheStore, MemoryCacheStore,
    MockCompiler, PipelineError, ProjectTree,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_project(dir: &Path, manifest: &str, main_rs: &str) {
    fs::write(dir.join("Cargo.toml"), manifest).unwrap();
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(dir.join("src/main.rs"), main_rs).unwrap();
}

fn config_for(work: &TempDir) -> BuildConfig {
    BuildConfig {
        cache_dir: work.path().join("cache"),
        work_dir: work.path().join("work"),
        jobs: 4,
        stage_timeout: Duration::from_secs(30),
        log_level: "info".to_string(),
        dep_command: None,
        app_command: None,
    }
}

#[tokio::test]
async fn first_build_misses_then_second_build_hits() {
    let project = TempDir::new().unwrap();
    write_project(
        project.path(),
        "[dependencies]\nlibfoo = \"1.0\"\n",
        "fn main() { original }",
    );
    let work = TempDir::new().unwrap();
    let layout = TempDir::new().unwrap();
    let compiler = Arc::new(MockCompiler::new());
    let store = Arc::new(MemoryCacheStore::new());
    let pipeline = BuildPipeline::new(
        Arc::clone(&store) as Arc<dyn CacheStore>,
        Arc::clone(&compiler) as Arc<dyn Compiler>,
        &config_for(&work),
    );
    let tree = ProjectTree::new(project.path());

    // First build: cold cache, full pipeline
    let first = pipeline.execute(&tree, None, layout.path()).await.unwrap();
    assert!(!first.dependency_cache_hit);
    assert_eq!(compiler.dependency_builds(), 1);
    assert_eq!(
        first.image.entrypoint,
        layout.path().join("usr/local/bin/app")
    );

    // Second build: only application source changed
    fs::write(project.path().join("src/main.rs"), "fn main() { changed }").unwrap();
    let second = pipeline.execute(&tree, None, layout.path()).await.unwrap();

    assert!(second.dependency_cache_hit);
    assert_eq!(compiler.dependency_builds(), 1, "no dependency recompilation");
    assert_eq!(compiler.application_builds(), 2);
    assert_eq!(first.key, second.key);

    let packaged = fs::read_to_string(&second.image.entrypoint).unwrap();
    assert!(packaged.contains("changed"));
}

#[tokio::test]
async fn disk_cache_survives_pipeline_instances() {
    let project = TempDir::new().unwrap();
    write_project(
        project.path(),
        "[dependencies]\nlibfoo = \"1.0\"\nlibbar = \"2.0\"\n",
        "fn main() {}",
    );
    let work = TempDir::new().unwrap();
    let layout = TempDir::new().unwrap();
    let config = config_for(&work);
    let tree = ProjectTree::new(project.path());

    let compiler_a = Arc::new(MockCompiler::new());
    let pipeline_a = BuildPipeline::new(
        Arc::new(DiskCacheStore::new(config.cache_dir.clone())),
        Arc::clone(&compiler_a) as Arc<dyn Compiler>,
        &config,
    );
    pipeline_a.execute(&tree, None, layout.path()).await.unwrap();
    assert_eq!(compiler_a.dependency_builds(), 2);

    // Fresh pipeline and compiler over the same on-disk cache
    let compiler_b = Arc::new(MockCompiler::new());
    let pipeline_b = BuildPipeline::new(
        Arc::new(DiskCacheStore::new(config.cache_dir.clone())),
        Arc::clone(&compiler_b) as Arc<dyn Compiler>,
        &config,
    );
    let report = pipeline_b.execute(&tree, None, layout.path()).await.unwrap();

    assert!(report.dependency_cache_hit);
    assert_eq!(compiler_b.dependency_builds(), 0);
}

#[tokio::test]
async fn prepared_recipe_drives_build_without_rescan() {
    let project = TempDir::new().unwrap();
    write_project(
        project.path(),
        "[dependencies]\nlibfoo = \"1.0\"\n",
        "fn main() {}",
    );
    let work = TempDir::new().unwrap();
    let layout = TempDir::new().unwrap();
    let compiler = Arc::new(MockCompiler::new());
    let pipeline = BuildPipeline::new(
        Arc::new(MemoryCacheStore::new()),
        Arc::clone(&compiler) as Arc<dyn Compiler>,
        &config_for(&work),
    );
    let tree = ProjectTree::new(project.path());

    let prepared = pipeline.prepare(&tree).unwrap();
    let report = pipeline
        .execute(&tree, Some(prepared.clone()), layout.path())
        .await
        .unwrap();

    assert_eq!(report.key, prepared.key);
}

#[tokio::test]
async fn dependency_failure_fails_pipeline_without_cache_pollution() {
    let project = TempDir::new().unwrap();
    write_project(
        project.path(),
        "[dependencies]\nlibgood = \"1.0\"\nlibbad = \"0.2\"\n",
        "fn main() {}",
    );
    let work = TempDir::new().unwrap();
    let layout = TempDir::new().unwrap();
    let compiler = Arc::new(MockCompiler::new());
    compiler.fail_dependency("libbad");
    let store = Arc::new(MemoryCacheStore::new());
    let pipeline = BuildPipeline::new(
        Arc::clone(&store) as Arc<dyn CacheStore>,
        Arc::clone(&compiler) as Arc<dyn Compiler>,
        &config_for(&work),
    );

    let err = pipeline
        .execute(&ProjectTree::new(project.path()), None, layout.path())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::DependencyBuild { .. }));
    assert_eq!(err.exit_code(), 12);
    assert!(store.is_empty().await, "no partial artifact set persisted");
    assert_eq!(compiler.application_builds(), 0);
}

#[tokio::test]
async fn timeout_surfaces_and_leaves_cache_untouched() {
    let project = TempDir::new().unwrap();
    write_project(
        project.path(),
        "[dependencies]\nlibslow = \"1.0\"\n",
        "fn main() {}",
    );
    let work = TempDir::new().unwrap();
    let layout = TempDir::new().unwrap();
    let compiler = Arc::new(MockCompiler::new());
    compiler.set_delay(Duration::from_millis(200));
    let store = Arc::new(MemoryCacheStore::new());

    let mut config = config_for(&work);
    config.stage_timeout = Duration::from_millis(20);
    let pipeline = BuildPipeline::new(
        Arc::clone(&store) as Arc<dyn CacheStore>,
        Arc::clone(&compiler) as Arc<dyn Compiler>,
        &config,
    );

    let err = pipeline
        .execute(&ProjectTree::new(project.path()), None, layout.path())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Timeout { .. }));
    assert_eq!(err.exit_code(), 16);
    assert!(store.is_empty().await);
}
