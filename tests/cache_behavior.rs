//! Cache key sensitivity and concurrent cold-cache coordination.

use prebake::{
    BuildConfig, BuildPipeline, CacheKey, CacheStore, Compiler, ManifestScanner, MemoryCacheStore,
    MockCompiler, ProjectTree, RecipeBuilder,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_project(dir: &Path, manifest: &str) {
    fs::write(dir.join("Cargo.toml"), manifest).unwrap();
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(dir.join("src/main.rs"), "fn main() {}").unwrap();
}

fn key_for(manifest: &str) -> CacheKey {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), manifest);
    let scan = ManifestScanner::scan(&ProjectTree::new(dir.path())).unwrap();
    CacheKey::derive(&RecipeBuilder::build(&scan).unwrap())
}

#[test]
fn key_is_stable_across_declaration_order() {
    let a = key_for("[dependencies]\nalpha = \"1.0\"\nzeta = \"2.0\"\n");
    let b = key_for("[dependencies]\nzeta = \"2.0\"\nalpha = \"1.0\"\n");
    assert_eq!(a, b);
}

#[test]
fn key_is_insensitive_to_application_source() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), "[dependencies]\nlibfoo = \"1.0\"\n");
    let tree = ProjectTree::new(dir.path());

    let before = CacheKey::derive(
        &RecipeBuilder::build(&ManifestScanner::scan(&tree).unwrap()).unwrap(),
    );
    fs::write(dir.path().join("src/main.rs"), "fn main() { rewritten }").unwrap();
    let after = CacheKey::derive(
        &RecipeBuilder::build(&ManifestScanner::scan(&tree).unwrap()).unwrap(),
    );

    assert_eq!(before, after);
}

#[test]
fn key_changes_on_any_constraint_change() {
    let base = key_for("[dependencies]\nlibfoo = \"1.0\"\n");
    assert_ne!(base, key_for("[dependencies]\nlibfoo = \"1.0.1\"\n"));
    assert_ne!(base, key_for("[dependencies]\nlibfo = \"1.0\"\n"));
    assert_ne!(
        base,
        key_for("[dependencies]\nlibfoo = { git = \"https://example.com/libfoo\" }\n")
    );
}

#[tokio::test]
async fn concurrent_cold_pipelines_compile_dependencies_once() {
    let project = TempDir::new().unwrap();
    write_project(project.path(), "[dependencies]\nlibfoo = \"1.0\"\n");
    let work = TempDir::new().unwrap();
    let layout_a = TempDir::new().unwrap();
    let layout_b = TempDir::new().unwrap();

    let store = Arc::new(MemoryCacheStore::new());
    let compiler = Arc::new(MockCompiler::new());
    compiler.set_delay(Duration::from_millis(30));

    let config = BuildConfig {
        cache_dir: work.path().join("cache"),
        work_dir: work.path().join("work"),
        jobs: 4,
        stage_timeout: Duration::from_secs(30),
        log_level: "info".to_string(),
        dep_command: None,
        app_command: None,
    };
    let pipeline = Arc::new(BuildPipeline::new(
        Arc::clone(&store) as Arc<dyn CacheStore>,
        Arc::clone(&compiler) as Arc<dyn Compiler>,
        &config,
    ));

    let task_a = {
        let pipeline = Arc::clone(&pipeline);
        let tree = ProjectTree::new(project.path());
        let layout = layout_a.path().to_path_buf();
        tokio::spawn(async move { pipeline.execute(&tree, None, &layout).await })
    };
    let task_b = {
        let pipeline = Arc::clone(&pipeline);
        let tree = ProjectTree::new(project.path());
        let layout = layout_b.path().to_path_buf();
        tokio::spawn(async move { pipeline.execute(&tree, None, &layout).await })
    };

    let report_a = task_a.await.unwrap().unwrap();
    let report_b = task_b.await.unwrap().unwrap();

    // Exactly one dependency compilation, two successful artifact reads
    assert_eq!(compiler.dependency_builds(), 1);
    assert_eq!(report_a.key, report_b.key);
    assert!(report_a.image.entrypoint.is_file());
    assert!(report_b.image.entrypoint.is_file());
}
