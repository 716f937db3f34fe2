//! Subcommand handlers
//!
//! Each handler wires up the pipeline with the configured store and compiler,
//! runs it, and translates typed errors into distinct exit codes.

use super::commands::{BuildArgs, PrepareArgs, DEFAULT_RECIPE_FILE};
use crate::cache::{CacheStore, DiskCacheStore};
use crate::compiler::{CargoCompiler, Compiler, ProcessCompiler};
use crate::config::BuildConfig;
use crate::pipeline::{BuildPipeline, PreparedRecipe};
use crate::recipe::{CacheKey, Recipe};
use crate::scan::ProjectTree;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const EXIT_USAGE: i32 = 2;

pub async fn handle_prepare(args: &PrepareArgs, quiet: bool) -> i32 {
    let config = BuildConfig::default();
    if let Err(e) = config.validate() {
        error!("{e}");
        return EXIT_USAGE;
    }

    let tree = ProjectTree::new(project_path(args.project_path.clone()));
    let pipeline = build_pipeline(&config);

    let prepared = match pipeline.prepare(&tree) {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("Stage '{}' failed: {e}", e.stage());
            return e.exit_code();
        }
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RECIPE_FILE));
    if let Err(e) = prepared.recipe.write_to(&output) {
        error!("{e}");
        return crate::error::PipelineError::Recipe(e).exit_code();
    }

    info!(
        "Recipe with {} dependencies written to {}",
        prepared.recipe.len(),
        output.display()
    );
    if !quiet {
        println!("{}", prepared.key);
    }
    0
}

pub async fn handle_build(args: &BuildArgs, quiet: bool) -> i32 {
    let mut config = BuildConfig::default();
    if let Some(cache_dir) = &args.cache_dir {
        config.cache_dir = cache_dir.clone();
        config.work_dir = cache_dir.join("work");
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if let Some(timeout) = args.timeout {
        config.stage_timeout = Duration::from_secs(timeout);
    }
    if let Err(e) = config.validate() {
        error!("{e}");
        return EXIT_USAGE;
    }

    let tree = ProjectTree::new(project_path(args.project_path.clone()));
    let pipeline = build_pipeline(&config);

    let prepared = match &args.recipe {
        Some(path) => match Recipe::from_path(path) {
            Ok(recipe) => {
                let key = CacheKey::derive(&recipe);
                Some(PreparedRecipe { recipe, key })
            }
            Err(e) => {
                error!("{e}");
                return crate::error::PipelineError::Recipe(e).exit_code();
            }
        },
        None => None,
    };

    match pipeline.execute(&tree, prepared, &args.layout_root).await {
        Ok(report) => {
            info!(
                "Build complete: cache {}, executable at {}",
                if report.dependency_cache_hit {
                    "hit"
                } else {
                    "miss"
                },
                report.image.entrypoint.display()
            );
            if !quiet {
                println!("{}", report.image.entrypoint.display());
            }
            0
        }
        Err(e) => {
            error!("Stage '{}' failed: {e}", e.stage());
            e.exit_code()
        }
    }
}

fn project_path(arg: Option<PathBuf>) -> PathBuf {
    arg.unwrap_or_else(|| PathBuf::from("."))
}

fn build_pipeline(config: &BuildConfig) -> BuildPipeline {
    let store: Arc<dyn CacheStore> = Arc::new(DiskCacheStore::new(config.cache_dir.clone()));
    let compiler: Arc<dyn Compiler> = match (&config.dep_command, &config.app_command) {
        (Some(dep), Some(app)) => Arc::new(ProcessCompiler::new(dep.clone(), app.clone())),
        _ => Arc::new(CargoCompiler::new()),
    };
    BuildPipeline::new(store, compiler, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_prepare_writes_recipe_file() {
        let project = TempDir::new().unwrap();
        fs::write(
            project.path().join("Cargo.toml"),
            "[dependencies]\nlibfoo = \"1.0\"\n",
        )
        .unwrap();
        let out = TempDir::new().unwrap();
        let recipe_path = out.path().join("recipe.json");

        let args = PrepareArgs {
            project_path: Some(project.path().to_path_buf()),
            output: Some(recipe_path.clone()),
        };
        let code = handle_prepare(&args, true).await;

        assert_eq!(code, 0);
        let recipe = Recipe::from_path(&recipe_path).unwrap();
        assert_eq!(recipe.len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_unreadable_tree_exit_code() {
        let args = PrepareArgs {
            project_path: Some(PathBuf::from("/nonexistent/prebake-project")),
            output: None,
        };
        let code = handle_prepare(&args, true).await;
        assert_eq!(code, 10);
    }

    #[tokio::test]
    async fn test_build_conflict_exit_code() {
        let project = TempDir::new().unwrap();
        fs::write(
            project.path().join("Cargo.toml"),
            "[dependencies]\nlibfoo = \"1.0\"\n",
        )
        .unwrap();
        fs::create_dir_all(project.path().join("sub")).unwrap();
        fs::write(
            project.path().join("sub/Cargo.toml"),
            "[dependencies]\nlibfoo = \"2.0\"\n",
        )
        .unwrap();

        let cache = TempDir::new().unwrap();
        let layout = TempDir::new().unwrap();
        let args = BuildArgs {
            project_path: Some(project.path().to_path_buf()),
            recipe: None,
            layout_root: layout.path().to_path_buf(),
            cache_dir: Some(cache.path().to_path_buf()),
            jobs: None,
            timeout: None,
        };
        let code = handle_build(&args, true).await;
        assert_eq!(code, 11);
    }

    #[tokio::test]
    async fn test_build_rejects_zero_jobs() {
        let layout = TempDir::new().unwrap();
        let args = BuildArgs {
            project_path: None,
            recipe: None,
            layout_root: layout.path().to_path_buf(),
            cache_dir: None,
            jobs: Some(0),
            timeout: None,
        };
        let code = handle_build(&args, true).await;
        assert_eq!(code, EXIT_USAGE);
    }
}
