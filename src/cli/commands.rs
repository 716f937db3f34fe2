use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default location of the recipe file relative to the working directory
pub const DEFAULT_RECIPE_FILE: &str = "prebake.recipe.json";

/// Dependency-cache-aware staged build orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "prebake",
    about = "Dependency-cache-aware staged build orchestrator",
    version,
    long_about = "prebake splits a build into a cacheable dependency stage and an \
                  application stage. Repeated builds with unchanged dependency \
                  declarations skip dependency recompilation entirely."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Increase verbosity")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Scan a project tree and write its dependency recipe",
        long_about = "Scans the project tree for dependency manifests, builds the \
                      canonical recipe and writes it to a file alongside its cache key.\n\n\
                      Examples:\n  \
                      prebake prepare\n  \
                      prebake prepare /path/to/project -o recipe.json"
    )]
    Prepare(PrepareArgs),

    #[command(
        about = "Run the full staged build pipeline",
        long_about = "Runs scan, recipe, dependency stage (cache-aware), application \
                      stage and packaging. A recipe produced by `prepare` can be \
                      supplied to skip re-scanning.\n\n\
                      Examples:\n  \
                      prebake build\n  \
                      prebake build /path/to/project --recipe recipe.json\n  \
                      prebake build --jobs 8 --timeout 600"
    )]
    Build(BuildArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct PrepareArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to the project tree (defaults to current directory)"
    )]
    pub project_path: Option<PathBuf>,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Recipe output file (defaults to prebake.recipe.json)"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to the project tree (defaults to current directory)"
    )]
    pub project_path: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Recipe file produced by `prepare` (skips re-scanning)"
    )]
    pub recipe: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        default_value = "rootfs",
        help = "Runtime layout root receiving the packaged executable"
    )]
    pub layout_root: PathBuf,

    #[arg(long, value_name = "DIR", help = "Override the dependency cache directory")]
    pub cache_dir: Option<PathBuf>,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        help = "Max parallel dependency compilations"
    )]
    pub jobs: Option<usize>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Per-stage time budget in seconds"
    )]
    pub timeout: Option<u64>,
}
