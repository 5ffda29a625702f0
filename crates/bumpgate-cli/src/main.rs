//! bumpgate - gated dependency upgrades for package.json projects
//!
//! ## Commands
//!
//! - `upgrade`: upgrade outdated dependencies behind the install/test/build/lint gate
//! - `snapshot`: print or save the captured dependency state
//! - `restore`: rewrite the manifest from a saved snapshot
//! - `doctor`: report which package managers are available

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use bumpgate_ci::{PackageManagerKind, ScriptConfig, ScriptRunner};
use bumpgate_core::{
    read_snapshot_json, render_summary, write_result_json, write_snapshot_json,
    ManifestStateManager, NpmRegistry,
};
use bumpgate_engine::{FastPathMode, UpgradeOptions, UpgradeOrchestrator};

#[derive(Parser)]
#[command(name = "bumpgate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Upgrade npm dependencies one gated candidate at a time", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade outdated dependencies, keeping only versions that pass the gate
    Upgrade(UpgradeArgs),

    /// Capture the manifest's dependency state as JSON
    Snapshot {
        /// Project directory containing package.json
        #[arg(short, long, default_value = ".", env = "BUMPGATE_DIR")]
        dir: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rewrite the manifest's dependency sections from a snapshot file
    Restore {
        /// Snapshot written by `bumpgate snapshot`
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Project directory containing package.json
        #[arg(short, long, default_value = ".", env = "BUMPGATE_DIR")]
        dir: PathBuf,
    },

    /// Check package manager availability
    Doctor {
        /// Only check this package manager
        #[arg(long)]
        package_manager: Option<PackageManagerKind>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FastPathArg {
    Off,
    Bulk,
    Admin,
}

#[derive(Args, Debug)]
struct UpgradeArgs {
    /// Project directory containing package.json
    #[arg(short, long, default_value = ".", env = "BUMPGATE_DIR")]
    dir: PathBuf,

    /// Package manager used for every stage
    #[arg(long, default_value = "npm", env = "BUMPGATE_PACKAGE_MANAGER")]
    package_manager: PackageManagerKind,

    /// Optional install stage run at the start of the gate
    #[arg(long, env = "BUMPGATE_INSTALL")]
    install: Option<String>,

    /// Test stage (defaults to the package.json `test` script)
    #[arg(long, env = "BUMPGATE_TEST")]
    test: Option<String>,

    /// Build stage (defaults to the package.json `build` script)
    #[arg(long, env = "BUMPGATE_BUILD")]
    build: Option<String>,

    /// Lint stage (defaults to the package.json `lint` script)
    #[arg(long, env = "BUMPGATE_LINT")]
    lint: Option<String>,

    /// Lockfile sync run after each manifest change (defaults to `install`)
    #[arg(long, env = "BUMPGATE_SYNC")]
    sync: Option<String>,

    /// Per-script timeout in milliseconds
    #[arg(long, default_value_t = ScriptConfig::DEFAULT_TIMEOUT_MS, env = "BUMPGATE_TIMEOUT_MS")]
    timeout_ms: u64,

    /// Fast path tried before per-dependency iteration
    #[arg(long, value_enum, default_value = "bulk", env = "BUMPGATE_FAST_PATH")]
    fast_path: FastPathArg,

    /// Shell command used by `--fast-path admin`
    #[arg(long, env = "BUMPGATE_ADMIN_COMMAND")]
    admin_command: Option<String>,

    /// Keep the manifest as-is when the run fails
    #[arg(long)]
    no_rollback: bool,

    /// Write the full result as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    bumpgate_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Upgrade(args) => cmd_upgrade(&args).await,
        Commands::Snapshot { dir, output } => cmd_snapshot(&dir, output.as_deref()),
        Commands::Restore { snapshot, dir } => cmd_restore(&snapshot, &dir),
        Commands::Doctor { package_manager } => cmd_doctor(package_manager).await,
    }
}

async fn cmd_upgrade(args: &UpgradeArgs) -> Result<ExitCode> {
    let options = build_options(args)?;
    let registry = Arc::new(NpmRegistry::from_env().context("Failed to create registry client")?);
    let executor = Arc::new(ScriptRunner::new().with_max_output_bytes(options.max_output_bytes));

    info!(dir = %options.working_dir.display(), "Starting upgrade run");
    let result = UpgradeOrchestrator::new(options, registry, executor)
        .run()
        .await
        .context("Upgrade run could not start")?;

    print!("{}", render_summary(&result));

    if let Some(path) = &args.report {
        write_result_json(path, &result)?;
        println!("Report written to {}", path.display());
    }

    if result.errors.is_empty() && !result.rollback_failed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Map CLI arguments onto run options, defaulting stages from package.json scripts.
fn build_options(args: &UpgradeArgs) -> Result<UpgradeOptions> {
    let manifest = ManifestStateManager::new(&args.dir)?;
    let declared = manifest.declared_scripts().unwrap_or_default();

    let pm = args.package_manager;
    let script = |command: &str| ScriptConfig::new(pm, command).with_timeout_ms(args.timeout_ms);
    let stage = |explicit: &Option<String>, name: &str| {
        explicit
            .as_deref()
            .or_else(|| declared.contains_key(name).then_some(name))
            .map(script)
    };

    let fast_path = match args.fast_path {
        FastPathArg::Off => FastPathMode::Off,
        FastPathArg::Bulk => FastPathMode::Bulk,
        FastPathArg::Admin => {
            let command = args
                .admin_command
                .as_deref()
                .context("--fast-path admin requires --admin-command")?;
            FastPathMode::Admin(ScriptConfig::shell(command).with_timeout_ms(args.timeout_ms))
        }
    };

    Ok(UpgradeOptions {
        working_dir: args.dir.clone(),
        package_manager: pm,
        install_script: args.install.as_deref().map(script),
        test_script: stage(&args.test, "test"),
        build_script: stage(&args.build, "build"),
        lint_script: stage(&args.lint, "lint"),
        sync_script: args.sync.as_deref().map(script),
        fast_path,
        rollback_on_failure: !args.no_rollback,
        ..UpgradeOptions::default()
    })
}

fn cmd_snapshot(dir: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let manifest = ManifestStateManager::new(dir)?;
    let snapshot = manifest.capture_initial_state()?;

    match output {
        Some(path) => {
            write_snapshot_json(path, &snapshot)?;
            println!(
                "Captured {} dependencies to {}",
                snapshot.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_restore(snapshot_path: &Path, dir: &Path) -> Result<ExitCode> {
    let snapshot = read_snapshot_json(snapshot_path)?;
    let manifest = ManifestStateManager::new(dir)?;
    manifest.rollback_to_state(&snapshot)?;

    println!(
        "Restored {} dependencies in {}",
        snapshot.len(),
        manifest.manifest_path().display()
    );
    Ok(ExitCode::SUCCESS)
}

async fn cmd_doctor(only: Option<PackageManagerKind>) -> Result<ExitCode> {
    let runner = ScriptRunner::new();
    let kinds: Vec<PackageManagerKind> = match only {
        Some(kind) => vec![kind],
        None => PackageManagerKind::ALL.to_vec(),
    };

    println!("bumpgate {}", bumpgate_core::VERSION);
    let mut missing = false;
    for kind in kinds {
        match runner.probe_package_manager(kind).await {
            Some(version) => println!("  {}: {}", kind, version),
            None => {
                println!("  {}: not found", kind);
                missing |= only.is_some();
            }
        }
    }

    Ok(if missing {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
