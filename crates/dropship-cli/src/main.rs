//! Dropship - authenticated deployment gateway
//!
//! Usage:
//!   dropship deploy --name alice --key alice.pem --file site.zip --path alice/site
//!   dropship manage --name alice --key alice.pem --action restart --project api
//!   dropship check-config

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dropship_core::config::load_config;
use dropship_core::prelude::*;
use dropship_core::security::PathGuard;

#[derive(Parser)]
#[command(name = "dropship")]
#[command(about = "Authenticated deployment gateway", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/dropship/dropship.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy an archive or single file into an authorized target
    Deploy {
        /// Identity whose public key verifies the private key
        #[arg(long, short)]
        name: String,
        /// Private key file (PEM)
        #[arg(long, short)]
        key: PathBuf,
        /// Archive (.zip, .tar.gz, .tgz) or single file to deploy
        #[arg(long, short)]
        file: PathBuf,
        /// Target directory below the upload directory
        #[arg(long, short)]
        path: Option<String>,
        /// Application type (generic or node)
        #[arg(long = "type", short = 't')]
        app_type: Option<String>,
    },

    /// Start, stop, restart, delete, list or inspect supervised processes
    Manage {
        /// Identity whose public key verifies the private key
        #[arg(long, short)]
        name: String,
        /// Private key file (PEM)
        #[arg(long, short)]
        key: PathBuf,
        /// start, stop, restart, delete, list or status
        #[arg(long, short)]
        action: String,
        /// Project (process) name
        #[arg(long, short)]
        project: Option<String>,
        /// Entry script relative to the identity's first root (start only)
        #[arg(long, short)]
        script: Option<String>,
    },

    /// Validate the configuration and print the authorization table
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropship=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::CheckConfig => run_check_config(&config, cli.format),
        Commands::Deploy {
            name,
            key,
            file,
            path,
            app_type,
        } => {
            let context = GatewayContext::new(config.prepare()?);
            let private_key = stage(context.config(), &key)?;
            let artifact = match stage(context.config(), &file) {
                Ok(artifact) => artifact,
                Err(err) => {
                    let _ = std::fs::remove_file(&private_key.temp_path);
                    return Err(err);
                }
            };
            let request = DeployRequest {
                identity: Some(name),
                private_key: Some(private_key),
                artifact: Some(artifact),
                subdir: path,
                app_type,
            };
            match context.deployment_service().deploy(request).await {
                Ok(report) => print_report(&report, cli.format),
                Err(err) => fail(&err, cli.format),
            }
        }
        Commands::Manage {
            name,
            key,
            action,
            project,
            script,
        } => {
            let context = GatewayContext::new(config.prepare()?);
            let request = ManageRequest {
                identity: Some(name),
                private_key: Some(stage(context.config(), &key)?),
                action: Some(action),
                project_name: project,
                script_path: script,
            };
            match context.process_service().manage(request).await {
                Ok(outcome) => print_outcome(&outcome, cli.format),
                Err(err) => fail(&err, cli.format),
            }
        }
    }
}

static STAGED: AtomicUsize = AtomicUsize::new(0);

/// Copy `source` into the staging directory the way an upload would land.
fn stage(config: &GatewayConfig, source: &Path) -> Result<UploadedFile> {
    let original_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file: {}", source.display()))?;
    let staged = config.temp_dir.join(format!(
        "upload-{}-{}",
        std::process::id(),
        STAGED.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::copy(source, &staged)
        .with_context(|| format!("Failed to stage {}", source.display()))?;
    Ok(UploadedFile::new(original_name, staged))
}

fn run_check_config(config: &GatewayConfig, format: OutputFormat) -> Result<()> {
    let guard = PathGuard::new(&config.upload_dir);
    let table: Vec<(&String, Vec<PathBuf>)> = config
        .authorized_users
        .keys()
        .map(|identity| {
            let roots = config
                .roots_for(identity)
                .iter()
                .map(|root| guard.resolve_target(root))
                .collect();
            (identity, roots)
        })
        .collect();

    match format {
        OutputFormat::Table => {
            println!("Upload dir:     {}", config.upload_dir.display());
            match &config.public_key_dir {
                Some(dir) => println!("Public keys:    {}", dir.display()),
                None => println!("Public keys:    (not set, every authentication fails)"),
            }
            println!("Staging dir:    {}", config.temp_dir.display());
            println!();
            if table.is_empty() {
                println!("No authorized users configured.");
                return Ok(());
            }
            println!("{:<20} Roots", "Identity");
            println!("{}", "-".repeat(60));
            for (identity, roots) in &table {
                let roots: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
                println!("{:<20} {}", identity, roots.join(", "));
            }
        }
        OutputFormat::Json => {
            let users: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(identity, roots)| (identity.clone(), serde_json::json!(roots)))
                .collect();
            let output = serde_json::json!({
                "upload_dir": config.upload_dir,
                "public_key_dir": config.public_key_dir,
                "temp_dir": config.temp_dir,
                "authorized_users": users,
                "preserve": config.preserve_paths(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_report(report: &DeploymentReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let mark = if report.is_clean() { "✓" } else { "⚠" };
            println!("{mark} {}", report.message);
            println!("  Path:  {}", report.path.display());
            println!("  Files: {}", report.files);
            if let Some(hash) = &report.tree_hash {
                println!("  Hash:  {hash}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn print_outcome(outcome: &ProcessOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("✓ {}", outcome.message());
            match outcome {
                ProcessOutcome::Status { processes, .. } => print_status_table(processes),
                ProcessOutcome::Started { processes, .. }
                | ProcessOutcome::Stopped { processes, .. }
                | ProcessOutcome::Restarted { processes, .. }
                | ProcessOutcome::Deleted { processes, .. }
                | ProcessOutcome::Listed { processes } => print_process_table(processes),
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
    }
    Ok(())
}

fn print_process_table(processes: &[ProcessRecord]) {
    if processes.is_empty() {
        return;
    }
    println!("{:<6} {:<24} {:<12} {:<8} Restarts", "Id", "Name", "Status", "PID");
    println!("{}", "-".repeat(62));
    for p in processes {
        println!(
            "{:<6} {:<24} {:<12} {:<8} {}",
            p.internal_id,
            p.name,
            p.status.to_string(),
            p.pid.map_or_else(|| "-".to_string(), |pid| pid.to_string()),
            p.restart_count
        );
    }
}

fn print_status_table(processes: &[ProcessStatus]) {
    println!("{:<6} {:<24} {:<12} {:<8} Uptime", "Id", "Name", "Status", "PID");
    println!("{}", "-".repeat(62));
    for p in processes {
        println!(
            "{:<6} {:<24} {:<12} {:<8} {}",
            p.internal_id,
            p.name,
            p.status.to_string(),
            p.pid.map_or_else(|| "-".to_string(), |pid| pid.to_string()),
            p.uptime_ms
                .map_or_else(|| "-".to_string(), |ms| format!("{}s", ms / 1000))
        );
    }
}

/// Print the caller-safe message and exit with a per-class code.
fn fail(err: &GatewayError, format: OutputFormat) -> ! {
    let class = err.class();
    match format {
        OutputFormat::Table => eprintln!("✗ {}", err.public_message()),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "error": err.public_message(),
                "class": class,
                "status": class.status_code(),
            });
            println!("{output:#}");
        }
    }
    std::process::exit(exit_code(class))
}

fn exit_code(class: ErrorClass) -> i32 {
    match class {
        ErrorClass::InternalError => 1,
        ErrorClass::BadInput => 2,
        ErrorClass::Unauthenticated => 3,
        ErrorClass::Unauthorized => 4,
        ErrorClass::NotFound => 5,
        ErrorClass::UpstreamFailure => 6,
    }
}
