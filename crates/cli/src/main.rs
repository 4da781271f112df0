//! Walnut CLI - Main Entry Point

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use walnut_cli::output::{self, OutputFormat};
use walnut_cli::{init, LaunchOptions, Launcher, ReporterKind};
use walnut_core::logging::init_tracing;
use walnut_core::{RunContext, Settings, TagFilter};

/// Walnut - browser test runs with structured reports
#[derive(Parser)]
#[command(name = "walnut")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run suite files
    Run(RunArgs),

    /// Create the project layout in the current directory
    Init,
}

#[derive(Args)]
struct RunArgs {
    /// Suite files or directories to scan
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Only run tests carrying one of these tags (comma separated)
    #[arg(short, long)]
    tags: Option<String>,

    /// Reporter to attach
    #[arg(long, value_enum, default_value = "default")]
    reporter: ReporterKind,

    /// Executable to invoke with the run id after the run
    #[arg(long)]
    post_exec: Option<PathBuf>,

    /// Settings file
    #[arg(short, long, env = "WALNUT_CONFIG", default_value = init::CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run(args, cli.format, cli.verbose).await,
        Commands::Init => scaffold(cli.format, cli.verbose),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

async fn run(args: RunArgs, format: OutputFormat, verbose: bool) -> Result<ExitCode> {
    let settings = Settings::load(&args.config)?;
    let run = RunContext::new(settings);
    init_tracing(run.settings(), run.id(), verbose)?;

    let options = LaunchOptions {
        tags: args.tags.as_deref().map(TagFilter::parse).unwrap_or_default(),
        reporter: args.reporter,
        post_exec: args.post_exec,
    };
    let mut launcher = Launcher::new(run, options)?;
    for path in &args.paths {
        launcher.add_suite_files(path).await?;
    }

    let summary = launcher.launch().await?;
    output::print_summary(&summary, format);

    Ok(if summary.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn scaffold(format: OutputFormat, verbose: bool) -> Result<ExitCode> {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let root = std::env::current_dir()?;
    let result = init::scaffold(&root)?;
    output::print_scaffold(&result, format);
    Ok(ExitCode::SUCCESS)
}
