//! tagshard CLI - Tag-aware, shardable test runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use tagshard::config::{self, DEFAULT_CONFIG_FILE, TestSettings};
use tagshard::discovery::DirectoryLister;
use tagshard::orchestrator::{self, RunRequest};
use tagshard::report;

#[derive(Parser)]
#[command(name = "tagshard")]
#[command(about = "Tag-aware, shardable test runner", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path [default: <project-dir>/tagshard.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project root to enumerate and test
    #[arg(short = 'C', long, default_value = ".", global = true)]
    project_dir: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Additional path globs to exclude (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', global = true)]
    exclude: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tests of the selected units
    Run {
        /// Tags selecting the units to test (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// JUnit XML output path
        #[arg(long)]
        junit_output: Option<PathBuf>,

        /// Run only shard X of N, given as X,N (e.g. 0,4)
        #[arg(long, default_value = "")]
        partition: String,

        /// Arguments passed through to the test runner
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// List the units selected by tags
    Tags {
        /// Tags to resolve (comma-separated); all units when empty
        #[arg(value_delimiter = ',')]
        tags: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate configuration file
    Validate,

    /// Convert a verbose test transcript on stdin to JUnit XML
    #[command(hide = true)]
    JunitReport {
        /// Output path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the test transcript.
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Run {
            tags,
            junit_output,
            partition,
            args,
        } => run_tests(&cli, tags, junit_output.as_deref(), partition, args).await,
        Commands::Tags { tags, format } => list_units(&cli, tags, *format),
        Commands::Validate => validate_config(&cli),
        Commands::JunitReport { output } => junit_report(output.as_deref()).await,
    }
}

fn load_settings(cli: &Cli) -> Result<TestSettings> {
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_config_or_default(&cli.project_dir.join(DEFAULT_CONFIG_FILE))?,
    };
    let settings = config
        .into_settings(&cli.exclude)
        .context("Invalid configuration")?;
    Ok(settings)
}

async fn run_tests(
    cli: &Cli,
    tags: &[String],
    junit_output: Option<&Path>,
    partition: &str,
    passthrough: &[String],
) -> Result<()> {
    let settings = load_settings(cli)?;
    let lister = DirectoryLister::new(&settings.units.file_pattern)?;

    let request = RunRequest {
        project_dir: &cli.project_dir,
        passthrough,
        tags,
        report_path: junit_output,
        partition,
    };

    let mut stdout = tokio::io::stdout();
    let outcome = orchestrator::run_tests(&request, &settings, &lister, &mut stdout).await?;

    if let Some(err) = outcome.error {
        eprintln!();
        eprintln!("{}", console::style(err.to_string()).red().bold());
        std::process::exit(1);
    }

    info!("All tests passed");
    Ok(())
}

fn list_units(cli: &Cli, tags: &[String], format: OutputFormat) -> Result<()> {
    let settings = load_settings(cli)?;
    let lister = DirectoryLister::new(&settings.units.file_pattern)?;

    let units = orchestrator::list_tagged_units(&cli.project_dir, tags, &settings, &lister)?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&units)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for unit in &units {
                println!("{}", unit);
            }
        }
    }

    Ok(())
}

fn validate_config(cli: &Cli) -> Result<()> {
    match load_settings(cli) {
        Ok(settings) => {
            println!("Configuration is valid!");
            println!();
            println!("Settings:");
            println!("  Runner: {}", settings.runner.program);
            println!("  Unit files: {}", settings.units.file_pattern);

            let tags: Vec<&str> = settings.tags.names().collect();
            if tags.is_empty() {
                println!("  Tags: (none)");
            } else {
                println!("  Tags: {}", tags.join(", "));
            }

            Ok(())
        }
        Err(e) => {
            eprintln!(
                "{} {:#}",
                console::style("Configuration error:").red().bold(),
                e
            );
            std::process::exit(1);
        }
    }
}

async fn junit_report(output: Option<&Path>) -> Result<()> {
    let stdin = tokio::io::stdin();

    let report = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            report::write_report(stdin, &mut file).await?
        }
        None => report::write_report(stdin, &mut tokio::io::stdout()).await?,
    };

    report::print_summary(&report);
    Ok(())
}
