//! config-normalize CLI - one-time normalization of generic config records.

mod progress;

use clap::{Parser, Subcommand};
use config_normalize::history::{self, MIGRATION_DESCRIPTION};
use config_normalize::target::schema::migration_script;
use config_normalize::{Config, MigrateError, Orchestrator, PgStore, MIGRATION_VERSION};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "config-normalize")]
#[command(about = "Normalize generic config records into relational PostgreSQL tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the migration
    Run {
        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Dry run: read the source table but write into memory only
        #[arg(long)]
        dry_run: bool,

        /// Run even if the migration is recorded as already applied
        #[arg(long)]
        force: bool,

        /// Skip verification after population
        #[arg(long)]
        skip_verify: bool,
    },

    /// Print the DDL the migration applies, without connecting
    Plan,

    /// Compare the normalized tables with the generic config table
    Verify,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            target_schema,
            dry_run,
            force,
            skip_verify,
        } => {
            if let Some(schema) = target_schema {
                config.target.schema = schema;
                config.validate()?;
            }
            if skip_verify {
                config.migration.verify_after_run = false;
            }

            let mut orchestrator = if dry_run {
                Orchestrator::dry_run_from_config(&config).await?
            } else {
                Orchestrator::from_config(&config).await?
            };
            orchestrator = orchestrator.with_force(force);

            if cli.progress {
                orchestrator = orchestrator.with_reporter(Arc::new(progress::JsonLinesReporter));
            }

            let result = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = if dry_run {
                    "Dry run completed!"
                } else {
                    "Migration completed!"
                };
                println!("\n{}", status_msg);
                println!("  Version: {}", result.version);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                for table in &result.tables {
                    println!("  {:<24} {} rows", table.table, table.rows_written);
                }
                println!("  Total rows: {}", result.rows_written);
                if let Some(report) = &result.verification {
                    println!("  Verification: {}", report.summary());
                }
            }
        }

        Commands::Plan => {
            let schema = &config.target.schema;
            println!("-- {} {}", MIGRATION_VERSION, MIGRATION_DESCRIPTION);
            println!("-- checksum: {}", history::checksum(schema));
            print!("{}", migration_script(schema));
        }

        Commands::Verify => {
            let orchestrator = Orchestrator::from_config(&config).await?;
            let report = orchestrator.verify().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Verification Results:");
                for table in &report.tables {
                    println!(
                        "  {:<24} source {:>6}  target {:>6}  {}",
                        table.table_name,
                        table.source_row_count,
                        table.target_row_count,
                        if table.is_consistent() { "OK" } else { "MISMATCH" }
                    );
                }
                println!("  Duration: {:.2}s", report.duration_ms as f64 / 1000.0);
            }

            if !report.is_consistent() {
                return Err(MigrateError::Verification(report.summary()));
            }
        }

        Commands::HealthCheck => {
            let result = PgStore::health_check(&config.target, &config.migration).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                println!(
                    "  Source table {}: {}",
                    config.migration.source_table,
                    if result.source_table_exists { "found" } else { "MISSING" }
                );
                for (kind, count) in &result.config_counts {
                    println!("    {:<32} {}", kind, count);
                }
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy() { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy() {
                return Err(MigrateError::pool(
                    result.error.as_deref().unwrap_or("source table not found"),
                    "health check",
                ));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries results and DDL
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
