use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use datarecon_core::{Config, ConnectionConfig, ReconciliationResult};
use datarecon_engine::{compare, CompareOptions};
use datarecon_warehouse::{PostgresSource, RowSource, SnowflakeSource};

/// DataRecon - row-level reconciliation between warehouse snapshots
#[derive(Parser)]
#[command(name = "datarecon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: datarecon.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch both row-sets and reconcile them
    Compare {
        /// Override the report output path from the config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify that both configured connections work
    TestConnection,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets usually live in .env rather than datarecon.toml
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if cli.verbose {
        eprintln!(
            "{} {} -> {}",
            "Comparing".cyan(),
            config.source.backend,
            config.target.backend
        );
    }

    match cli.command {
        Commands::Compare { output } => {
            compare_command(&config, output.as_deref(), cli.verbose).await
        }
        Commands::TestConnection => test_connection_command(&config, cli.verbose).await,
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("datarecon.toml"));

    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Config file not found at {}. Create one with [source], [target] and [comparison] sections.",
            path.display()
        ));
    }

    Ok(Config::from_file(&path)?)
}

/// Build the adapter for one side of the comparison
///
/// `prefix` is `SOURCE` or `TARGET`; it selects which environment variables
/// may override the file settings (e.g. `SOURCE_PASSWORD`).
async fn build_source(conn: &ConnectionConfig, prefix: &str) -> Result<Box<dyn RowSource>> {
    match conn.backend.to_lowercase().as_str() {
        "postgres" | "postgresql" | "redshift" => {
            let host = conn.require(prefix, "host")?;
            let port: u16 = conn
                .setting(prefix, "port")
                .unwrap_or_else(|| "5432".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("invalid port in [{}] section", prefix.to_lowercase())
                })?;
            let dbname = conn.require(prefix, "dbname")?;
            let user = conn.require(prefix, "user")?;
            let password = conn.require(prefix, "password")?;

            let use_tls = conn
                .setting(prefix, "sslmode")
                .is_some_and(|mode| mode == "require");

            let source = if use_tls {
                PostgresSource::connect_with_tls(host, port, dbname, user, password).await?
            } else {
                PostgresSource::connect(host, port, dbname, user, password).await?
            };
            Ok(Box::new(source))
        }
        "snowflake" => {
            let account = conn.require(prefix, "account")?;
            let username = conn.require(prefix, "username")?;

            let mut builder = if let Some(private_key) = conn.setting(prefix, "private_key") {
                SnowflakeSource::with_key_pair(account, username, private_key)
            } else {
                let password = conn.require(prefix, "password")?;
                SnowflakeSource::with_password(account, username, password)
            };

            if let Some(warehouse) = conn.setting(prefix, "warehouse") {
                builder = builder.with_warehouse(warehouse);
            }
            if let Some(role) = conn.setting(prefix, "role") {
                builder = builder.with_role(role);
            }
            if let Some(database) = conn.setting(prefix, "database") {
                builder = builder.with_database(database);
            }

            Ok(Box::new(builder.build()?))
        }
        other => Err(anyhow::anyhow!(
            "Unsupported backend type '{}'. Supported: postgres, snowflake",
            other
        )),
    }
}

/// Compare command - fetch both sides, reconcile, report
async fn compare_command(config: &Config, output: Option<&Path>, verbose: bool) -> Result<()> {
    if verbose {
        eprintln!("{} source ({})...", "Connecting to".cyan(), config.source.backend);
    }
    let mut source = build_source(&config.source, "SOURCE").await?;

    if verbose {
        eprintln!("{} target ({})...", "Connecting to".cyan(), config.target.backend);
    }
    let mut target = match build_source(&config.target, "TARGET").await {
        Ok(target) => target,
        Err(e) => {
            let _ = source.close().await;
            return Err(e);
        }
    };

    let outcome = run_comparison(source.as_ref(), target.as_ref(), config, verbose).await;

    // Release both connections before surfacing any error
    if let Err(e) = source.close().await {
        eprintln!("{} failed to close source connection: {}", "Warning:".yellow(), e);
    }
    if let Err(e) = target.close().await {
        eprintln!("{} failed to close target connection: {}", "Warning:".yellow(), e);
    }

    let result = outcome?;

    let output_path = output.unwrap_or_else(|| config.comparison.output.as_path());
    let mut report_failed = false;
    if let Err(e) = result.save_to_file(output_path) {
        // The in-memory result is still valid; print the summary anyway
        eprintln!("{} {}", "Failed to save report:".red(), e);
        report_failed = true;
    } else if verbose {
        eprintln!("{} {}", "Report saved to:".green(), output_path.display());
    }

    print_summary(&result, output_path, report_failed);

    if report_failed || result.has_discrepancies() {
        std::process::exit(1);
    }

    Ok(())
}

async fn run_comparison(
    source: &dyn RowSource,
    target: &dyn RowSource,
    config: &Config,
    verbose: bool,
) -> Result<ReconciliationResult> {
    let comparison = &config.comparison;

    if verbose {
        eprintln!("{}", "Fetching both row-sets...".cyan());
    }

    // Both fetches are independent; either failure aborts the run
    let (source_rows, target_rows) = tokio::try_join!(
        source.fetch_rows(&comparison.source_query),
        target.fetch_rows(&comparison.target_query)
    )?;

    if verbose {
        eprintln!("  {} rows from source ({})", source_rows.len(), source.name());
        eprintln!("  {} rows from target ({})", target_rows.len(), target.name());
        eprintln!("{}", "Reconciling...".cyan());
    }

    let mut options = CompareOptions::new(comparison.key_columns.clone())
        .with_chunk_size(comparison.chunk_size);
    if let Some(columns) = &comparison.compare_columns {
        options = options.with_compare_columns(columns.clone());
    }

    Ok(compare(&source_rows, &target_rows, &options)?)
}

/// TestConnection command - open, probe, and close each side
async fn test_connection_command(config: &Config, verbose: bool) -> Result<()> {
    let mut failures = 0;

    for (label, prefix, conn) in [
        ("source", "SOURCE", &config.source),
        ("target", "TARGET", &config.target),
    ] {
        if verbose {
            eprintln!("{} {} ({})...", "Testing".cyan(), label, conn.backend);
        }

        match build_source(conn, prefix).await {
            Ok(mut adapter) => {
                match adapter.test_connection().await {
                    Ok(()) => {
                        println!("{} {} connection OK ({})", "✓".green(), label, adapter.name());
                    }
                    Err(e) => {
                        println!("{} {} connection failed: {}", "✗".red(), label, e);
                        failures += 1;
                    }
                }
                if let Err(e) = adapter.close().await {
                    eprintln!(
                        "{} failed to close {} connection: {}",
                        "Warning:".yellow(),
                        label,
                        e
                    );
                }
            }
            Err(e) => {
                println!("{} {} connection failed: {}", "✗".red(), label, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Print reconciliation summary to stdout
fn print_summary(result: &ReconciliationResult, output: &Path, report_failed: bool) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Reconciliation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Timestamp: {}", result.timestamp);
    println!("Rows in source: {}", result.source_row_count);
    println!("Rows in target: {}", result.target_row_count);
    println!("Columns compared: {}", result.columns_compared.join(", "));
    println!();

    println!("{}", "Summary:".bold());
    println!(
        "  Rows only in source: {}",
        count_colored(result.only_in_source.len())
    );
    println!(
        "  Rows only in target: {}",
        count_colored(result.only_in_target.len())
    );
    println!(
        "  Keys with value differences: {}",
        count_colored(result.value_differences.len())
    );
    println!(
        "  Divergent (key, column) pairs: {}",
        result.difference_count()
    );

    if result.source_key_collisions > 0 || result.target_key_collisions > 0 {
        println!();
        println!(
            "  {} duplicate keys: {} in source, {} in target (last row wins)",
            "⚠".yellow(),
            result.source_key_collisions,
            result.target_key_collisions
        );
    }

    println!();

    if !result.has_discrepancies() {
        println!("{}", "✓ Row-sets match!".green().bold());
    } else if !result.value_differences.is_empty() {
        println!("{}", "Value Differences:".bold());
        for diff in result.value_differences.iter().take(10) {
            let key = diff
                .key
                .iter()
                .map(|(column, value)| format!("{}={}", column, value))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  [{}]", key.yellow());

            for (column, pair) in &diff.differences {
                println!(
                    "    {}: {} != {}",
                    column, pair.source_value, pair.target_value
                );
            }
        }
        if result.value_differences.len() > 10 {
            println!(
                "  ... and {} more keys with differences",
                result.value_differences.len() - 10
            );
        }
    }

    println!();
    if report_failed {
        println!(
            "{}",
            "Report could not be written; the summary above is complete.".red()
        );
    } else {
        println!("Detailed report saved to: {}", output.display());
    }
    println!("{}", "=".repeat(60).bright_blue());
}

fn count_colored(count: usize) -> colored::ColoredString {
    if count > 0 {
        count.to_string().red().bold()
    } else {
        count.to_string().green()
    }
}
