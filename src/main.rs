//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `url_verdict` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Exit codes (1 when any URL scored high risk, 2 on startup failure)
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use url_verdict::initialization::init_logger_with;
use url_verdict::{run_analysis, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows setting URL_VERDICT_AI_API_KEY in .env without exporting it manually
    // Try loading from current directory first, then from the executable's directory
    if dotenvy::dotenv().is_err() {
        // If .env not found in current dir, try next to the executable
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logger based on CLI options
    let log_level = cli.log_level.clone();
    let log_format = cli.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    // Run the analysis using the library
    match run_analysis(cli).await {
        Ok(report) => {
            println!(
                "Analyzed {} URL{} ({} high risk, {} degraded) in {:.1}s",
                report.analyzed,
                if report.analyzed == 1 { "" } else { "s" },
                report.high_risk,
                report.degraded,
                report.elapsed_seconds
            );
            if report.high_risk > 0 {
                process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("url_verdict error: {:#}", e);
            process::exit(2);
        }
    }
}
