//! PMC Harvester CLI application
//!
//! Mirrors the PMC open-access package tree and normalizes every archive into
//! a `<identifier>.pdf` + `<identifier>.nxml` pair.

use std::process;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use pmc_harvester::cli::{handle_clean, handle_harvest, handle_index, Cli, Commands};
use pmc_harvester::config::AppConfig;
use pmc_harvester::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error ({}): {}", e.category(), e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Missing .env is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    let config = AppConfig::load(cli.global.config.as_deref())
        .await?
        .with_root(cli.global.root.clone());

    init_logging(&cli, &config);

    info!("PMC Harvester v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Harvest => {
            info!("Executing harvest command");
            handle_harvest(&config).await
        }
        Commands::Clean => {
            info!("Executing clean command");
            handle_clean(&config).await
        }
        Commands::Index(args) => {
            info!("Executing index command");
            handle_index(&config, args).await
        }
    }
}

/// Initialize logging from CLI verbosity, falling back to `[logging].level`
fn init_logging(cli: &Cli, config: &AppConfig) {
    let configured = config.logging.level.parse::<tracing::Level>();
    let log_level = cli.log_level(
        configured
            .as_ref()
            .copied()
            .unwrap_or(tracing::Level::INFO),
    );

    let filter = EnvFilter::from_default_env();
    let filter = match format!("pmc_harvester={}", log_level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if configured.is_err() {
        warn!(
            "Unknown log level '{}' in configuration, using info",
            config.logging.level
        );
    }
    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
