use clap::Parser;
use longshot_ingest::cli::{Cli, Commands};
use longshot_ingest::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        eprintln!("Warning: {} not found, using defaults", cli.config);
        let mut config = Config::default();
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    };

    // Initialize telemetry
    longshot_ingest::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Snapshot(args) => {
            tracing::info!("Starting snapshot ingestion");
            args.execute(&config).await?;
        }
        Commands::Markets(args) => {
            tracing::info!("Starting market universe pull");
            args.execute(&config).await?;
        }
        Commands::DailyMarkets(args) => {
            tracing::info!("Starting daily market pull");
            args.execute(&config).await?;
        }
        Commands::Events(args) => {
            tracing::info!("Starting event universe pull");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  API: {}", config.api.base_url);
            println!(
                "  Key id: {}",
                config.api.key_id.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  Rate limit: {}/s, burst {}",
                config.rate_limit.rate,
                config.rate_limit.burst()
            );
            println!(
                "  Retry: {} attempts, base {}ms",
                config.retry.max_attempts, config.retry.base_delay_ms
            );
            println!(
                "  Collector: {} workers, deadline {}",
                config.collector.max_workers,
                config
                    .collector
                    .deadline_secs
                    .map(|s| format!("{}s", s))
                    .unwrap_or_else(|| "none".to_string())
            );
            println!(
                "  Storage: {} (prefix {})",
                config.storage.root.display(),
                config.storage.prefix
            );
        }
    }

    Ok(())
}
