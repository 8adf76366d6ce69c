use clap::Parser;
use optrack::cli::{Cli, Commands};
use optrack::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    match cli.command {
        Commands::Serve(args) => {
            // Telemetry only for the long-running service
            let _guard = optrack::telemetry::init_telemetry(&config.telemetry)?;
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Server: bind {}", config.server.bind_addr);
            println!("  Cache TTL: {}s", config.cache.ttl_secs);
            println!(
                "  Health: every {}s, timeout {}s, stuck after {} checks",
                config.health.check_interval_secs,
                config.health.operation_timeout_secs,
                config.health.stuck_intervals
            );
            println!(
                "  Telemetry: metrics port {}, log level {}",
                config.telemetry.metrics_port, config.telemetry.log_level
            );
        }
    }

    Ok(())
}
