use std::sync::Arc;

use clap::Parser;
use forecaster_core::{CompletionConfig, Forecaster, ForecasterConfig, OpenAiCompletionClient};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "forecaster.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ForecasterConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Open the store
    let pool = match forecaster_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", config.database.url, e);
            std::process::exit(1);
        }
    };

    if args.health {
        match forecaster_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ SQLite connected: {}", v),
            Err(e) => {
                println!("❌ SQLite connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Forecaster DB health check passed");
        return Ok(());
    }

    forecaster_core::db::init_schema(&pool).await?;

    // The completion client needs OPENAI_API_KEY; without it there is nothing to serve.
    let completion_config = CompletionConfig::new(None, &config.llm);
    let client = match OpenAiCompletionClient::new(completion_config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create completion client: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        model = client.model(),
        "Completion client ready"
    );
    let forecaster = Forecaster::new(Arc::new(client), &config.llm);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    forecaster_server::http::start_http_server(pool, config, forecaster, tx.subscribe()).await?;

    Ok(())
}
