use clap::Parser;
use tableside::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tableside=info,tower_http=info")))
        .init();

    let config = tableside::config::config();
    tracing::info!("Starting Tableside in {:?} mode", config.environment);

    let cli = Cli::parse();
    if let Err(e) = tableside::cli::run(cli).await {
        match std::env::var("TABLESIDE_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }

    Ok(())
}
