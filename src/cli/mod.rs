use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::services::auth_service::AuthService;

#[derive(Parser)]
#[command(name = "tableside")]
#[command(about = "Tableside - multi-tenant QR table ordering API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Apply migrations before serving")]
        migrate: bool,
    },

    #[command(about = "Apply database migrations and exit")]
    Migrate,

    #[command(about = "Create a platform super-admin, or promote an existing user")]
    CreateSuperAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: String,
        #[arg(long, env = "TABLESIDE_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { migrate: false }) {
        Commands::Serve { migrate } => {
            if migrate {
                DatabaseManager::run_migrations().await.context("failed to apply migrations")?;
            }
            serve().await
        }
        Commands::Migrate => {
            DatabaseManager::run_migrations().await.context("failed to apply migrations")?;
            DatabaseManager::close_all().await;
            Ok(())
        }
        Commands::CreateSuperAdmin { email, full_name, password } => {
            let service = AuthService::new().await?;
            let user_id = service
                .create_super_admin(&email, &full_name, &password)
                .await
                .context("failed to create super-admin")?;
            println!("Super-admin {} ready ({})", email, user_id);
            DatabaseManager::close_all().await;
            Ok(())
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = config::config();
    if crate::is_development!() && config.security.expose_dev_tokens {
        tracing::warn!("Development mode: reset and invitation tokens are returned in responses");
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Tableside API listening on http://{}", bind_addr);

    axum::serve(listener, crate::app())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
