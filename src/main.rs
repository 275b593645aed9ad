use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nyx::cli::{self, Cli, Commands, UserSelector};
use nyx::config::Config;
use nyx::engine::{spawn_reminder_task, ReminderMonitor};
use nyx::notifications::{build_notifiers, SmtpMailer};
use nyx::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if matches!(
        cli.command,
        Some(Commands::Users(_)) | Some(Commands::Stats { .. }) | Some(Commands::Config(_))
    ) {
        return cli::run_command(&cli, &config).await;
    }

    tracing::info!("Starting Nyx v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Some(Commands::Watch { username }) => watch(config, username).await,
        _ => serve(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let db = cli::open_db(&config).await?;

    let mailer = Arc::new(SmtpMailer::new(config.email.clone()));
    if !mailer.is_enabled() {
        tracing::warn!("Email not configured, password reset codes cannot be delivered");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, db.clone(), mailer));
    let app = nyx::api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn watch(config: Config, username: &str) -> Result<()> {
    let db = cli::open_db(&config).await?;
    let user = cli::find_user(&db, &UserSelector::Username(username.to_string())).await?;

    let (toast, alarm) = build_notifiers(&config.reminders);
    let monitor = ReminderMonitor::new(db.clone(), user.id, toast, alarm);
    let handle = spawn_reminder_task(monitor, &config.reminders);

    tracing::info!(user_id = user.id, username = %user.username, "Watching reminders, press Ctrl+C to stop");
    shutdown_signal().await;

    handle.abort();
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
