use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use avatar_db::Database;
use avatar_server::config::Config;
use avatar_server::directory::MySqlDirectory;
use avatar_server::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avatar_server=debug,avatar_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Creates the data directory and the AVATARS table on first run
    let db = Database::open(&config.db_path)?;
    let users = MySqlDirectory::new(&config.users);
    info!(
        "User lookups go to MySQL at {}:{}",
        config.users.host, config.users.port
    );

    let state = AppState {
        avatars: Arc::new(db),
        users: Arc::new(users),
        port: config.port,
    };

    let app = avatar_server::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Avatar server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
