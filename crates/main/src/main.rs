//! 主应用程序入口
//!
//! 启动 Axum Web API 与实时聊天服务。

use std::sync::Arc;

use application::{Clock, SystemClock};
use config::AppConfig;
use infrastructure::{Infrastructure, InfrastructureConfig};
use tracing_subscriber::EnvFilter;
use web_api::{cors_layer, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(config = %config.sanitize(), "configuration loaded");
    if config.uses_dev_secret() {
        tracing::warn!("using the built-in development JWT secret, set APP_JWT__SECRET in production");
    }

    let infra = Infrastructure::connect(InfrastructureConfig::from(&config)).await?;
    tracing::info!(backend = infra.backend, "storage initialised");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::build(&infra, &config, clock);
    let app = router(state).layer(cors_layer(&config.server.cors_origins));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("聊天室服务器启动在 http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown signal received");
}
