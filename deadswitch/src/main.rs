#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use deadswitch::api::build_router;
use deadswitch::config::Config;
use deadswitch::container::ServiceContainer;
use deadswitch::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _logging_guard = logging::init_logging(&config.log_dir, config.log_level, config.log_format)?;

    tracing::info!(
        port = config.port,
        storage_dir = %config.storage_dir.display(),
        auth_enabled = config.auth_enabled,
        "starting deadswitch"
    );

    let mut container = ServiceContainer::build(config).await?;
    container.initialize().await?;

    let app_state = container.app_state();
    let cancel = container.cancellation_token();
    let port = container.config.port;

    let router = build_router(app_state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on port {port}");

    let shutdown_signal = {
        let cancel = cancel.clone();
        async move {
            wait_for_shutdown_signal().await;
            cancel.cancel();
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    container.shutdown().await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
