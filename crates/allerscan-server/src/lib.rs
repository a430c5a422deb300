//! 过敏原扫描 HTTP API（axum）
//!
//! 路由均挂在 `/api` 下；错误统一映射为 `{"error": ...}` 与对应状态码。
pub mod errors;
pub mod handlers;
pub mod models;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use handlers::AppState;

/// 上传大小上限（图片 / PDF）
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/allergens", get(handlers::list_allergens).post(handlers::create_allergen))
        .route("/allergens/:id", put(handlers::update_allergen).delete(handlers::delete_allergen))
        .route("/scan", post(handlers::scan))
        .route("/scans", get(handlers::list_scans));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// 绑定地址并服务，直到收到 Ctrl+C / SIGTERM
pub async fn serve(state: AppState, listen: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(wait_for_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
