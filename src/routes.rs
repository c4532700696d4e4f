//! 路由注册
//! 控制台路由挂载在 servlet_path 下，健康检查挂在根路径

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer};

use crate::{handlers, middleware::AppState};

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    let servlet_path = state.config.console.servlet_path.clone();
    let app = if servlet_path.is_empty() {
        public_routes.merge(console_routes())
    } else {
        public_routes.nest(&servlet_path, console_routes())
    };

    app.layer(RequestBodyLimitLayer::new(state.config.server.max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .with_state(state)
}

/// 控制台路由
///
/// 带扩展名的列表地址单独注册；作业名上的扩展名由处理器解析。
fn console_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::home::home))
        .route("/home", get(handlers::home::home))
        .route("/home.html", get(handlers::home::home))
        .route("/home.json", get(handlers::home::home))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/jobs.html", get(handlers::jobs::list_jobs))
        .route("/jobs.json", get(handlers::jobs::list_jobs))
        .route("/jobs.rss", get(handlers::jobs::list_jobs))
        .route(
            "/jobs/{jobName}",
            get(handlers::jobs::job_details).post(handlers::jobs::launch_job),
        )
}
