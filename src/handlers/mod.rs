//! HTTP 处理器模块

pub mod health;
pub mod home;
pub mod jobs;

use axum::http::{header, HeaderMap};

use crate::middleware::AppState;

/// 生成绝对地址的前缀：优先使用配置，其次取请求的 Host 头
pub(crate) fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base_url) = &state.config.console.base_url {
        return base_url.trim_end_matches('/').to_string();
    }

    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(|host| format!("http://{}", host))
        .unwrap_or_default()
}
