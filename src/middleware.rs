//! HTTP 中间件
//! 应用状态与请求追踪

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::FixedOffset;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::Result;
use crate::services::{DefaultJobParametersConverter, JobParametersConverter, JobService};
use crate::views::Renderer;

/// 应用状态
///
/// 作业服务与参数转换器以 trait 对象注入，测试中可替换实现。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub job_service: Arc<dyn JobService>,
    pub converter: Arc<dyn JobParametersConverter>,
    pub renderer: Arc<Renderer>,
    /// 展示时间使用的时区
    pub time_zone: FixedOffset,
}

impl AppState {
    pub fn new(config: AppConfig, job_service: Arc<dyn JobService>) -> Result<Self> {
        let renderer = Renderer::new(
            config.console.servlet_path.clone(),
            config.message_catalogue(),
        )?;
        let time_zone = config.console.time_zone()?;

        Ok(Self {
            config,
            job_service,
            converter: Arc::new(DefaultJobParametersConverter),
            renderer: Arc::new(renderer),
            time_zone,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "HEAD" => "HEAD",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            400 => "400",
            404 => "404",
            405 => "405",
            406 => "406",
            413 => "413",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_taken_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", HeaderValue::from_static("abc-123"));
        assert_eq!(extract_or_generate_trace_id(&headers), "abc-123");
    }

    #[test]
    fn test_trace_id_generated_when_missing() {
        let headers = HeaderMap::new();
        let trace_id = extract_or_generate_trace_id(&headers);
        assert!(Uuid::parse_str(&trace_id).is_ok());
    }
}
