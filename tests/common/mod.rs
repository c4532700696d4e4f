//! 测试公共模块
//! 提供测试配置、应用状态与请求辅助函数

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use batch_admin::{
    config::{AppConfig, ConsoleConfig, JobConfig, LoggingConfig, ServerConfig},
    middleware::AppState,
    models::job::JobExecution,
    routes,
    services::InMemoryJobService,
};
use http_body_util::BodyExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn job(name: &str) -> JobConfig {
    JobConfig {
        name: name.to_string(),
        restartable: true,
        incrementable: false,
        required_keys: Vec::new(),
        optional_keys: Vec::new(),
        simulated_duration_ms: 0,
    }
}

/// 创建测试配置
///
/// 注册的作业：
/// - `payroll`：立即完成
/// - `nightly`：可递增
/// - `import`：不可重启，必须提供 `input`
/// - `slow`：运行十分钟，用于观察运行中状态
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
            max_body_bytes: 16 * 1024,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        console: ConsoleConfig {
            servlet_path: "/batch".to_string(),
            base_url: None,
            time_zone_offset: "+00:00".to_string(),
            default_page_size: 20,
            extensions: vec![".html".to_string(), ".json".to_string(), ".rss".to_string()],
        },
        jobs: vec![
            job("payroll"),
            JobConfig {
                incrementable: true,
                ..job("nightly")
            },
            JobConfig {
                restartable: false,
                required_keys: vec!["input".to_string()],
                ..job("import")
            },
            JobConfig {
                simulated_duration_ms: 600_000,
                ..job("slow")
            },
        ],
        resources: Vec::new(),
        messages: BTreeMap::new(),
    }
}

/// 测试应用：路由 + 可直接查询的作业服务
pub struct TestApp {
    pub router: Router,
    pub service: Arc<InMemoryJobService>,
}

pub fn create_test_app_with(config: AppConfig) -> TestApp {
    let service = Arc::new(InMemoryJobService::from_config(&config.jobs));
    let state = AppState::new(config, service.clone()).expect("Failed to create app state");
    TestApp {
        router: routes::create_router(Arc::new(state)),
        service,
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(create_test_config())
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::HOST, "localhost:8080")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        read(response).await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, body) = self.get(uri).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        read(response).await
    }

    pub async fn post_form_json(&self, uri: &str, form: &str) -> (StatusCode, serde_json::Value) {
        let (status, body) = self.post_form(uri, form).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    /// 轮询直到执行结束
    pub async fn finished(&self, execution_id: u64) -> JobExecution {
        for _ in 0..200 {
            if let Some(execution) = self.service.job_execution(execution_id).await {
                if !execution.is_running() {
                    return execution;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {} did not finish", execution_id);
    }
}

async fn read(response: axum::response::Response) -> (StatusCode, String) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
