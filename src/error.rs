//! 统一错误模型
//! 传输层错误（AppError）与作业服务错误（JobServiceError）

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误类型
///
/// 只用于请求本身无法处理的情况；作业服务返回的业务错误
/// 会被转换为视图中的 rejection，不走这里。
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::Config(_) | AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取用户友好的错误消息（不包含内部细节）
    pub fn user_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::NotAcceptable(msg) => format!("No view available for {}", msg),
            AppError::Render(_) => "Failed to render view".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
            },
        };

        tracing::error!(
            code = self.code(),
            message = %self,
            request_id = %error_response.error.request_id,
            "Application error"
        );

        (status, Json(error_response)).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<tera::Error> for AppError {
    fn from(e: tera::Error) -> Self {
        // tera 的 Display 只给出顶层消息，把 source 链拼上便于排查
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        AppError::Render(message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Render(e.to_string())
    }
}

/// 作业服务错误
///
/// 每种失败都对应一个稳定的错误码，控制器据此生成用户可见的拒绝消息。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobServiceError {
    #[error("No such job: {0}")]
    NoSuchJob(String),

    #[error("A job execution for this job is already running: {0}")]
    JobExecutionAlreadyRunning(String),

    #[error("Job could not be restarted: {0}")]
    JobRestart(String),

    #[error("Job instance already complete: {0}")]
    JobInstanceAlreadyComplete(String),

    #[error("Job parameters invalid: {0}")]
    JobParametersInvalid(String),
}

impl JobServiceError {
    /// 拒绝消息的错误码
    pub fn code(&self) -> &'static str {
        match self {
            JobServiceError::NoSuchJob(_) => "no.such.job",
            JobServiceError::JobExecutionAlreadyRunning(_) => "job.already.running",
            JobServiceError::JobRestart(_) => "job.could.not.restart",
            JobServiceError::JobInstanceAlreadyComplete(_) => "job.already.complete",
            JobServiceError::JobParametersInvalid(_) => "job.parameters.invalid",
        }
    }

    /// 启动作业失败时展示给用户的默认消息
    pub fn default_message(&self, job_name: &str) -> String {
        match self {
            JobServiceError::NoSuchJob(_) => format!("No such job: {}", job_name),
            JobServiceError::JobExecutionAlreadyRunning(_) => {
                "A job with this name and parameters is already running.".to_string()
            }
            JobServiceError::JobRestart(_) => "The job was not able to restart.".to_string(),
            JobServiceError::JobInstanceAlreadyComplete(_) => {
                "A job with this name and parameters already completed successfully.".to_string()
            }
            JobServiceError::JobParametersInvalid(_) => {
                "The job parameters are invalid according to the configuration.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::BadRequest("test".to_string()).code(), 400);
        assert_eq!(AppError::Validation("test".to_string()).code(), 400);
        assert_eq!(AppError::NotAcceptable("jobs/job.rss".to_string()).code(), 406);
        assert_eq!(AppError::Render("boom".to_string()).code(), 500);
    }

    #[test]
    fn test_user_message_no_internal_detail() {
        let error = AppError::Render("template 'jobs.html' failed at line 3".to_string());
        let message = error.user_message();
        assert_eq!(message, "Failed to render view");
        assert!(!message.contains("jobs.html"));
    }

    #[test]
    fn test_job_service_error_codes() {
        let cases = [
            (JobServiceError::NoSuchJob("a".into()), "no.such.job"),
            (JobServiceError::JobExecutionAlreadyRunning("a".into()), "job.already.running"),
            (JobServiceError::JobRestart("a".into()), "job.could.not.restart"),
            (JobServiceError::JobInstanceAlreadyComplete("a".into()), "job.already.complete"),
            (JobServiceError::JobParametersInvalid("a".into()), "job.parameters.invalid"),
        ];
        for (error, code) in cases {
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn test_no_such_job_message_names_the_job() {
        let error = JobServiceError::NoSuchJob("payroll".into());
        assert_eq!(error.default_message("payroll"), "No such job: payroll");
    }
}
