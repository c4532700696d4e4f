//! 请求参数
//! 查询串与表单的 DTO

use serde::Deserialize;
use validator::Validate;

/// 作业列表查询参数
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JobListQuery {
    pub start_job: Option<usize>,
    #[validate(range(min = 1, max = 1000))]
    pub page_size: Option<usize>,
}

/// 作业详情查询参数
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailsQuery {
    pub start_job_instance: Option<usize>,
    #[validate(range(min = 1, max = 1000))]
    pub page_size: Option<usize>,
}

/// 启动请求的查询参数
#[derive(Debug, Default, Deserialize)]
pub struct LaunchQuery {
    /// 为 "job" 时重新渲染详情页，否则渲染执行视图
    pub origin: Option<String>,
}

impl LaunchQuery {
    pub fn origin(&self) -> &str {
        self.origin.as_deref().unwrap_or("execution")
    }
}

/// 启动表单
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    /// properties 格式的参数串，例如 `a=1,b(long)=2`
    pub job_parameters: Option<String>,
}
