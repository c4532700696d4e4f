//! 作业服务契约
//! 控制器只通过这个接口访问批处理框架

use async_trait::async_trait;

use crate::error::JobServiceError;
use crate::models::job::{JobExecution, JobInstance, JobParameters};

pub type JobServiceResult<T> = std::result::Result<T, JobServiceError>;

/// 作业服务
///
/// 列表类操作的 `start` 为从 0 开始的偏移，`count` 为最多返回的条数。
#[async_trait]
pub trait JobService: Send + Sync {
    /// 以给定参数启动一次作业执行
    async fn launch(&self, job_name: &str, parameters: JobParameters)
        -> JobServiceResult<JobExecution>;

    /// 按名称排序的作业名
    async fn list_jobs(&self, start: usize, count: usize) -> Vec<String>;

    async fn count_jobs(&self) -> usize;

    /// 某作业的实例，从新到旧
    async fn list_job_instances(
        &self,
        job_name: &str,
        start: usize,
        count: usize,
    ) -> JobServiceResult<Vec<JobInstance>>;

    async fn count_job_instances(&self, job_name: &str) -> JobServiceResult<usize>;

    /// 某实例的全部执行，从新到旧
    async fn get_job_executions_for_job_instance(
        &self,
        job_name: &str,
        instance_id: u64,
    ) -> JobServiceResult<Vec<JobExecution>>;

    async fn count_job_executions_for_job(&self, job_name: &str) -> JobServiceResult<usize>;

    async fn is_launchable(&self, job_name: &str) -> bool;

    async fn is_incrementable(&self, job_name: &str) -> bool;
}
