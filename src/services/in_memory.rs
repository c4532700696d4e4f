//! 内存作业服务
//! 作业注册表 + 内存中的实例/执行记录，作业体在 tokio 任务中运行

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::config::JobConfig;
use crate::error::JobServiceError;
use crate::models::job::{
    BatchStatus, JobDefinition, JobExecution, JobInstance, JobParameter, JobParameters,
};
use crate::services::job_service::{JobService, JobServiceResult};

/// 递增器维护的参数名
pub const RUN_ID_KEY: &str = "run.id";

/// 作业体
#[async_trait]
pub trait Job: Send + Sync {
    async fn execute(&self, parameters: &JobParameters) -> anyhow::Result<()>;
}

/// 立即成功的作业
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopJob;

#[async_trait]
impl Job for NoopJob {
    async fn execute(&self, _parameters: &JobParameters) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 等待固定时长后成功的作业，用于演示运行中状态
#[derive(Debug, Clone, Copy)]
pub struct DelayJob(pub Duration);

#[async_trait]
impl Job for DelayJob {
    async fn execute(&self, _parameters: &JobParameters) -> anyhow::Result<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

struct RegisteredJob {
    definition: JobDefinition,
    job: Arc<dyn Job>,
}

#[derive(Default)]
struct Repository {
    next_instance_id: u64,
    next_execution_id: u64,
    instances: Vec<JobInstance>,
    executions: Vec<JobExecution>,
}

impl Repository {
    fn has_job(&self, job_name: &str) -> bool {
        self.instances.iter().any(|i| i.job_name == job_name)
    }

    fn job_names(&self) -> impl Iterator<Item = &str> {
        self.instances.iter().map(|i| i.job_name.as_str())
    }

    /// 从新到旧
    fn instances_of<'a>(&'a self, job_name: &'a str) -> impl Iterator<Item = &'a JobInstance> {
        self.instances
            .iter()
            .rev()
            .filter(move |i| i.job_name == job_name)
    }

    fn find_instance(&self, job_name: &str, parameters: &JobParameters) -> Option<&JobInstance> {
        self.instances
            .iter()
            .find(|i| i.job_name == job_name && &i.job_parameters == parameters)
    }

    /// 从新到旧
    fn executions_of(&self, instance_id: u64) -> impl Iterator<Item = &JobExecution> {
        self.executions
            .iter()
            .rev()
            .filter(move |e| e.instance_id == instance_id)
    }

    fn create_instance(&mut self, job_name: &str, parameters: JobParameters) -> u64 {
        self.next_instance_id += 1;
        let id = self.next_instance_id;
        self.instances.push(JobInstance {
            id,
            job_name: job_name.to_string(),
            job_parameters: parameters,
        });
        id
    }

    fn create_execution(
        &mut self,
        instance_id: u64,
        job_name: &str,
        parameters: JobParameters,
    ) -> JobExecution {
        self.next_execution_id += 1;
        let execution = JobExecution {
            id: self.next_execution_id,
            instance_id,
            job_name: job_name.to_string(),
            job_parameters: parameters,
            status: BatchStatus::Starting,
            exit_code: "UNKNOWN".to_string(),
            exit_description: String::new(),
            create_time: Utc::now(),
            start_time: None,
            end_time: None,
        };
        self.executions.push(execution.clone());
        execution
    }

    fn update_execution(&mut self, execution_id: u64, update: impl FnOnce(&mut JobExecution)) {
        if let Some(execution) = self.executions.iter_mut().find(|e| e.id == execution_id) {
            update(execution);
        }
    }
}

/// 内存作业服务
///
/// 已注册作业可启动；只存在执行历史的作业名也会被列出，但不可启动。
pub struct InMemoryJobService {
    registry: BTreeMap<String, RegisteredJob>,
    repository: Arc<RwLock<Repository>>,
}

impl Default for InMemoryJobService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobService {
    pub fn new() -> Self {
        Self {
            registry: BTreeMap::new(),
            repository: Arc::new(RwLock::new(Repository::default())),
        }
    }

    /// 按配置注册作业；`simulated_duration_ms` 大于 0 的作业以 [`DelayJob`] 运行
    pub fn from_config(jobs: &[JobConfig]) -> Self {
        jobs.iter().fold(Self::new(), |service, job| {
            let body: Arc<dyn Job> = if job.simulated_duration_ms > 0 {
                Arc::new(DelayJob(Duration::from_millis(job.simulated_duration_ms)))
            } else {
                Arc::new(NoopJob)
            };
            service.with_job(job.definition(), body)
        })
    }

    /// 注册作业；同名注册会覆盖之前的定义
    pub fn with_job(mut self, definition: JobDefinition, job: Arc<dyn Job>) -> Self {
        self.registry
            .insert(definition.name.clone(), RegisteredJob { definition, job });
        self
    }

    pub fn registered_jobs(&self) -> usize {
        self.registry.len()
    }

    /// 按 id 查询执行，主要供轮询执行结果使用
    pub async fn job_execution(&self, execution_id: u64) -> Option<JobExecution> {
        let repository = self.repository.read().await;
        repository
            .executions
            .iter()
            .find(|e| e.id == execution_id)
            .cloned()
    }

    async fn ensure_known(&self, job_name: &str) -> JobServiceResult<()> {
        if self.registry.contains_key(job_name) || self.repository.read().await.has_job(job_name) {
            Ok(())
        } else {
            Err(JobServiceError::NoSuchJob(job_name.to_string()))
        }
    }

    async fn all_job_names(&self) -> BTreeSet<String> {
        let repository = self.repository.read().await;
        self.registry
            .keys()
            .cloned()
            .chain(repository.job_names().map(str::to_string))
            .collect()
    }

    fn spawn_execution(&self, job: Arc<dyn Job>, execution: &JobExecution) {
        let repository = self.repository.clone();
        let execution_id = execution.id;
        let job_name = execution.job_name.clone();
        let parameters = execution.job_parameters.clone();

        tokio::spawn(async move {
            repository.write().await.update_execution(execution_id, |e| {
                e.status = BatchStatus::Started;
                e.start_time = Some(Utc::now());
            });

            let outcome = job.execute(&parameters).await;

            let mut repository = repository.write().await;
            repository.update_execution(execution_id, |e| {
                e.end_time = Some(Utc::now());
                match &outcome {
                    Ok(()) => {
                        e.status = BatchStatus::Completed;
                        e.exit_code = "COMPLETED".to_string();
                    }
                    Err(err) => {
                        e.status = BatchStatus::Failed;
                        e.exit_code = "FAILED".to_string();
                        e.exit_description = format!("{:#}", err);
                    }
                }
            });

            match outcome {
                Ok(()) => info!(job_name = %job_name, execution_id, "Job execution completed"),
                Err(err) => warn!(
                    job_name = %job_name,
                    execution_id,
                    error = %err,
                    "Job execution failed"
                ),
            }
        });
    }
}

/// 基于最近一个实例的 run.id 生成下一组参数
fn next_run_parameters(last: Option<&JobParameters>) -> JobParameters {
    let mut parameters = last.cloned().unwrap_or_default();
    let next = last
        .and_then(|p| p.get(RUN_ID_KEY))
        .and_then(JobParameter::as_long)
        .unwrap_or(0)
        + 1;
    parameters.insert(RUN_ID_KEY, JobParameter::Long(next));
    parameters
}

#[async_trait]
impl JobService for InMemoryJobService {
    #[instrument(skip(self, parameters), fields(parameters = %parameters))]
    async fn launch(
        &self,
        job_name: &str,
        parameters: JobParameters,
    ) -> JobServiceResult<JobExecution> {
        let registered = self
            .registry
            .get(job_name)
            .ok_or_else(|| JobServiceError::NoSuchJob(job_name.to_string()))?;
        let definition = &registered.definition;

        let execution = {
            let mut repository = self.repository.write().await;

            let mut parameters = parameters;
            if definition.incrementable
                && (parameters.is_empty()
                    || repository.find_instance(job_name, &parameters).is_some())
            {
                let last = repository
                    .instances_of(job_name)
                    .next()
                    .map(|i| &i.job_parameters);
                parameters = next_run_parameters(last);
            }

            let existing = repository
                .find_instance(job_name, &parameters)
                .map(|instance| instance.id);

            if let Some(instance_id) = existing {
                if !definition.restartable {
                    return Err(JobServiceError::JobRestart(format!(
                        "job instance {} already exists and is not restartable",
                        instance_id
                    )));
                }
            }

            definition
                .validate(&parameters)
                .map_err(JobServiceError::JobParametersInvalid)?;

            let instance_id = match existing {
                Some(instance_id) => {
                    if let Some(last) = repository.executions_of(instance_id).next() {
                        if last.is_running() {
                            return Err(JobServiceError::JobExecutionAlreadyRunning(format!(
                                "execution {} of instance {} is {}",
                                last.id, instance_id, last.status
                            )));
                        }
                        match last.status {
                            BatchStatus::Completed | BatchStatus::Abandoned => {
                                return Err(JobServiceError::JobInstanceAlreadyComplete(
                                    format!("job instance {} is {}", instance_id, last.status),
                                ));
                            }
                            BatchStatus::Unknown => {
                                return Err(JobServiceError::JobRestart(format!(
                                    "last execution of instance {} has unknown status",
                                    instance_id
                                )));
                            }
                            _ => {}
                        }
                    }
                    instance_id
                }
                None => repository.create_instance(job_name, parameters.clone()),
            };

            repository.create_execution(instance_id, job_name, parameters)
        };

        info!(
            job_name = %job_name,
            execution_id = execution.id,
            instance_id = execution.instance_id,
            "Job execution created"
        );

        self.spawn_execution(registered.job.clone(), &execution);
        Ok(execution)
    }

    async fn list_jobs(&self, start: usize, count: usize) -> Vec<String> {
        self.all_job_names()
            .await
            .into_iter()
            .skip(start)
            .take(count)
            .collect()
    }

    async fn count_jobs(&self) -> usize {
        self.all_job_names().await.len()
    }

    async fn list_job_instances(
        &self,
        job_name: &str,
        start: usize,
        count: usize,
    ) -> JobServiceResult<Vec<JobInstance>> {
        self.ensure_known(job_name).await?;
        let repository = self.repository.read().await;
        Ok(repository
            .instances_of(job_name)
            .skip(start)
            .take(count)
            .cloned()
            .collect())
    }

    async fn count_job_instances(&self, job_name: &str) -> JobServiceResult<usize> {
        self.ensure_known(job_name).await?;
        Ok(self.repository.read().await.instances_of(job_name).count())
    }

    async fn get_job_executions_for_job_instance(
        &self,
        job_name: &str,
        instance_id: u64,
    ) -> JobServiceResult<Vec<JobExecution>> {
        self.ensure_known(job_name).await?;
        let repository = self.repository.read().await;
        Ok(repository
            .executions_of(instance_id)
            .filter(|e| e.job_name == job_name)
            .cloned()
            .collect())
    }

    async fn count_job_executions_for_job(&self, job_name: &str) -> JobServiceResult<usize> {
        self.ensure_known(job_name).await?;
        let repository = self.repository.read().await;
        Ok(repository
            .executions
            .iter()
            .filter(|e| e.job_name == job_name)
            .count())
    }

    async fn is_launchable(&self, job_name: &str) -> bool {
        self.registry.contains_key(job_name)
    }

    async fn is_incrementable(&self, job_name: &str) -> bool {
        self.registry
            .get(job_name)
            .is_some_and(|registered| registered.definition.incrementable)
    }
}
