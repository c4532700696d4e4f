//! 视图模型
//! 对领域对象的只读包装，只负责展示格式

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::{BatchStatus, JobExecution, JobInstance};

/// 作业列表中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: String,
    pub execution_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_instance_id: Option<u64>,
    pub launchable: bool,
    pub incrementable: bool,
}

impl JobInfo {
    pub fn new(name: impl Into<String>, execution_count: usize) -> Self {
        Self {
            name: name.into(),
            execution_count,
            job_instance_id: None,
            launchable: false,
            incrementable: false,
        }
    }

    pub fn with_flags(mut self, launchable: bool, incrementable: bool) -> Self {
        self.launchable = launchable;
        self.incrementable = incrementable;
        self
    }
}

/// 一次作业执行的展示形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionInfo {
    pub id: u64,
    pub instance_id: u64,
    pub job_name: String,
    pub status: BatchStatus,
    pub exit_code: String,
    pub exit_description: String,
    /// 用户时区下的开始日期，YYYY-MM-DD
    pub start_date: String,
    /// 用户时区下的开始时间，HH:MM:SS
    pub start_time: String,
    /// HH:MM:SS；运行中按当前时间计算
    pub duration: String,
    pub job_parameters: String,
    pub restartable: bool,
    pub stoppable: bool,
    pub abandonable: bool,
}

impl JobExecutionInfo {
    pub fn new(execution: &JobExecution, time_zone: FixedOffset) -> Self {
        Self::at(execution, time_zone, Utc::now())
    }

    /// 以给定的"当前时间"构造，便于测试运行中执行的耗时
    pub fn at(execution: &JobExecution, time_zone: FixedOffset, now: DateTime<Utc>) -> Self {
        let status = execution.status;
        let (start_date, start_time, duration) = match execution.start_time {
            Some(started) => {
                let local = started.with_timezone(&time_zone);
                let finished = execution.end_time.unwrap_or(now);
                (
                    local.format("%Y-%m-%d").to_string(),
                    local.format("%H:%M:%S").to_string(),
                    format_duration(finished - started),
                )
            }
            None => (String::new(), String::new(), String::new()),
        };

        Self {
            id: execution.id,
            instance_id: execution.instance_id,
            job_name: execution.job_name.clone(),
            status,
            exit_code: execution.exit_code.clone(),
            exit_description: execution.exit_description.clone(),
            start_date,
            start_time,
            duration,
            job_parameters: execution.job_parameters.to_string(),
            restartable: matches!(status, BatchStatus::Stopped | BatchStatus::Failed),
            stoppable: matches!(status, BatchStatus::Starting | BatchStatus::Started),
            abandonable: matches!(
                status,
                BatchStatus::Stopped | BatchStatus::Failed | BatchStatus::Unknown
            ),
        }
    }
}

fn format_duration(elapsed: Duration) -> String {
    let seconds = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// 作业实例及其全部执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInstanceInfo {
    pub id: u64,
    pub job_name: String,
    pub job_parameters: String,
    pub executions: Vec<JobExecutionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<BatchStatus>,
}

impl JobInstanceInfo {
    /// `executions` 需按从新到旧排列
    pub fn new(
        instance: &JobInstance,
        executions: &[JobExecution],
        time_zone: FixedOffset,
    ) -> Self {
        Self {
            id: instance.id,
            job_name: instance.job_name.clone(),
            job_parameters: instance.job_parameters.to_string(),
            last_status: executions.first().map(|execution| execution.status),
            executions: executions
                .iter()
                .map(|execution| JobExecutionInfo::new(execution, time_zone))
                .collect(),
        }
    }
}

/// 控制台首页列出的一个资源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl ResourceInfo {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 去掉最后一段路径上的扩展名，如 `/jobs/{jobName}.json` -> `/jobs/{jobName}`
    pub fn bare_url(&self) -> &str {
        let segment_start = self.url.rfind('/').map_or(0, |index| index + 1);
        match self.url[segment_start..].rfind('.') {
            Some(dot) => &self.url[..segment_start + dot],
            None => &self.url,
        }
    }

    /// 在资源目录与消息目录中使用的键；非 GET 资源带上方法前缀
    pub fn key(&self) -> String {
        if self.method.eq_ignore_ascii_case("GET") {
            self.bare_url().to_string()
        } else {
            format!("{} {}", self.method.to_uppercase(), self.bare_url())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{JobParameter, JobParameters};
    use chrono::TimeZone;

    fn execution(status: BatchStatus) -> JobExecution {
        let start = Utc.with_ymd_and_hms(2010, 3, 7, 23, 30, 0).unwrap();
        JobExecution {
            id: 7,
            instance_id: 3,
            job_name: "payroll".to_string(),
            job_parameters: JobParameters::new().with("run.id", JobParameter::Long(2)),
            status,
            exit_code: status.to_string(),
            exit_description: String::new(),
            create_time: start,
            start_time: Some(start),
            end_time: Some(start + Duration::seconds(3725)),
        }
    }

    #[test]
    fn test_execution_info_uses_time_zone() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let info = JobExecutionInfo::new(&execution(BatchStatus::Completed), offset);
        assert_eq!(info.start_date, "2010-03-08");
        assert_eq!(info.start_time, "01:30:00");
        assert_eq!(info.duration, "01:02:05");
        assert_eq!(info.job_parameters, "{run.id=2}");
    }

    #[test]
    fn test_running_execution_duration_uses_now() {
        let mut running = execution(BatchStatus::Started);
        running.end_time = None;
        let now = running.start_time.unwrap() + Duration::seconds(90);
        let info = JobExecutionInfo::at(&running, FixedOffset::east_opt(0).unwrap(), now);
        assert_eq!(info.duration, "00:01:30");
        assert!(info.stoppable);
        assert!(!info.restartable);
    }

    #[test]
    fn test_execution_flags() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let failed = JobExecutionInfo::new(&execution(BatchStatus::Failed), utc);
        assert!(failed.restartable && failed.abandonable && !failed.stoppable);

        let done = JobExecutionInfo::new(&execution(BatchStatus::Completed), utc);
        assert!(!done.restartable && !done.abandonable && !done.stoppable);
    }

    #[test]
    fn test_not_started_execution_has_blank_times() {
        let mut pending = execution(BatchStatus::Starting);
        pending.start_time = None;
        pending.end_time = None;
        let info = JobExecutionInfo::new(&pending, FixedOffset::east_opt(0).unwrap());
        assert!(info.start_date.is_empty());
        assert!(info.duration.is_empty());
    }

    #[test]
    fn test_resource_keys() {
        let get = ResourceInfo::new("/jobs/{jobName}.json", "GET");
        assert_eq!(get.bare_url(), "/jobs/{jobName}");
        assert_eq!(get.key(), "/jobs/{jobName}");

        let post = ResourceInfo::new("/jobs/{jobName}.json", "post");
        assert_eq!(post.key(), "POST /jobs/{jobName}");

        let plain = ResourceInfo::new("/local", "GET");
        assert_eq!(plain.bare_url(), "/local");
    }
}
