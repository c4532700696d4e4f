//! 批处理领域模型
//! 作业参数、作业实例与作业执行

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 日期参数的文本格式
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// 单个带类型的作业参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum JobParameter {
    String(String),
    Long(i64),
    Double(f64),
    Date(NaiveDate),
}

impl JobParameter {
    /// 参数类型名，与 `name(type)=value` 写法中的 type 一致
    pub fn type_name(&self) -> &'static str {
        match self {
            JobParameter::String(_) => "string",
            JobParameter::Long(_) => "long",
            JobParameter::Double(_) => "double",
            JobParameter::Date(_) => "date",
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            JobParameter::Long(value) => Some(*value),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobParameter::String(value) => write!(f, "{}", value),
            JobParameter::Long(value) => write!(f, "{}", value),
            JobParameter::Double(value) => write!(f, "{}", value),
            JobParameter::Date(value) => write!(f, "{}", value.format(DATE_FORMAT)),
        }
    }
}

/// 作业参数集合，按参数名排序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParameters(BTreeMap<String, JobParameter>);

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: JobParameter) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: JobParameter) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&JobParameter> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JobParameter)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl std::fmt::Display for JobParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}

/// 作业执行状态
///
/// 变体声明顺序即状态的严重程度顺序，`PartialOrd` 依赖这一点。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Completed,
    Starting,
    Started,
    Stopping,
    Stopped,
    Failed,
    Abandoned,
    Unknown,
}

impl BatchStatus {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            BatchStatus::Starting | BatchStatus::Started | BatchStatus::Stopping
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Completed => write!(f, "COMPLETED"),
            BatchStatus::Starting => write!(f, "STARTING"),
            BatchStatus::Started => write!(f, "STARTED"),
            BatchStatus::Stopping => write!(f, "STOPPING"),
            BatchStatus::Stopped => write!(f, "STOPPED"),
            BatchStatus::Failed => write!(f, "FAILED"),
            BatchStatus::Abandoned => write!(f, "ABANDONED"),
            BatchStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// 作业实例：作业名 + 一组参数确定的一次逻辑运行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: u64,
    pub job_name: String,
    pub job_parameters: JobParameters,
}

/// 作业执行：对某个作业实例的一次实际尝试
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: u64,
    pub instance_id: u64,
    pub job_name: String,
    pub job_parameters: JobParameters,
    pub status: BatchStatus,
    pub exit_code: String,
    pub exit_description: String,
    pub create_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl JobExecution {
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }
}

/// 注册到作业服务中的作业定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    /// 同一参数的实例失败后能否再次执行
    #[serde(default = "default_restartable")]
    pub restartable: bool,
    /// 是否支持自动递增 run.id 生成新参数
    #[serde(default)]
    pub incrementable: bool,
    #[serde(default)]
    pub required_keys: Vec<String>,
    /// 为空表示不限制可选参数
    #[serde(default)]
    pub optional_keys: Vec<String>,
}

fn default_restartable() -> bool {
    true
}

impl JobDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            restartable: true,
            incrementable: false,
            required_keys: Vec::new(),
            optional_keys: Vec::new(),
        }
    }

    pub fn restartable(mut self, restartable: bool) -> Self {
        self.restartable = restartable;
        self
    }

    pub fn incrementable(mut self, incrementable: bool) -> Self {
        self.incrementable = incrementable;
        self
    }

    pub fn required_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn optional_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// 按必填/可选键校验参数，返回第一条违规描述
    pub fn validate(&self, parameters: &JobParameters) -> Result<(), String> {
        if let Some(missing) = self
            .required_keys
            .iter()
            .find(|key| !parameters.contains(key))
        {
            return Err(format!("missing required key '{}'", missing));
        }

        if !self.optional_keys.is_empty() {
            if let Some(unexpected) = parameters.keys().find(|key| {
                !self.required_keys.contains(key) && !self.optional_keys.contains(key)
            }) {
                return Err(format!("unexpected key '{}'", unexpected));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(BatchStatus::Stopped > BatchStatus::Stopping);
        assert!(BatchStatus::Failed < BatchStatus::Abandoned);
        assert!(BatchStatus::Started.is_running());
        assert!(!BatchStatus::Completed.is_running());
    }

    #[test]
    fn test_parameter_display() {
        let date = NaiveDate::from_ymd_opt(2010, 3, 7).unwrap();
        assert_eq!(JobParameter::Date(date).to_string(), "2010/03/07");
        assert_eq!(JobParameter::Long(42).to_string(), "42");

        let params = JobParameters::new()
            .with("b", JobParameter::Long(2))
            .with("a", JobParameter::String("x".into()));
        assert_eq!(params.to_string(), "{a=x, b=2}");
    }

    #[test]
    fn test_definition_validation() {
        let definition = JobDefinition::new("import")
            .required_keys(["input.file"])
            .optional_keys(["chunk.size"]);

        let ok = JobParameters::new().with("input.file", JobParameter::String("a.csv".into()));
        assert!(definition.validate(&ok).is_ok());

        let missing = JobParameters::new();
        assert!(definition.validate(&missing).unwrap_err().contains("input.file"));

        let unexpected = ok.clone().with("colour", JobParameter::String("red".into()));
        assert!(definition.validate(&unexpected).unwrap_err().contains("colour"));
    }

    #[test]
    fn test_definition_without_optional_keys_accepts_anything() {
        let definition = JobDefinition::new("import");
        let params = JobParameters::new().with("anything", JobParameter::Long(1));
        assert!(definition.validate(&params).is_ok());
    }
}
