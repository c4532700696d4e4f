//! 配置系统
//! 默认值 -> 可选配置文件 -> 环境变量（前缀 BATCH_ADMIN_）

use chrono::FixedOffset;
use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

use crate::models::job::JobDefinition;
use crate::models::view::ResourceInfo;

/// 指向配置文件的环境变量
pub const CONFIG_FILE_ENV: &str = "BATCH_ADMIN_CONFIG";

static JOB_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+$").expect("job name pattern is a valid regex")
});

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:8080"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
    /// 请求体大小上限（字节）
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// 控制台挂载路径，例如 "/batch"；为空表示挂在根路径
    pub servlet_path: String,
    /// 生成绝对地址时使用的前缀；未设置则取请求的 Host 头
    #[serde(default)]
    pub base_url: Option<String>,
    /// 展示时间使用的 UTC 偏移，例如 "+08:00"
    pub time_zone_offset: String,
    pub default_page_size: usize,
    /// 请求路径上可以附加的扩展名，按顺序匹配
    pub extensions: Vec<String>,
}

impl ConsoleConfig {
    pub fn time_zone(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.time_zone_offset).ok_or_else(|| {
            ConfigError::Message(format!(
                "Invalid time_zone_offset: {}. Expected +HH:MM or -HH:MM",
                self.time_zone_offset
            ))
        })
    }
}

/// 配置文件中的作业
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub restartable: bool,
    #[serde(default)]
    pub incrementable: bool,
    #[serde(default)]
    pub required_keys: Vec<String>,
    #[serde(default)]
    pub optional_keys: Vec<String>,
    /// 作业体模拟运行的时长，0 表示立即完成
    #[serde(default)]
    pub simulated_duration_ms: u64,
}

fn default_true() -> bool {
    true
}

impl JobConfig {
    pub fn definition(&self) -> JobDefinition {
        JobDefinition::new(self.name.clone())
            .restartable(self.restartable)
            .incrementable(self.incrementable)
            .required_keys(self.required_keys.iter().cloned())
            .optional_keys(self.optional_keys.iter().cloned())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub console: ConsoleConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
    /// 首页资源目录；为空时使用内置目录
    #[serde(default)]
    pub resources: Vec<ResourceInfo>,
    /// 资源描述，覆盖内置描述
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

impl AppConfig {
    /// 从配置文件（可选）与环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .set_default("server.addr", "0.0.0.0:8080")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("server.max_body_bytes", 64 * 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("console.servlet_path", "/batch")?
            .set_default("console.time_zone_offset", "+00:00")?
            .set_default("console.default_page_size", 20)?
            .set_default("console.extensions", vec![".html", ".json", ".rss"])?;

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            settings = settings.add_source(File::with_name(&path).required(true));
        }

        settings = settings.add_source(
            Environment::with_prefix("BATCH_ADMIN")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("console.extensions")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message(
                        "Server port should be >= 1024".to_string(),
                    ));
                }
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        let servlet_path = &self.console.servlet_path;
        if !servlet_path.is_empty()
            && (!servlet_path.starts_with('/') || servlet_path.ends_with('/'))
        {
            return Err(ConfigError::Message(format!(
                "Invalid servlet_path: {}. Must be empty or start with '/' without a trailing '/'",
                servlet_path
            )));
        }

        self.console.time_zone()?;

        if self.console.default_page_size == 0 || self.console.default_page_size > 1000 {
            return Err(ConfigError::Message(
                "default_page_size must be between 1 and 1000".to_string(),
            ));
        }

        if let Some(extension) = self
            .console
            .extensions
            .iter()
            .find(|e| !e.starts_with('.') || e.len() < 2)
        {
            return Err(ConfigError::Message(format!(
                "Invalid extension: {}. Extensions must start with '.'",
                extension
            )));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !JOB_NAME_PATTERN.is_match(&job.name) {
                return Err(ConfigError::Message(format!(
                    "Invalid job name: {}. Allowed characters: letters, digits, '_', '.', '-'",
                    job.name
                )));
            }
            if !seen.insert(job.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Duplicate job name: {}",
                    job.name
                )));
            }
        }

        Ok(())
    }

    /// 首页资源目录
    pub fn resource_catalogue(&self) -> Vec<ResourceInfo> {
        if self.resources.is_empty() {
            default_resources()
        } else {
            self.resources.clone()
        }
    }

    /// 资源描述目录：内置描述被配置覆盖
    pub fn message_catalogue(&self) -> BTreeMap<String, String> {
        let mut messages = default_messages();
        messages.extend(self.messages.clone());
        messages
    }
}

/// 解析 `+HH:MM` / `-HH:MM` / `+HH` / `Z`
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    // chrono 要求给出分钟
    if value.len() == 3 {
        return format!("{}:00", value).parse().ok();
    }
    value.parse().ok()
}

fn default_resources() -> Vec<ResourceInfo> {
    vec![
        ResourceInfo::new("/jobs.json", "GET"),
        ResourceInfo::new("/jobs/{jobName}.json", "GET"),
        ResourceInfo::new("/jobs/{jobName}.json", "POST"),
    ]
}

fn default_messages() -> BTreeMap<String, String> {
    [
        (
            "/jobs",
            "List the jobs known to the application. Paged with startJob and pageSize.",
        ),
        (
            "/jobs/{jobName}",
            "List the instances of one job with their executions. Paged with startJobInstance and pageSize.",
        ),
        (
            "POST /jobs/{jobName}",
            "Launch a job. The form field jobParameters holds key=value pairs.",
        ),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}
