//! Relay 配置 - 可调参数集中定义
//!
//! 从 JSON 配置文件加载（默认 `~/.config/event-relay/config.json`），
//! 文件不存在时使用内置默认值；字段全部可省略。

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

fn default_suppress_window_ms() -> u64 {
    3000
}

fn default_janitor_interval_secs() -> u64 {
    60
}

fn default_alarm_staleness_secs() -> u64 {
    10
}

fn default_event_staleness_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_application_code() -> i32 {
    1
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("event-relay")
}

fn default_routes_file() -> PathBuf {
    config_dir().join("routes.json")
}

fn default_bus_file() -> PathBuf {
    config_dir().join("mbus.jsonl")
}

/// 全部可调参数；见各字段默认值
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// 抑制窗口（毫秒）
    #[serde(default = "default_suppress_window_ms")]
    pub suppress_window_ms: u64,
    /// janitor 清理间隔（秒）
    #[serde(default = "default_janitor_interval_secs")]
    pub janitor_interval_secs: u64,
    /// 告警路由 staleness 阈值（秒）
    #[serde(default = "default_alarm_staleness_secs")]
    pub alarm_staleness_secs: u64,
    /// 事件路由 staleness 阈值（秒）
    #[serde(default = "default_event_staleness_secs")]
    pub event_staleness_secs: u64,
    /// 部署历史 deep-link 模板（可选），占位符 {host} / {process}
    #[serde(default)]
    pub deploy_link_template: Option<String>,
    /// 逗号分隔的 notifier 链；缺省时安装单个内置 Slack sink
    #[serde(default)]
    pub notify_chain: Option<String>,
    /// 路由配置文件路径
    #[serde(default = "default_routes_file")]
    pub routes_file: PathBuf,
    /// 总线文件路径（JSON lines）
    #[serde(default = "default_bus_file")]
    pub bus_file: PathBuf,
    /// 总线轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 丢弃这些进程产生的事件（运维自身进程等）
    #[serde(default)]
    pub ignored_processes: Vec<String>,
    /// 本实例消费的 application code
    #[serde(default = "default_application_code")]
    pub application_code: i32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            suppress_window_ms: default_suppress_window_ms(),
            janitor_interval_secs: default_janitor_interval_secs(),
            alarm_staleness_secs: default_alarm_staleness_secs(),
            event_staleness_secs: default_event_staleness_secs(),
            deploy_link_template: None,
            notify_chain: None,
            routes_file: default_routes_file(),
            bus_file: default_bus_file(),
            poll_interval_ms: default_poll_interval_ms(),
            ignored_processes: Vec::new(),
            application_code: default_application_code(),
        }
    }
}

impl RelayConfig {
    pub fn default_path() -> PathBuf {
        config_dir().join("config.json")
    }

    /// 加载配置文件；文件不存在返回默认配置，内容损坏返回错误
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: RelayConfig = serde_json::from_str(&data)
            .with_context(|| format!("parse config {}", path.display()))?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn suppress_window(&self) -> Duration {
        Duration::from_millis(self.suppress_window_ms)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    pub fn alarm_staleness(&self) -> Duration {
        Duration::from_secs(self.alarm_staleness_secs)
    }

    pub fn event_staleness(&self) -> Duration {
        Duration::from_secs(self.event_staleness_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
