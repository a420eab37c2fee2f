//! 路由配置 - 按事件类别选择 webhook 端点
//!
//! 配置文件是一个以类别为键的 JSON 文档，保留键 "alarm" 和 "event"
//! 分别是无类别告警和普通事件的默认路由，其余键为具名告警类别。
//! 配置惰性热加载：仅当上次成功加载早于各调用路径的 staleness 阈值
//! 时才重新读取文件（告警路径 10s，事件路径 60s）。加载失败保留
//! 已知良好的配置，绝不清空。

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 端点短于该长度视为占位符，路由不可用
const MIN_ROUTE_URL_LEN: usize = 6;

/// 默认告警路径 staleness 阈值（告警对路由变更更敏感）
pub const DEFAULT_ALARM_STALENESS: Duration = Duration::from_secs(10);
/// 默认事件路径 staleness 阈值
pub const DEFAULT_EVENT_STALENESS: Duration = Duration::from_secs(60);

/// 单条路由配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub channel: Option<String>,
}

impl Route {
    /// active 且端点长度达标才可用
    pub fn is_usable(&self) -> bool {
        self.active && self.url.len() >= MIN_ROUTE_URL_LEN
    }
}

/// resolve 的结果：投递端点 + 可选的 channel 覆盖
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub url: String,
    pub channel: Option<String>,
}

#[derive(Debug, Default)]
struct RouteTable {
    alarm: Route,
    event: Route,
    categories: HashMap<String, Route>,
}

struct RoutingState {
    table: RouteTable,
    /// 上次加载尝试时间（无论成败），防止失败后每次调用都重读
    last_attempt: Option<Instant>,
}

/// 路由配置持有者，内部互斥锁保护缓存状态
pub struct RoutingConfig {
    path: PathBuf,
    alarm_staleness: Duration,
    event_staleness: Duration,
    state: Mutex<RoutingState>,
}

impl RoutingConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_staleness(path, DEFAULT_ALARM_STALENESS, DEFAULT_EVENT_STALENESS)
    }

    pub fn with_staleness(
        path: impl Into<PathBuf>,
        alarm_staleness: Duration,
        event_staleness: Duration,
    ) -> Self {
        Self {
            path: path.into(),
            alarm_staleness,
            event_staleness,
            state: Mutex::new(RoutingState {
                table: RouteTable::default(),
                last_attempt: None,
            }),
        }
    }

    /// 解析事件应投递到的路由
    ///
    /// 非空类别的告警优先匹配具名类别路由；无类别告警用默认 alarm
    /// 路由；非告警事件用默认 event 路由。路由不可用返回 `None`。
    pub fn resolve(&self, category: &str, is_alarm: bool) -> Option<ResolvedRoute> {
        let staleness = if is_alarm {
            self.alarm_staleness
        } else {
            self.event_staleness
        };

        let mut state = self.state.lock().unwrap();
        self.refresh_if_stale(&mut state, staleness);

        let route = if !is_alarm {
            &state.table.event
        } else if !category.is_empty() {
            // 具名类别未配置或不可用时直接丢弃，不回退默认告警路由
            state.table.categories.get(category)?
        } else {
            &state.table.alarm
        };

        if !route.is_usable() {
            return None;
        }
        Some(ResolvedRoute {
            url: route.url.clone(),
            channel: route.channel.clone(),
        })
    }

    /// 强制检查点：锁内 check-and-refresh，避免并发重复加载
    fn refresh_if_stale(&self, state: &mut RoutingState, staleness: Duration) {
        let stale = match state.last_attempt {
            None => true,
            Some(at) => at.elapsed() > staleness,
        };
        if !stale {
            return;
        }
        state.last_attempt = Some(Instant::now());

        match self.load_table() {
            Ok(table) => {
                debug!(
                    alarm_active = table.alarm.active,
                    event_active = table.event.active,
                    categories = table.categories.len(),
                    "routing config loaded"
                );
                state.table = table;
            }
            Err(e) => {
                // 保留旧配置，下个 staleness 窗口后重试
                warn!(path = %self.path.display(), error = %e, "fail to reload routing config, keep previous");
            }
        }
    }

    fn load_table(&self) -> Result<RouteTable> {
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read routing config {}", self.path.display()))?;
        let mut raw: HashMap<String, Route> =
            serde_json::from_str(&data).context("parse routing config json")?;

        let alarm = raw
            .remove("alarm")
            .context("alarm route is not found in routing config")?;
        let event = raw
            .remove("event")
            .context("event route is not found in routing config")?;

        Ok(RouteTable {
            alarm,
            event,
            categories: raw,
        })
    }

    /// 当前缓存的类别列表（诊断用）
    pub fn category_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state.table.categories.keys().cloned().collect();
        names.sort();
        names
    }
}
