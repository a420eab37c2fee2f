//! 通知链 - 管理多个 sink 并按序分发事件

use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::event::Event;

/// 通知 sink trait
///
/// 实现必须可并发调用；投递是 best-effort，错误只向上返回用于
/// 日志，不会中断分发。
pub trait Notifier: Send + Sync {
    /// sink 名称（日志与配置用）
    fn name(&self) -> &str;

    /// 渲染并投递一个已接受的事件
    fn notify(&self, event: &Event) -> Result<()>;
}

/// 已知的 sink 种类，按配置名实例化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Slack,
}

impl SinkKind {
    /// 大小写不敏感的名称匹配
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "slack" => Some(SinkKind::Slack),
            _ => None,
        }
    }

    /// 解析逗号分隔的链配置；`None` 时安装单个默认 sink
    pub fn parse_chain(names: Option<&str>) -> Vec<SinkKind> {
        let Some(names) = names else {
            return vec![SinkKind::Slack];
        };

        let mut kinds = Vec::new();
        for name in names.split(',') {
            if name.trim().is_empty() {
                continue;
            }
            match SinkKind::from_name(name) {
                Some(kind) => kinds.push(kind),
                None => warn!(name = name.trim(), "unknown notifier name, skipped"),
            }
        }
        kinds
    }
}

/// 有序、构造后不可变的 sink 集合
///
/// 分发方独占所有权；同一事件按构造顺序调用每个 sink，
/// 不同事件之间没有全局顺序保证。
pub struct NotifyChain {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifyChain {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        for n in &notifiers {
            info!(notifier = n.name(), "load notify chain");
        }
        Self { notifiers }
    }

    /// 按配置的 sink 种类构造链，顺序即配置顺序
    pub fn from_kinds(
        kinds: &[SinkKind],
        routing: Arc<crate::routing::RoutingConfig>,
        deploy_link_template: Option<String>,
    ) -> Result<Self> {
        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            match kind {
                SinkKind::Slack => {
                    let sink = crate::notify::slack::SlackNotifier::new(
                        routing.clone(),
                        deploy_link_template.clone(),
                    )?;
                    notifiers.push(Arc::new(sink));
                }
            }
        }
        Ok(Self::new(notifiers))
    }

    /// 按序调用每个 sink；失败或 panic 的 sink 不影响后续 sink
    pub fn dispatch(&self, event: &Event) {
        for notifier in &self.notifiers {
            let outcome = catch_unwind(AssertUnwindSafe(|| notifier.notify(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(notifier = notifier.name(), error = %e, "notifier failed");
                }
                Err(_) => {
                    error!(notifier = notifier.name(), "notifier panicked");
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn notifier_names(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }
}
