//! 事件分发管线 - classify → dedup → notify
//!
//! 每个入站请求由独立的并发任务调用 [`EventRelay::consume`]，
//! 因此 dedup 检查与链分发都必须可并发调用。

use std::sync::Arc;
use tracing::{debug, info};

use crate::dedup::{now_millis, DedupCache};
use crate::event::{EventEnvelope, LOGIC_MEASURE};
use crate::notify::NotifyChain;

/// 一个已装配的事件消费者：去重缓存 + 通知链
pub struct EventRelay {
    dedup: DedupCache,
    chain: NotifyChain,
    /// 这些进程产生的事件直接丢弃
    ignored_processes: Vec<String>,
}

impl EventRelay {
    pub fn new(dedup: DedupCache, chain: NotifyChain, ignored_processes: Vec<String>) -> Self {
        Self {
            dedup,
            chain,
            ignored_processes,
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 消费一条总线消息；所有分支都不返回错误（丢弃即终态）
    pub fn consume(&self, envelope: &EventEnvelope) {
        let body = &envelope.body;
        debug!(
            logic = envelope.header.logic,
            group = %body.package_group,
            host = %body.package_host,
            name = %body.package_name,
            process = %body.package_process,
            profile = %body.package_profile,
            "bus message received"
        );

        if envelope.header.logic == LOGIC_MEASURE {
            return;
        }

        if self.is_ignored(body.package_process.as_str()) {
            debug!(process = %body.package_process, "ignored process, drop");
            return;
        }

        if self.dedup.check_and_record(&body.fingerprint(), now_millis()) {
            return;
        }

        info!(
            process = %body.package_process,
            is_alarm = body.is_alarm(),
            category = body.category(),
            message = body.message_text(),
            "dispatch event"
        );
        self.chain.dispatch(body);
    }

    fn is_ignored(&self, process: &str) -> bool {
        self.ignored_processes.iter().any(|p| p == process)
    }
}
