//! 事件去重缓存 - 抑制时间窗口内的重复事件
//!
//! 同一指纹的事件在窗口内只放行第一条，其余全部抑制。
//! 每次命中（无论放行还是抑制）都会刷新时间戳，因此持续高频
//! 到达的重复事件会一直被抑制，直到出现 ≥ 窗口的间隔。
//! 后台 janitor 定期清理过期条目，内存只保留活跃指纹。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// 默认抑制窗口
pub const DEFAULT_SUPPRESS_WINDOW: Duration = Duration::from_millis(3000);
/// 默认 janitor 清理间隔
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// 去重缓存：指纹 -> 最近一次出现的时间戳（毫秒）
///
/// Clone 共享同一底层 map，可安全地从多个并发 ingestion 任务调用。
#[derive(Clone)]
pub struct DedupCache {
    entries: Arc<Mutex<HashMap<String, u64>>>,
    window: Duration,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_SUPPRESS_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 检查指纹是否为窗口内重复，并刷新其时间戳
    ///
    /// 返回 `true` 表示抑制（重复），`false` 表示放行。
    /// 单一临界区覆盖整个 read-modify-write，锁内无 I/O。
    pub fn check_and_record(&self, fingerprint: &str, now_millis: u64) -> bool {
        let window_ms = self.window.as_millis() as u64;
        let mut entries = self.entries.lock().unwrap();

        let suppress = match entries.get(fingerprint) {
            None => false,
            // 窗口已过，视为新一次出现
            Some(&last) if now_millis.saturating_sub(last) > window_ms => false,
            Some(_) => true,
        };

        entries.insert(fingerprint.to_string(), now_millis);
        if suppress {
            // 截断只是为了日志可读；任意指纹都不能 panic
            let short = fingerprint.get(..12).unwrap_or(fingerprint);
            debug!(fingerprint = %short, "suppress redundant event");
        }
        suppress
    }

    /// 清理最近一次出现早于窗口的条目，返回清理数量
    pub fn evict_stale(&self, now_millis: u64) -> usize {
        let window_ms = self.window.as_millis() as u64;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, &mut last| now_millis.saturating_sub(last) <= window_ms);
        before - entries.len()
    }

    /// 启动后台 janitor 任务，定期清理过期条目
    pub fn spawn_janitor(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 首个 tick 立即完成，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.evict_stale(now_millis());
                if removed > 0 {
                    info!(removed, "clear old event entries");
                }
            }
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}
