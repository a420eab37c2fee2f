//! 总线读取器 - 轮询 JSON lines 总线文件并解码事件
//!
//! 传输层唯一的职责是"把解码后的事件交给核心"：按偏移量轮询
//! 追加写入的总线文件，每行一个 EventEnvelope JSON，按 header 的
//! application code 路由到注册的消费者。损坏的行记日志后跳过。

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::event::EventEnvelope;
use crate::relay::EventRelay;

pub struct BusReader {
    path: PathBuf,
    poll_interval: Duration,
    consumers: HashMap<i32, Arc<EventRelay>>,
}

impl BusReader {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            consumers: HashMap::new(),
        }
    }

    /// 注册 application code 对应的消费者
    pub fn register(&mut self, application_code: i32, consumer: Arc<EventRelay>) {
        info!(application_code, "register bus consumer");
        self.consumers.insert(application_code, consumer);
    }

    /// 轮询循环；只在 poll 之间让出，永不因单条消息失败退出
    pub async fn run(self) -> Result<()> {
        info!(path = %self.path.display(), "bus reader started");
        let mut offset = 0u64;
        loop {
            match self.drain_from(offset) {
                Ok(next) => offset = next,
                Err(e) => warn!(error = %e, "bus poll failed"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 消费 offset 之后新增的完整行，返回新的偏移量
    ///
    /// 文件尚不存在时原样返回；文件变短视为轮转，从头重读。
    /// 末尾未以换行结束的半行留到下一轮。
    pub fn drain_from(&self, offset: u64) -> Result<u64> {
        if !self.path.exists() {
            return Ok(offset);
        }

        let mut file =
            File::open(&self.path).with_context(|| format!("open bus file {}", self.path.display()))?;
        let len = file.metadata().context("stat bus file")?.len();
        let mut offset = if len < offset {
            debug!("bus file truncated, rewind to start");
            0
        } else {
            offset
        };

        file.seek(SeekFrom::Start(offset)).context("seek bus file")?;
        let mut buf = String::new();
        file.read_to_string(&mut buf).context("read bus file")?;

        let mut rest = buf.as_str();
        while let Some(newline) = rest.find('\n') {
            let line = &rest[..newline];
            offset += (newline + 1) as u64;
            rest = &rest[newline + 1..];

            let line = line.trim();
            if !line.is_empty() {
                self.consume_line(line);
            }
        }
        Ok(offset)
    }

    fn consume_line(&self, line: &str) {
        let envelope: EventEnvelope = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "fail to decode bus message, skip");
                return;
            }
        };

        match self.consumers.get(&envelope.header.application_code) {
            Some(consumer) => consumer.consume(&envelope),
            None => warn!(
                application_code = envelope.header.application_code,
                "no consumer for application code"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupCache;
    use crate::event::Event;
    use crate::notify::{Notifier, NotifyChain};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    struct CapturingNotifier {
        calls: AtomicUsize,
        last_message: Mutex<String>,
    }

    impl Notifier for CapturingNotifier {
        fn name(&self) -> &str {
            "capturing"
        }

        fn notify(&self, event: &Event) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_message.lock().unwrap() = event.message_text().to_string();
            Ok(())
        }
    }

    fn reader_with_sink(file: &NamedTempFile) -> (BusReader, Arc<CapturingNotifier>) {
        let sink = Arc::new(CapturingNotifier {
            calls: AtomicUsize::new(0),
            last_message: Mutex::new(String::new()),
        });
        let chain = NotifyChain::new(vec![sink.clone()]);
        let relay = EventRelay::new(DedupCache::new(), chain, Vec::new()).into_shared();

        let mut reader = BusReader::new(file.path(), Duration::from_millis(10));
        reader.register(7, relay);
        (reader, sink)
    }

    fn bus_line(code: i32, msg: &str) -> String {
        format!(
            r#"{{"header":{{"application_code":{code},"logic":1}},"body":{{"event_time":1542153888000,"message":{{"type":"ALARM","message":"{msg}"}},"package_group":"g","package_host":"h","package_name":"default","package_process":"p","package_profile":"prod"}}}}"#
        )
    }

    #[test]
    fn test_drain_consumes_complete_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", bus_line(7, "first")).unwrap();
        writeln!(file, "{}", bus_line(7, "second")).unwrap();
        file.flush().unwrap();

        let (reader, sink) = reader_with_sink(&file);
        let offset = reader.drain_from(0).unwrap();

        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*sink.last_message.lock().unwrap(), "second");
        assert!(offset > 0);

        // 同一偏移量之后没有新行，不重复消费
        let again = reader.drain_from(offset).unwrap();
        assert_eq!(again, offset);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drain_leaves_partial_trailing_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", bus_line(7, "whole")).unwrap();
        write!(file, "{{\"header\":").unwrap(); // 半行
        file.flush().unwrap();

        let (reader, sink) = reader_with_sink(&file);
        let offset = reader.drain_from(0).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

        // 半行补全后下一轮被消费
        writeln!(
            file,
            "{}",
            &bus_line(7, "completed")[r#"{"header":"#.len()..]
        )
        .unwrap();
        file.flush().unwrap();
        reader.drain_from(offset).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*sink.last_message.lock().unwrap(), "completed");
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(file, "{}", bus_line(7, "good")).unwrap();
        file.flush().unwrap();

        let (reader, sink) = reader_with_sink(&file);
        reader.drain_from(0).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_application_code_is_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", bus_line(99, "for someone else")).unwrap();
        file.flush().unwrap();

        let (reader, sink) = reader_with_sink(&file);
        reader.drain_from(0).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_truncated_file_rewinds() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", bus_line(7, "before rotation")).unwrap();
        file.flush().unwrap();

        let (reader, sink) = reader_with_sink(&file);
        let offset = reader.drain_from(0).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

        // 文件被轮转成更短的新内容
        file.as_file_mut().set_len(0).unwrap();
        file.as_file_mut().seek(SeekFrom::Start(0)).unwrap();
        writeln!(file, "{}", bus_line(7, "after rotation")).unwrap();
        file.flush().unwrap();

        reader.drain_from(offset).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*sink.last_message.lock().unwrap(), "after rotation");
    }

    #[test]
    fn test_missing_file_keeps_offset() {
        let reader = BusReader::new("/nonexistent/bus.jsonl", Duration::from_millis(10));
        assert_eq!(reader.drain_from(42).unwrap(), 42);
    }
}
