//! 通知层 - 把接受的事件渲染并投递到外部 sink
//!
//! 所有 sink 实现 [`Notifier`] trait，由 [`NotifyChain`] 按构造顺序
//! 逐个调用；单个 sink 失败或 panic 不影响链上后续 sink。

pub mod chain;
pub mod slack;

pub use chain::{NotifyChain, Notifier, SinkKind};
pub use slack::SlackNotifier;
