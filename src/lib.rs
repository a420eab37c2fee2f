//! Event Relay - 事件去重与通知分发中继

pub mod bus;
pub mod config;
pub mod dedup;
pub mod deployment;
pub mod event;
pub mod notify;
pub mod relay;
pub mod routing;

pub use bus::BusReader;
pub use config::RelayConfig;
pub use dedup::DedupCache;
pub use deployment::{BuildInfo, DeploymentInfo, GitInfo};
pub use event::{AlarmLevel, Event, EventEnvelope, EventHeader};
pub use notify::{Notifier, NotifyChain, SinkKind, SlackNotifier};
pub use relay::EventRelay;
pub use routing::{ResolvedRoute, Route, RoutingConfig};
