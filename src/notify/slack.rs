//! Slack sink - 参考 Notifier 实现
//!
//! 把事件渲染成 Slack attachment 消息，按 RoutingConfig 解析投递
//! 端点，并以 fire-and-forget 方式异步 POST。投递失败只记日志，
//! 不重试、不向调用方传播。

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::event::{AlarmLevel, Event};
use crate::notify::chain::Notifier;
use crate::routing::RoutingConfig;

const COLOR_GREEN: &str = "#00FF00";
const COLOR_YELLOW: &str = "#FFFF00";
const COLOR_BLUE: &str = "#439FE0";
const COLOR_RED: &str = "#FF0000";

const USER_NAME: &str = "RELAY";
const FOOTER_ICON: &str = "https://platform.slack-edge.com/img/default_application_icon.png";

/// 无类别的 lifecycle 告警归入该类别
const DEPLOY_CATEGORY: &str = "deploy";

/// deep-link 模板短于该长度视为无意义占位符
const MIN_LINK_TEMPLATE_LEN: usize = 10;

/// HTTP 请求超时（sink 自持，不从调用方传播）
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SlackNotifier {
    routing: Arc<RoutingConfig>,
    client: reqwest::Client,
    /// 部署历史 deep-link 模板，占位符 {host} / {process}
    deploy_link_template: Option<String>,
}

impl SlackNotifier {
    pub fn new(routing: Arc<RoutingConfig>, deploy_link_template: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            routing,
            client,
            deploy_link_template,
        })
    }

    /// 告警 lifecycle 事件缺类别时默认归入 deploy 类别
    fn effective_category(event: &Event) -> &str {
        let category = event.category();
        if event.is_alarm() && event.is_process_lifecycle() && category.is_empty() {
            DEPLOY_CATEGORY
        } else {
            category
        }
    }

    /// `[profile] group:host(:name)`，name 为 "default" 时省略
    fn build_pretext(event: &Event) -> String {
        let mut pretext = String::new();
        if !event.package_profile.is_empty() {
            pretext.push('[');
            pretext.push_str(&event.package_profile);
            pretext.push_str("] ");
        }
        pretext.push_str(&event.package_group);
        pretext.push(':');
        pretext.push_str(&event.package_host);
        if event.package_name != "default" {
            pretext.push(':');
            pretext.push_str(&event.package_name);
        }
        pretext
    }

    fn attachment_color(event: &Event) -> &'static str {
        if !event.is_alarm() {
            return COLOR_GREEN;
        }
        match event.alarm_level() {
            Some(AlarmLevel::Warn) => COLOR_YELLOW,
            Some(AlarmLevel::Minor) => COLOR_BLUE,
            Some(AlarmLevel::Major) => COLOR_RED,
            None => COLOR_GREEN,
        }
    }

    /// 消息正文：payload message，startup 告警追加部署信息
    fn build_text(event: &Event, link_template: Option<&str>) -> String {
        let mut text = event.message_text().to_string();

        if !event.is_alarm() || !event.is_process_startup() {
            return text;
        }
        let Some(dep) = event.deployment() else {
            return text;
        };
        let Some(build) = dep.build.as_ref().filter(|b| !b.time.is_empty()) else {
            return text;
        };
        text.push_str(&format!("\ndeploy user : {}", build.user));
        text.push_str(&format!("\nbuild time : {}", build.time));

        // deep link 只在带 VCS 元数据的部署上有意义
        let Some(git) = build.git.as_ref().filter(|_| build.has_git()) else {
            return text;
        };
        text.push_str(&format!("\ngit commit : {} ({})", git.commit, git.branch));
        text.push_str(&format!("\ngit message : {}", git.trimmed_message()));

        if let Some(template) = link_template.filter(|t| t.len() > MIN_LINK_TEMPLATE_LEN) {
            let link = template
                .replace("{host}", &event.package_host)
                .replace("{process}", &event.package_process);
            text.push_str(&format!("\n<{}|deploy history>\n", link));
        }

        text
    }

    /// 完整的 Slack webhook payload
    fn build_payload(
        event: &Event,
        channel: Option<&str>,
        link_template: Option<&str>,
    ) -> serde_json::Value {
        let attachment = serde_json::json!({
            "pretext": Self::build_pretext(event),
            "color": Self::attachment_color(event),
            "text": Self::build_text(event, link_template),
            "footer": event.package_process,
            "footer_icon": FOOTER_ICON,
            "ts": event.event_time / 1000,
        });

        let mut payload = serde_json::json!({
            "username": USER_NAME,
            "attachments": [attachment],
        });
        if let Some(channel) = channel {
            payload["channel"] = serde_json::json!(channel);
        }
        payload
    }

    /// fire-and-forget 投递：spawn 后立即返回，结果只记日志
    fn deliver(&self, url: String, payload: serde_json::Value) {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(status = %resp.status(), "sent to slack");
                }
                Ok(resp) => {
                    info!(status = %resp.status(), "slack response");
                }
                Err(e) => {
                    warn!(error = %e, "fail to send slack notification");
                }
            }
        });
    }
}

impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    fn notify(&self, event: &Event) -> Result<()> {
        let is_alarm = event.is_alarm();
        let category = Self::effective_category(event);

        // 路由不可用时静默丢弃，这不是错误
        let Some(route) = self.routing.resolve(category, is_alarm) else {
            debug!(category, is_alarm, "no usable route, drop notification");
            return Ok(());
        };

        let payload =
            Self::build_payload(event, route.channel.as_deref(), self.deploy_link_template.as_deref());
        if is_alarm && !category.is_empty() {
            info!(category, url = %route.url, "sending alarm with category");
        }
        self.deliver(route.url, payload);
        Ok(())
    }
}
