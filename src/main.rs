//! Event Relay CLI
//!
//! 从消息总线消费事件，去重后经通知链投递到 Slack

use anyhow::Result;
use clap::{Parser, Subcommand};
use event_relay::{
    BusReader, DedupCache, EventEnvelope, EventRelay, NotifyChain, RelayConfig, RoutingConfig,
    SinkKind,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "evr")]
#[command(about = "Event Relay - 事件去重与通知分发中继")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/event-relay/config.json）
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动 relay：轮询总线文件并分发通知
    Run,
    /// 从 stdin 读取一条 envelope JSON 并走一遍完整管线（调试用）
    Inject,
    /// 打印当前路由表解析结果
    Routes,
}

fn build_relay(config: &RelayConfig) -> Result<(Arc<EventRelay>, DedupCache)> {
    let dedup = DedupCache::with_window(config.suppress_window());
    let routing = Arc::new(RoutingConfig::with_staleness(
        &config.routes_file,
        config.alarm_staleness(),
        config.event_staleness(),
    ));
    let kinds = SinkKind::parse_chain(config.notify_chain.as_deref());
    let chain = NotifyChain::from_kinds(&kinds, routing, config.deploy_link_template.clone())?;
    let relay = EventRelay::new(dedup.clone(), chain, config.ignored_processes.clone()).into_shared();
    Ok((relay, dedup))
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug evr run
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("event_relay=info,evr=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let config = RelayConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => {
            let (relay, dedup) = build_relay(&config)?;
            let _janitor = dedup.spawn_janitor(config.janitor_interval());

            let mut reader = BusReader::new(&config.bus_file, config.poll_interval());
            reader.register(config.application_code, relay);
            reader.run().await?;
        }
        Commands::Inject => {
            let (relay, _dedup) = build_relay(&config)?;
            let input = std::io::read_to_string(std::io::stdin())?;
            let envelope: EventEnvelope = serde_json::from_str(input.trim())?;
            relay.consume(&envelope);
            // 等 fire-and-forget 投递任务落地再退出
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            info!("envelope injected");
        }
        Commands::Routes => {
            let routing = RoutingConfig::with_staleness(
                &config.routes_file,
                config.alarm_staleness(),
                config.event_staleness(),
            );
            println!("routes file: {}", config.routes_file.display());
            match routing.resolve("", false) {
                Some(route) => println!("  event   -> {}", route.url),
                None => println!("  event   -> (unusable)"),
            }
            match routing.resolve("", true) {
                Some(route) => println!("  alarm   -> {}", route.url),
                None => println!("  alarm   -> (unusable)"),
            }
            for category in routing.category_names() {
                match routing.resolve(&category, true) {
                    Some(route) => println!("  {:7} -> {}", category, route.url),
                    None => println!("  {:7} -> (unusable)", category),
                }
            }
        }
    }

    Ok(())
}
