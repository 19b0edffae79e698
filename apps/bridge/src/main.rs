//! Paravane 桥接主入口
//!
//! 读取配置、启动 UDP 桥接，从标准输入接收舵机指令，Ctrl+C 退出。

mod console;
mod log_sink;

use anyhow::{Context, Result};
use clap::Parser;
use console::ConsoleCommand;
use crossbeam_channel::{Receiver, Sender};
use log_sink::LogSink;
use paravane_driver::{
    Bridge, BridgeBuilder, BridgeConfig, BridgeMetrics, ChannelSink, FeedbackSource,
};
use paravane_protocol::FrameLayout;
use std::io::BufRead;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 指标日志间隔
const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Paravane UDP 桥接
#[derive(Parser, Debug)]
#[command(name = "paravane-bridge")]
#[command(about = "UDP bridge between the paravane actuator controller and the robot stack", long_about = None)]
struct Args {
    /// TOML 配置文件（缺省使用内置默认值）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 控制器 IP
    #[arg(long)]
    peer_ip: Option<IpAddr>,

    /// 指令发送端口
    #[arg(long)]
    send_port: Option<u16>,

    /// 遥测接收端口
    #[arg(long)]
    receive_port: Option<u16>,

    /// 遥测帧布局：base (52 字节) / extended (72 字节)
    #[arg(long)]
    layout: Option<FrameLayout>,

    /// 舵机反馈来源：auxiliary / external
    #[arg(long)]
    feedback_source: Option<FeedbackSource>,

    /// 日志级别（覆盖 RUST_LOG），如 info、debug、paravane_driver=trace
    #[arg(long)]
    log_level: Option<String>,

    /// 打印生效配置（TOML）后退出
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => BridgeConfig::default(),
        };

        if let Some(ip) = self.peer_ip {
            config.udp.peer_ip = ip;
        }
        if let Some(port) = self.send_port {
            config.udp.send_port = port;
        }
        if let Some(port) = self.receive_port {
            config.udp.receive_port = port;
        }
        if let Some(layout) = self.layout {
            config.frame_layout = layout;
        }
        if let Some(source) = self.feedback_source {
            config.feedback_source = source;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level `{}`", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// 在独立线程中逐行读取标准输入
fn spawn_console(commands: Sender<ConsoleCommand>) -> Result<()> {
    std::thread::Builder::new()
        .name("paravane-console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    },
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ConsoleCommand>() {
                    Ok(cmd) => {
                        if commands.send(cmd).is_err() {
                            break;
                        }
                    },
                    Err(e) => warn!("Ignoring input: {}", e),
                }
            }
        })
        .context("failed to spawn console thread")?;
    Ok(())
}

fn log_stats(bridge: &Bridge) {
    let m = bridge.metrics();
    let s = bridge.snapshot();
    info!(
        "rx {} ({} valid, {} malformed), tx {} ({} errors), sink drops {}, commanded {:?}, feedback {:?}",
        m.rx_datagrams,
        m.rx_frames_valid,
        m.rx_malformed,
        m.tx_frames_sent,
        m.tx_errors,
        m.sink_drops,
        s.commanded,
        s.feedback
    );
}

fn run(bridge: &Bridge, commands: Receiver<ConsoleCommand>, shutdown: Receiver<()>) {
    let mut last_stats = Instant::now();

    loop {
        crossbeam_channel::select! {
            recv(shutdown) -> _ => {
                info!("Received interrupt signal, shutting down");
                break;
            },
            recv(commands) -> cmd => match cmd {
                Ok(ConsoleCommand::Servos(input)) => {
                    if let Err(e) = bridge.send_command(input) {
                        warn!("Command rejected: {}", e);
                    }
                },
                Ok(ConsoleCommand::Feedback(feedback)) => bridge.update_feedback(feedback),
                Ok(ConsoleCommand::Stats) => log_stats(bridge),
                Ok(ConsoleCommand::Quit) | Err(_) => {
                    info!("Console closed, shutting down");
                    break;
                },
            },
            default(Duration::from_millis(200)) => {},
        }

        if !bridge.is_running() {
            error!("IO thread exited unexpectedly");
            break;
        }
        if last_stats.elapsed() >= STATS_INTERVAL {
            log_stats(bridge);
            last_stats = Instant::now();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;

    if args.print_config {
        print!(
            "{}",
            config
                .to_toml_string()
                .context("failed to serialize config")?
        );
        return Ok(());
    }

    init_tracing(args.log_level.as_deref())?;
    info!(
        "Controller {}, telemetry port {}, layout {:?}",
        config.udp.peer_addr(),
        config.udp.receive_port,
        config.frame_layout
    );

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("failed to install Ctrl+C handler")?;

    // RX 线程只向有界队列投递，日志输出在独立线程完成
    let metrics = Arc::new(BridgeMetrics::new());
    let (sink, events) = ChannelSink::bounded(config.sink_capacity);
    let sink = sink.with_metrics(metrics.clone());
    let publisher = std::thread::Builder::new()
        .name("paravane-publisher".into())
        .spawn(move || {
            let log_sink = LogSink::default();
            for event in events {
                log_sink.dispatch(event);
            }
        })
        .context("failed to spawn publisher thread")?;

    let bridge = BridgeBuilder::new()
        .config(config)
        .metrics(metrics)
        .build(Arc::new(sink))
        .context("failed to start bridge")?;

    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    spawn_console(cmd_tx)?;

    run(&bridge, cmd_rx, shutdown_rx);
    log_stats(&bridge);
    drop(bridge);
    // 桥接停止后队列发送端全部释放，publisher 线程随之结束
    if publisher.join().is_err() {
        error!("Publisher thread panicked");
    }
    Ok(())
}
