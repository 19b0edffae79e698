//! Builder 模式实现
//!
//! 链式构造 [`Bridge`]：绑定传输层、启动 RX/TX 线程，
//! 并在 `Drop` 时通知线程退出并等待其结束。

use crate::bridge::{BridgeController, ServosInput};
use crate::config::BridgeConfig;
use crate::error::DriverError;
use crate::metrics::{BridgeMetrics, MetricsSnapshot};
use crate::pipeline::{PipelineConfig, rx_loop, tx_loop};
use crate::sink::MessageSink;
use crate::state::{ActuatorSnapshot, ActuatorStateCache};
use crate::transport::{SplittableTransport, UdpTransport};
use crossbeam_channel::{Sender, TrySendError};
use paravane_protocol::SERVO_CHANNELS;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

/// 默认指令队列容量
const DEFAULT_COMMAND_CAPACITY: usize = 16;

/// Bridge Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use paravane_driver::{BridgeBuilder, BridgeConfig, ChannelSink, ServosInput};
/// use std::sync::Arc;
///
/// let (sink, events) = ChannelSink::bounded(64);
/// let bridge = BridgeBuilder::new()
///     .config(BridgeConfig::default())
///     .build(Arc::new(sink))
///     .unwrap();
///
/// bridge.send_command(ServosInput::new(&[0.1, 0.0, 0.0, 0.0])).unwrap();
/// let _event = events.recv();
/// ```
#[derive(Debug, Clone, Default)]
pub struct BridgeBuilder {
    config: BridgeConfig,
    pipeline_config: Option<PipelineConfig>,
    command_capacity: Option<usize>,
    cache: Option<Arc<ActuatorStateCache>>,
    metrics: Option<Arc<BridgeMetrics>>,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// 覆盖 Pipeline 配置（默认接收超时取自 `udp.receive_timeout_ms`）
    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    /// 指令队列容量（默认 16）
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = Some(capacity.max(1));
        self
    }

    /// 使用外部创建的状态缓存
    pub fn cache(mut self, cache: Arc<ActuatorStateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 共享指标（便于 sink 把丢弃计数记入同一组计数器）
    pub fn metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn resolved_pipeline(&self) -> PipelineConfig {
        self.pipeline_config.clone().unwrap_or_else(|| PipelineConfig {
            receive_timeout_ms: self.config.udp.receive_timeout_ms,
            ..PipelineConfig::default()
        })
    }

    /// 按配置绑定 UDP 并启动桥接
    pub fn build(self, sink: Arc<dyn MessageSink>) -> Result<Bridge, DriverError> {
        self.config.validate()?;
        let transport = UdpTransport::bind(&self.config.udp)?;
        transport.set_receive_timeout(Duration::from_millis(
            self.resolved_pipeline().receive_timeout_ms,
        ))?;
        let local_addr = transport.local_addr()?;
        info!(
            "Bridge listening on {}, commanding {}",
            local_addr,
            transport.peer_addr()
        );

        let mut bridge = self.build_with_transport(transport, sink)?;
        bridge.local_addr = Some(local_addr);
        Ok(bridge)
    }

    /// 使用任意可拆分传输启动桥接
    ///
    /// 调用方负责在传入前设置好接收超时，否则 RX 线程可能无法及时退出。
    pub fn build_with_transport<T>(
        self,
        transport: T,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Bridge, DriverError>
    where
        T: SplittableTransport,
    {
        self.config.validate()?;
        let pipeline = self.resolved_pipeline();
        let (rx, tx) = transport.split()?;

        let cache = self.cache.unwrap_or_default();
        let mut controller = BridgeController::from_config(cache, &self.config);
        if let Some(metrics) = self.metrics {
            controller = controller.with_metrics(metrics);
        }
        let controller = Arc::new(controller);
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<ServosInput>(
            self.command_capacity.unwrap_or(DEFAULT_COMMAND_CAPACITY),
        );
        let is_running = Arc::new(AtomicBool::new(true));

        let rx_thread = {
            let controller = controller.clone();
            let is_running = is_running.clone();
            let pipeline = pipeline.clone();
            thread::Builder::new()
                .name("paravane-rx".into())
                .spawn(move || rx_loop(rx, controller, sink, pipeline, is_running))
                .map_err(|e| DriverError::IoThread(format!("failed to spawn RX thread: {}", e)))?
        };

        let tx_thread = {
            let controller = controller.clone();
            let tx_running = is_running.clone();
            let spawned = thread::Builder::new()
                .name("paravane-tx".into())
                .spawn(move || tx_loop(tx, controller, cmd_rx, pipeline, tx_running));
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    // 已启动的 RX 线程需要先收回
                    is_running.store(false, Ordering::Release);
                    let _ = rx_thread.join();
                    return Err(DriverError::IoThread(format!(
                        "failed to spawn TX thread: {}",
                        e
                    )));
                },
            }
        };

        info!(
            "Bridge started (layout {:?}, feedback {:?}, {} servos)",
            self.config.frame_layout, self.config.feedback_source, self.config.n_servos
        );

        Ok(Bridge {
            controller,
            cmd_tx: Some(cmd_tx),
            is_running,
            rx_thread: Some(rx_thread),
            tx_thread: Some(tx_thread),
            local_addr: None,
        })
    }
}

/// 运行中的桥接
///
/// 持有 RX/TX 两个线程，`Drop` 时停止并回收。
pub struct Bridge {
    controller: Arc<BridgeController>,
    cmd_tx: Option<Sender<ServosInput>>,
    is_running: Arc<AtomicBool>,
    rx_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Bridge {
    /// 提交一条舵机指令（非阻塞）
    pub fn send_command(&self, input: ServosInput) -> Result<(), DriverError> {
        let cmd_tx = self.cmd_tx.as_ref().ok_or(DriverError::ChannelClosed)?;
        cmd_tx.try_send(input).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::CommandQueueFull,
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }

    /// 显式写入舵机反馈（`FeedbackSource::External` 时使用）
    pub fn update_feedback(&self, feedback: [f32; SERVO_CHANNELS]) {
        self.controller.cache().update_feedback(feedback);
    }

    pub fn snapshot(&self) -> ActuatorSnapshot {
        self.controller.cache().snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.controller.metrics().snapshot()
    }

    pub fn controller(&self) -> &Arc<BridgeController> {
        &self.controller
    }

    /// UDP 模式下的本地接收地址
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 两个 IO 线程是否都在运行
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
            && [&self.rx_thread, &self.tx_thread]
                .iter()
                .all(|t| matches!(t, Some(h) if !h.is_finished()))
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // Release: 之前的写入对 IO 线程可见
        self.is_running.store(false, Ordering::Release);

        // 先关闭指令通道，TX 线程会立即看到 Disconnected
        self.cmd_tx.take();

        for (name, handle) in [("RX", self.rx_thread.take()), ("TX", self.tx_thread.take())] {
            if let Some(handle) = handle
                && handle.join().is_err()
            {
                error!("{} thread panicked during shutdown", name);
            }
        }
        info!("Bridge stopped");
    }
}
