//! IO 循环
//!
//! RX 线程负责遥测接收与入站触发，TX 线程负责指令队列与出站触发。
//! 两个线程通过 `is_running` 标志协同退出。

use crate::bridge::{BridgeController, ServosInput};
use crate::sink::MessageSink;
use crate::transport::{RxTransport, TransportError, TxTransport};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, trace};

/// Pipeline 配置
///
/// ```
/// use paravane_driver::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.receive_timeout_ms, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 遥测接收超时（毫秒），在构建时应用到传输层
    pub receive_timeout_ms: u64,
    /// TX 线程等待指令的超时（毫秒），决定退出标志的检查间隔
    pub command_poll_ms: u64,
    /// 传输层 IO 错误后的退避时间（毫秒）
    pub error_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 2,
            command_poll_ms: 10,
            error_backoff_ms: 5,
        }
    }
}

/// RX 线程循环
///
/// 每个数据报都交给 [`BridgeController::handle_datagram`]；
/// 畸形帧已在控制器内记录并计数，这里直接丢弃。
pub fn rx_loop<S>(
    mut rx: impl RxTransport,
    controller: Arc<BridgeController>,
    sink: Arc<S>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
) where
    S: MessageSink + ?Sized,
{
    let backoff = Duration::from_millis(config.error_backoff_ms);
    let metrics = controller.metrics().clone();

    loop {
        // Acquire: 看到 false 时必须同时看到其他线程的清理写入
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let datagram = match rx.receive() {
            Ok(datagram) => datagram,
            Err(TransportError::Timeout) => {
                metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(TransportError::Closed) => {
                info!("RX thread: transport closed, exiting");
                break;
            },
            Err(e) => {
                error!("RX thread: receive failed: {}", e);
                std::thread::sleep(backoff);
                continue;
            },
        };

        // 错误已在控制器内部记录
        let _ = controller.handle_datagram(&datagram, sink.as_ref());
    }

    trace!("RX thread: loop exited");
}

/// TX 线程循环
///
/// 逐条处理上游指令；发送失败已在控制器内记录，不重试。
pub fn tx_loop(
    mut tx: impl TxTransport,
    controller: Arc<BridgeController>,
    cmd_rx: Receiver<ServosInput>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
) {
    let poll = Duration::from_millis(config.command_poll_ms.max(1));

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            break;
        }

        match cmd_rx.recv_timeout(poll) {
            Ok(input) => {
                let _ = controller.handle_command(&input, &mut tx);
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                trace!("TX thread: command channel disconnected, exiting");
                break;
            },
        }
    }

    trace!("TX thread: loop exited");
}
