//! 桥接运行指标
//!
//! 原子计数器，可在任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 桥接实时指标
///
/// ```rust
/// use paravane_driver::BridgeMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BridgeMetrics::new();
/// metrics.rx_datagrams.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().rx_datagrams, 1);
/// ```
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// 收到的数据报总数（含畸形帧）
    pub rx_datagrams: AtomicU64,

    /// 成功解码的遥测帧数
    pub rx_frames_valid: AtomicU64,

    /// 因长度不符被丢弃的数据报数
    pub rx_malformed: AtomicU64,

    /// RX 超时次数（无数据时属正常现象）
    pub rx_timeouts: AtomicU64,

    /// 成功发出的指令帧数
    pub tx_frames_sent: AtomicU64,

    /// 指令发送失败次数
    pub tx_errors: AtomicU64,

    /// 下游消息队列满导致的丢弃次数
    pub sink_drops: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取所有计数器
    ///
    /// 各计数器分别以 `Relaxed` 读取，彼此之间可能有微小时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_datagrams: self.rx_datagrams.load(Ordering::Relaxed),
            rx_frames_valid: self.rx_frames_valid.load(Ordering::Relaxed),
            rx_malformed: self.rx_malformed.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            tx_frames_sent: self.tx_frames_sent.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            sink_drops: self.sink_drops.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.rx_datagrams,
            &self.rx_frames_valid,
            &self.rx_malformed,
            &self.rx_timeouts,
            &self.tx_frames_sent,
            &self.tx_errors,
            &self.sink_drops,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_datagrams: u64,
    pub rx_frames_valid: u64,
    pub rx_malformed: u64,
    pub rx_timeouts: u64,
    pub tx_frames_sent: u64,
    pub tx_errors: u64,
    pub sink_drops: u64,
}

impl MetricsSnapshot {
    /// 有效帧比例（百分比），未收到数据时为 0.0
    pub fn valid_frame_rate(&self) -> f64 {
        if self.rx_datagrams == 0 {
            return 0.0;
        }
        (self.rx_frames_valid as f64 / self.rx_datagrams as f64) * 100.0
    }
}
