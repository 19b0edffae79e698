//! 下游消息出口
//!
//! 入站路径产生的消息和坐标变换交给 [`MessageSink`]。
//! 实现方在 RX 线程中被同步调用，必须快速返回（不得阻塞）。

use crate::messages::{DepthMessage, Header, ImuMessage, LeakMessage, ServosFeedbackMessage};
use crate::metrics::BridgeMetrics;
use crate::transform::TransformNode;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// 消息出口
///
/// `publish_servos_feedback` 默认忽略，仅关心遥测的使用方无需实现。
pub trait MessageSink: Send + Sync {
    fn publish_imu(&self, msg: &ImuMessage);

    fn publish_depth(&self, msg: &DepthMessage);

    fn publish_leak(&self, msg: &LeakMessage);

    fn publish_servos_feedback(&self, _msg: &ServosFeedbackMessage) {}

    /// 一次性发送整棵变换树（父节点在前）
    fn send_transforms(&self, header: &Header, transforms: &[TransformNode]);
}

impl<T: MessageSink + ?Sized> MessageSink for Arc<T> {
    fn publish_imu(&self, msg: &ImuMessage) {
        (**self).publish_imu(msg)
    }

    fn publish_depth(&self, msg: &DepthMessage) {
        (**self).publish_depth(msg)
    }

    fn publish_leak(&self, msg: &LeakMessage) {
        (**self).publish_leak(msg)
    }

    fn publish_servos_feedback(&self, msg: &ServosFeedbackMessage) {
        (**self).publish_servos_feedback(msg)
    }

    fn send_transforms(&self, header: &Header, transforms: &[TransformNode]) {
        (**self).send_transforms(header, transforms)
    }
}

/// 通过通道转发的出口事件
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Imu(ImuMessage),
    Depth(DepthMessage),
    Leak(LeakMessage),
    ServosFeedback(ServosFeedbackMessage),
    Transforms(Header, Vec<TransformNode>),
}

impl SinkEvent {
    /// 事件携带的消息头
    pub fn header(&self) -> &Header {
        match self {
            SinkEvent::Imu(msg) => &msg.header,
            SinkEvent::Depth(msg) => &msg.header,
            SinkEvent::Leak(msg) => &msg.header,
            SinkEvent::ServosFeedback(msg) => &msg.header,
            SinkEvent::Transforms(header, _) => header,
        }
    }
}

/// 基于有界通道的出口
///
/// 使用 `try_send`，队列满时丢弃事件并计数，RX 线程永不阻塞。
///
/// ```
/// use paravane_driver::{ChannelSink, MessageSink, SinkEvent};
/// use paravane_driver::messages::{Header, LeakMessage};
///
/// let (sink, events) = ChannelSink::bounded(1);
/// let msg = LeakMessage { header: Header::new(0), leak: 0.0 };
/// sink.publish_leak(&msg);
/// sink.publish_leak(&msg); // 队列已满
/// assert!(matches!(events.try_recv(), Ok(SinkEvent::Leak(_))));
/// assert_eq!(sink.dropped(), 1);
/// ```
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
    dropped: AtomicU64,
    metrics: Option<Arc<BridgeMetrics>>,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<SinkEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let sink = Self {
            tx,
            dropped: AtomicU64::new(0),
            metrics: None,
        };
        (sink, rx)
    }

    /// 丢弃计数同时记入 `BridgeMetrics::sink_drops`
    pub fn with_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 已丢弃的事件数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn forward(&self, event: SinkEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(event)) => {
                trace!("Sink queue full, dropping event seq {}", event.header().seq);
                self.count_drop();
            },
            Err(TrySendError::Disconnected(_)) => {
                trace!("Sink receiver dropped, discarding event");
                self.count_drop();
            },
        }
    }

    fn count_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.sink_drops.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl MessageSink for ChannelSink {
    fn publish_imu(&self, msg: &ImuMessage) {
        self.forward(SinkEvent::Imu(*msg));
    }

    fn publish_depth(&self, msg: &DepthMessage) {
        self.forward(SinkEvent::Depth(*msg));
    }

    fn publish_leak(&self, msg: &LeakMessage) {
        self.forward(SinkEvent::Leak(*msg));
    }

    fn publish_servos_feedback(&self, msg: &ServosFeedbackMessage) {
        self.forward(SinkEvent::ServosFeedback(*msg));
    }

    fn send_transforms(&self, header: &Header, transforms: &[TransformNode]) {
        self.forward(SinkEvent::Transforms(*header, transforms.to_vec()));
    }
}
