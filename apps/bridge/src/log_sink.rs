//! 以日志形式输出桥接消息的 sink

use paravane_driver::messages::{DepthMessage, Header, ImuMessage, LeakMessage, ServosFeedbackMessage};
use paravane_driver::{MessageSink, SinkEvent, TransformNode};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

/// 每隔多少帧以 info 级别输出一次深度
const SUMMARY_EVERY: u64 = 50;

#[derive(Debug, Default)]
pub struct LogSink {
    frames: AtomicU64,
}

impl LogSink {
    /// 输出一条从队列取出的事件
    pub fn dispatch(&self, event: SinkEvent) {
        match event {
            SinkEvent::Imu(msg) => self.publish_imu(&msg),
            SinkEvent::Depth(msg) => self.publish_depth(&msg),
            SinkEvent::Leak(msg) => self.publish_leak(&msg),
            SinkEvent::ServosFeedback(msg) => self.publish_servos_feedback(&msg),
            SinkEvent::Transforms(header, nodes) => self.send_transforms(&header, &nodes),
        }
    }
}

impl MessageSink for LogSink {
    fn publish_imu(&self, msg: &ImuMessage) {
        trace!(
            seq = msg.header.seq,
            "imu lin_acc={:?} ang_vel={:?} orientation={:?}",
            msg.linear_acceleration,
            msg.angular_velocity,
            msg.orientation
        );
    }

    fn publish_depth(&self, msg: &DepthMessage) {
        let n = self.frames.fetch_add(1, Ordering::Relaxed);
        if n % SUMMARY_EVERY == 0 {
            info!(
                seq = msg.header.seq,
                "depth {:.3} m, water {:.1} °C", msg.depth, msg.temperature
            );
        } else {
            debug!(seq = msg.header.seq, "depth={} temperature={}", msg.depth, msg.temperature);
        }
    }

    fn publish_leak(&self, msg: &LeakMessage) {
        if msg.leak != 0.0 {
            warn!(seq = msg.header.seq, "leak sensor reports {}", msg.leak);
        }
    }

    fn publish_servos_feedback(&self, msg: &ServosFeedbackMessage) {
        debug!(seq = msg.header.seq, "servos feedback {:?}", msg.feedback);
    }

    fn send_transforms(&self, header: &Header, transforms: &[TransformNode]) {
        for node in transforms {
            trace!(
                seq = header.seq,
                "tf {} -> {} t=[{:.3}, {:.3}, {:.3}] q=[{:.3}, {:.3}, {:.3}, {:.3}]",
                node.parent,
                node.child,
                node.translation.x,
                node.translation.y,
                node.translation.z,
                node.rotation.i,
                node.rotation.j,
                node.rotation.k,
                node.rotation.w
            );
        }
    }
}
