//! 派生消息
//!
//! 每个入站数据报产生一组消息，同一组消息共享同一个 `Header`。

use paravane_protocol::{SERVO_CHANNELS, TelemetryFrame};
use std::time::SystemTime;

/// 消息头
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    /// 桥接端处理该数据报时的系统时间
    pub stamp: SystemTime,
    /// 数据报序号（传输层分配，单调递增）
    pub seq: u64,
}

impl Header {
    pub fn new(seq: u64) -> Self {
        Self {
            stamp: SystemTime::now(),
            seq,
        }
    }
}

/// 惯性测量消息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuMessage {
    pub header: Header,
    /// 线加速度 [x, y, z]
    pub linear_acceleration: [f64; 3],
    /// 角速度 [x, y, z]
    pub angular_velocity: [f64; 3],
    /// 姿态四元数 [x, y, z, w]
    pub orientation: [f64; 4],
}

impl ImuMessage {
    pub fn from_frame(header: Header, frame: &TelemetryFrame) -> Self {
        Self {
            header,
            linear_acceleration: frame.linear_acceleration.map(f64::from),
            angular_velocity: frame.angular_velocity.map(f64::from),
            orientation: frame.orientation.map(f64::from),
        }
    }
}

/// 深度与水温消息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthMessage {
    pub header: Header,
    pub depth: f64,
    pub temperature: f64,
}

impl DepthMessage {
    pub fn from_frame(header: Header, frame: &TelemetryFrame) -> Self {
        Self {
            header,
            depth: frame.depth.into(),
            temperature: frame.temperature.into(),
        }
    }
}

/// 漏水传感器消息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakMessage {
    pub header: Header,
    pub leak: f64,
}

impl LeakMessage {
    pub fn from_frame(header: Header, frame: &TelemetryFrame) -> Self {
        Self {
            header,
            leak: frame.leak.into(),
        }
    }
}

/// 舵机反馈消息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServosFeedbackMessage {
    pub header: Header,
    /// 通道 1-5 的反馈舵角（rad）
    pub feedback: [f64; SERVO_CHANNELS],
}

impl ServosFeedbackMessage {
    pub fn new(header: Header, feedback: [f32; SERVO_CHANNELS]) -> Self {
        Self {
            header,
            feedback: feedback.map(f64::from),
        }
    }
}
