//! # Paravane Protocol
//!
//! 拖曳体（paravane）执行器控制器 UDP 协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `schema`: 字段布局描述与通用读写例程
//! - `telemetry`: 上行遥测帧解析（52/72 字节）
//! - `command`: 下行舵机指令帧构建（28 字节）
//!
//! ## 字节序
//!
//! 协议所有字段均为 4 字节小端序（Little Endian）：
//! IEEE-754 `f32` 或无符号 `u32`。帧之间没有分隔符，一个数据报即一帧。

pub mod command;
pub mod schema;
pub mod telemetry;

// 重新导出常用类型
pub use command::*;
pub use schema::{FieldKind, FieldSpec, FrameSchema, WireValue};
pub use telemetry::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 数据报长度与帧布局不符，整帧丢弃
    #[error("Malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },
}

/// 字节序转换工具函数
///
/// 小端字节序转 f32
pub fn bytes_to_f32_le(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes(bytes)
}

/// 小端字节序转 u32
pub fn bytes_to_u32_le(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// f32 转小端字节序
pub fn f32_to_bytes_le(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}

/// u32 转小端字节序
pub fn u32_to_bytes_le(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}
