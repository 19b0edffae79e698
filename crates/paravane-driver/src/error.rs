//! 驱动层错误类型定义

use crate::config::ConfigError;
use crate::transport::TransportError;
use paravane_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 协议解析错误（畸形帧，整帧丢弃）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 传输层错误（发送失败不重试，下一次指令会带着新的时间戳覆盖）
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 命令通道已关闭（TX 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 命令队列已满（TX 线程处理不过来）
    #[error("Command queue full")]
    CommandQueueFull,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 是否为畸形帧（应记录并丢弃，而非上报为故障）
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            DriverError::Protocol(ProtocolError::MalformedFrame { .. })
        )
    }
}
