//! 驱动层模块
//!
//! 本模块提供拖曳体执行器控制器与上层机器人软件之间的桥接功能，包括：
//! - 共享执行器状态缓存（单互斥锁，无撕裂快照）
//! - 遥测帧 → IMU/深度/漏水消息与坐标变换树
//! - 舵机指令 → 28 字节指令帧（一次性同步握手）
//! - UDP 传输与 RX/TX 线程管理
//!
//! # 使用场景
//!
//! 大多数使用者通过 [`BridgeBuilder`] 启动完整桥接；
//! 需要自行调度 IO 的场景可以直接使用 [`BridgeController`]。

mod bridge;
mod builder;
pub mod config;
mod error;
pub mod messages;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod state;
pub mod transform;
pub mod transport;

pub use bridge::{BridgeController, FeedbackSource, InboundReport, ServosInput};
pub use builder::{Bridge, BridgeBuilder};
pub use config::{BridgeConfig, ConfigError, UdpConfig};
pub use error::DriverError;
pub use messages::{DepthMessage, Header, ImuMessage, LeakMessage, ServosFeedbackMessage};
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use pipeline::{PipelineConfig, rx_loop, tx_loop};
pub use sink::{ChannelSink, MessageSink, SinkEvent};
pub use state::{ActuatorSnapshot, ActuatorStateCache, SyncState};
pub use transform::{TransformNode, TransformTree, build_transforms};
pub use transport::{
    Datagram, RxTransport, SplittableTransport, TransportError, TxTransport, UdpTransport,
    UdpTxTransport,
};
