//! 桥接控制器
//!
//! 两个触发入口，可能在不同线程上并发执行：
//!
//! - 入站：一个遥测数据报 → 解码 → IMU / 深度 / 漏水消息 → 6 个坐标变换
//! - 出站：一条上游舵机指令 → 写入缓存并编码 → 交给传输层发送
//!
//! 两者唯一共享的可变状态是 [`ActuatorStateCache`]，
//! 锁只在拷贝/覆写期间持有，绝不跨越 sink 或传输层调用。

use crate::config::BridgeConfig;
use crate::error::DriverError;
use crate::messages::{DepthMessage, Header, ImuMessage, LeakMessage, ServosFeedbackMessage};
use crate::metrics::BridgeMetrics;
use crate::sink::MessageSink;
use crate::state::{ActuatorSnapshot, ActuatorStateCache};
use crate::transform::{TransformTree, build_transforms};
use crate::transport::{Datagram, TxTransport};
use paravane_protocol::{COMMANDED_SERVOS, CommandFrame, FrameLayout, TelemetryFrame};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, trace, warn};

/// 舵机反馈来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    /// 扩展遥测帧的 5 个辅助字段即为反馈通道 1-5
    ///
    /// 基础布局不携带辅助字段，此时反馈保持原值（初始为 0）。
    #[default]
    Auxiliary,
    /// 反馈仅通过 [`ActuatorStateCache::update_feedback`] 显式写入
    External,
}

impl FromStr for FeedbackSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auxiliary" | "aux" => Ok(FeedbackSource::Auxiliary),
            "external" => Ok(FeedbackSource::External),
            other => Err(format!(
                "unknown feedback source `{}` (expected `auxiliary` or `external`)",
                other
            )),
        }
    }
}

/// 上游舵机指令
///
/// 最多 4 个舵角增量（rad），缺省通道按 0 处理，多余的值被忽略。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServosInput {
    pub deltas: Vec<f32>,
}

impl ServosInput {
    pub fn new(deltas: &[f32]) -> Self {
        Self {
            deltas: deltas.to_vec(),
        }
    }

    /// 展开为定长指令数组，`n_servos` 之后的通道强制为 0
    pub fn to_deltas(&self, n_servos: usize) -> [f32; COMMANDED_SERVOS] {
        let mut out = [0.0f32; COMMANDED_SERVOS];
        let active = n_servos.min(COMMANDED_SERVOS);
        for (slot, value) in out.iter_mut().zip(&self.deltas).take(active) {
            *slot = *value;
        }
        out
    }
}

impl From<[f32; COMMANDED_SERVOS]> for ServosInput {
    fn from(deltas: [f32; COMMANDED_SERVOS]) -> Self {
        Self::new(&deltas)
    }
}

/// 解析空白或逗号分隔的舵角列表，如 `"0.1, -0.2 0.05"`
impl FromStr for ServosInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let deltas = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<f32>()
                    .map_err(|e| format!("invalid servo delta `{}`: {}", token, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if deltas.len() > COMMANDED_SERVOS {
            return Err(format!(
                "at most {} servo deltas allowed, got {}",
                COMMANDED_SERVOS,
                deltas.len()
            ));
        }
        Ok(Self { deltas })
    }
}

/// 一次入站触发的处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct InboundReport {
    pub header: Header,
    pub frame: TelemetryFrame,
    /// 构建变换树时使用的缓存快照
    pub snapshot: ActuatorSnapshot,
    pub transforms: TransformTree,
    /// 本次是否发布了舵机反馈消息
    pub feedback_published: bool,
}

/// 桥接控制器
pub struct BridgeController {
    cache: Arc<ActuatorStateCache>,
    layout: FrameLayout,
    feedback_source: FeedbackSource,
    n_servos: usize,
    metrics: Arc<BridgeMetrics>,
    start: Instant,
    next_seq: AtomicU64,
}

impl BridgeController {
    /// 启动时刻从此处开始计时（指令帧的 `elapsed_ms` 以此为零点）
    pub fn new(
        cache: Arc<ActuatorStateCache>,
        layout: FrameLayout,
        feedback_source: FeedbackSource,
    ) -> Self {
        Self {
            cache,
            layout,
            feedback_source,
            n_servos: COMMANDED_SERVOS,
            metrics: Arc::new(BridgeMetrics::new()),
            start: Instant::now(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn from_config(cache: Arc<ActuatorStateCache>, config: &BridgeConfig) -> Self {
        Self::new(cache, config.frame_layout, config.feedback_source).with_n_servos(config.n_servos)
    }

    pub fn with_n_servos(mut self, n_servos: usize) -> Self {
        self.n_servos = n_servos.clamp(1, COMMANDED_SERVOS);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn cache(&self) -> &Arc<ActuatorStateCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn feedback_source(&self) -> FeedbackSource {
        self.feedback_source
    }

    /// 自启动以来的毫秒数（约 49.7 天后按 `u32` 回绕）
    pub fn elapsed_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    /// 入站触发：处理传输层交付的数据报
    pub fn handle_datagram<S>(
        &self,
        datagram: &Datagram,
        sink: &S,
    ) -> Result<InboundReport, DriverError>
    where
        S: MessageSink + ?Sized,
    {
        self.process(datagram.seq, &datagram.data, sink)
    }

    /// 入站触发：处理裸字节（序号由控制器自行分配）
    pub fn handle_bytes<S>(&self, bytes: &[u8], sink: &S) -> Result<InboundReport, DriverError>
    where
        S: MessageSink + ?Sized,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.process(seq, bytes, sink)
    }

    fn process<S>(&self, seq: u64, bytes: &[u8], sink: &S) -> Result<InboundReport, DriverError>
    where
        S: MessageSink + ?Sized,
    {
        self.metrics.rx_datagrams.fetch_add(1, Ordering::Relaxed);

        let frame = match TelemetryFrame::decode(bytes, self.layout) {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.rx_malformed.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping datagram seq {}: {}", seq, e);
                return Err(e.into());
            },
        };
        self.metrics.rx_frames_valid.fetch_add(1, Ordering::Relaxed);

        trace!(
            "Frame seq {}: lin_acc={:?} ang_vel={:?} quat={:?}",
            seq, frame.linear_acceleration, frame.angular_velocity, frame.orientation
        );
        trace!(
            "Frame seq {}: depth={} temperature={} leak={} aux={:?}",
            seq, frame.depth, frame.temperature, frame.leak, frame.auxiliary
        );

        let feedback = match (self.feedback_source, frame.auxiliary) {
            (FeedbackSource::Auxiliary, Some(aux)) => Some(aux),
            _ => None,
        };
        let snapshot = match feedback {
            Some(aux) => self.cache.update_feedback_snapshot(aux),
            None => self.cache.snapshot(),
        };

        let header = Header::new(seq);
        sink.publish_imu(&ImuMessage::from_frame(header, &frame));
        sink.publish_depth(&DepthMessage::from_frame(header, &frame));
        sink.publish_leak(&LeakMessage::from_frame(header, &frame));
        if let Some(aux) = feedback {
            sink.publish_servos_feedback(&ServosFeedbackMessage::new(header, aux));
        }

        let transforms = build_transforms(&frame, &snapshot);
        sink.send_transforms(&header, transforms.as_slice());

        debug!("Processed telemetry seq {} (depth {:.3} m)", seq, frame.depth);

        Ok(InboundReport {
            header,
            frame,
            snapshot,
            transforms,
            feedback_published: feedback.is_some(),
        })
    }

    /// 出站触发：更新缓存、编码并发送指令帧
    ///
    /// 发送失败只记录不重试，下一条指令会携带新的时间戳覆盖它。
    pub fn handle_command<T>(
        &self,
        input: &ServosInput,
        tx: &mut T,
    ) -> Result<CommandFrame, DriverError>
    where
        T: TxTransport + ?Sized,
    {
        if input.deltas.len() > self.n_servos {
            trace!(
                "Command carries {} deltas, only {} servos configured",
                input.deltas.len(),
                self.n_servos
            );
        }
        let frame = self
            .cache
            .commit_command(input.to_deltas(self.n_servos), self.elapsed_ms());
        let bytes = frame.to_bytes();

        match tx.send(&bytes) {
            Ok(()) => {
                self.metrics.tx_frames_sent.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Sent command t={}ms deltas={:?} sync={}",
                    frame.elapsed_ms,
                    frame.servo_deltas,
                    frame.sync.as_u32()
                );
                Ok(frame)
            },
            Err(e) => {
                self.metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
                error!("Failed to send command frame: {}", e);
                Err(e.into())
            },
        }
    }
}
