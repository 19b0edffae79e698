//! 执行器状态缓存
//!
//! 入站路径（遥测）和出站路径（指令）共享的唯一可变状态。
//!
//! 同步机制：单个 `parking_lot::Mutex` 保护整个结构。
//! 调用频率为几 Hz 到几十 Hz，锁只在拷贝/覆写期间持有，
//! 绝不跨越传输层调用。

use paravane_protocol::{
    COMMAND_FRAME_LEN, COMMANDED_SERVOS, CommandFrame, SERVO_CHANNELS, SyncFlag,
};
use parking_lot::Mutex;

/// 同步握手状态
///
/// 显式状态迁移：`Uninitialized --(第一次编码)--> Synced`，之后不再回退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// 尚未发出任何指令帧，下一帧携带同步标志
    #[default]
    Uninitialized,
    /// 已发出同步帧
    Synced,
}

impl SyncState {
    /// 当前状态下下一帧应携带的同步标志（不消费）
    pub fn pending_flag(self) -> SyncFlag {
        match self {
            SyncState::Uninitialized => SyncFlag::Sync,
            SyncState::Synced => SyncFlag::NotSynced,
        }
    }

    /// 消费握手：返回本帧的同步标志并迁移到 `Synced`
    pub fn consume(&mut self) -> SyncFlag {
        let flag = self.pending_flag();
        *self = SyncState::Synced;
        flag
    }
}

/// 状态快照（无撕裂拷贝）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActuatorSnapshot {
    /// 最近一次指令的舵角增量 [ch1..ch5]，ch5 恒为 0
    pub commanded: [f32; SERVO_CHANNELS],
    /// 最近一次舵机反馈 [ch1..ch5]
    pub feedback: [f32; SERVO_CHANNELS],
    /// 同步握手状态
    pub sync: SyncState,
}

impl ActuatorSnapshot {
    /// 指令通道（1 起始编号），越界返回 0.0
    pub fn commanded_channel(&self, channel: usize) -> f32 {
        channel
            .checked_sub(1)
            .and_then(|i| self.commanded.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// 反馈通道（1 起始编号），越界返回 0.0
    pub fn feedback_channel(&self, channel: usize) -> f32 {
        channel
            .checked_sub(1)
            .and_then(|i| self.feedback.get(i))
            .copied()
            .unwrap_or(0.0)
    }
}

/// 执行器状态缓存
///
/// # Example
///
/// ```
/// use paravane_driver::ActuatorStateCache;
/// use paravane_protocol::SyncFlag;
///
/// let cache = ActuatorStateCache::new();
/// let first = cache.commit_command([0.1, 0.2, 0.3, 0.4], 10);
/// let second = cache.commit_command([0.0; 4], 20);
/// assert_eq!(first.sync, SyncFlag::Sync);
/// assert_eq!(second.sync, SyncFlag::NotSynced);
/// assert_eq!(cache.snapshot().commanded, [0.0; 5]);
/// ```
#[derive(Debug, Default)]
pub struct ActuatorStateCache {
    inner: Mutex<ActuatorSnapshot>,
}

impl ActuatorStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 原子读取全部状态
    pub fn snapshot(&self) -> ActuatorSnapshot {
        *self.inner.lock()
    }

    /// 覆写通道 1-4 的指令值，通道 5 置 0
    pub fn update_commanded(&self, deltas: [f32; COMMANDED_SERVOS]) {
        let mut inner = self.inner.lock();
        write_commanded(&mut inner, deltas);
    }

    /// 覆写全部 5 个反馈值
    pub fn update_feedback(&self, feedback: [f32; SERVO_CHANNELS]) {
        self.inner.lock().feedback = feedback;
    }

    /// 覆写反馈值并返回覆写后的快照（一次加锁内完成）
    pub fn update_feedback_snapshot(&self, feedback: [f32; SERVO_CHANNELS]) -> ActuatorSnapshot {
        let mut inner = self.inner.lock();
        inner.feedback = feedback;
        *inner
    }

    /// 以当前缓存的指令值编码指令帧，并消费同步标志
    pub fn encode_command(&self, elapsed_ms: u32) -> [u8; COMMAND_FRAME_LEN] {
        let frame = {
            let mut inner = self.inner.lock();
            let mut deltas = [0.0f32; COMMANDED_SERVOS];
            deltas.copy_from_slice(&inner.commanded[..COMMANDED_SERVOS]);
            CommandFrame::new(elapsed_ms, deltas, inner.sync.consume())
        };
        frame.to_bytes()
    }

    /// 写入新指令并生成对应指令帧（一次加锁内完成）
    ///
    /// 并发的两次出站触发不会交叉：每一帧携带的正是它自己写入的指令值。
    pub fn commit_command(&self, deltas: [f32; COMMANDED_SERVOS], elapsed_ms: u32) -> CommandFrame {
        let mut inner = self.inner.lock();
        write_commanded(&mut inner, deltas);
        CommandFrame::new(elapsed_ms, deltas, inner.sync.consume())
    }
}

fn write_commanded(state: &mut ActuatorSnapshot, deltas: [f32; COMMANDED_SERVOS]) {
    state.commanded[..COMMANDED_SERVOS].copy_from_slice(&deltas);
    state.commanded[COMMANDED_SERVOS] = 0.0;
}
