//! 下行舵机指令帧（主机 → 控制器）
//!
//! 布局 7 个字段（28 字节）：
//!
//! ```text
//! [elapsed_ms: u32][delta_1..4: f32][reserved: f32 = 0.0][sync: u32 = 0|1]
//! ```
//!
//! `elapsed_ms` 与 `sync` 按控制器固件的约定以原始 `u32` 字写入，
//! 其余字段为 IEEE-754 `f32`。

use crate::ProtocolError;
use crate::schema::{FieldSpec, FrameSchema, WireValue};

/// 指令帧长度（字节）
pub const COMMAND_FRAME_LEN: usize = 28;
/// 可指令的舵机通道数（第 5 通道保留，恒为 0）
pub const COMMANDED_SERVOS: usize = 4;
/// 物理舵机通道总数
pub const SERVO_CHANNELS: usize = 5;

pub const COMMAND: FrameSchema<7> = FrameSchema::new(
    "servo_command",
    [
        FieldSpec::u32("elapsed_ms"),
        FieldSpec::f32("delta_1"),
        FieldSpec::f32("delta_2"),
        FieldSpec::f32("delta_3"),
        FieldSpec::f32("delta_4"),
        FieldSpec::f32("reserved"),
        FieldSpec::u32("sync"),
    ],
);

const _: () = assert!(COMMAND.size() == COMMAND_FRAME_LEN);

/// 同步标志
///
/// 桥接启动后的第一帧指令携带 `Sync`，之后恒为 `NotSynced`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum SyncFlag {
    #[default]
    NotSynced = 0,
    Sync = 1,
}

impl SyncFlag {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_sync(self) -> bool {
        self == SyncFlag::Sync
    }
}

impl From<u32> for SyncFlag {
    fn from(value: u32) -> Self {
        match value {
            0 => SyncFlag::NotSynced,
            _ => SyncFlag::Sync,
        }
    }
}

/// 舵机指令帧
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CommandFrame {
    /// 桥接启动以来的毫秒数（约 49.7 天回绕）
    pub elapsed_ms: u32,
    /// 通道 1-4 的舵角增量（rad）
    pub servo_deltas: [f32; COMMANDED_SERVOS],
    /// 同步标志
    pub sync: SyncFlag,
}

impl CommandFrame {
    pub fn new(elapsed_ms: u32, servo_deltas: [f32; COMMANDED_SERVOS], sync: SyncFlag) -> Self {
        Self {
            elapsed_ms,
            servo_deltas,
            sync,
        }
    }

    fn words(&self) -> [WireValue; 7] {
        let [d1, d2, d3, d4] = self.servo_deltas;
        [
            WireValue::U32(self.elapsed_ms),
            WireValue::F32(d1),
            WireValue::F32(d2),
            WireValue::F32(d3),
            WireValue::F32(d4),
            WireValue::F32(0.0),
            WireValue::U32(self.sync.as_u32()),
        ]
    }

    /// 编码为 28 字节
    pub fn to_bytes(&self) -> [u8; COMMAND_FRAME_LEN] {
        let mut buf = [0u8; COMMAND_FRAME_LEN];
        COMMAND.write_into(&self.words(), &mut buf);
        buf
    }

    /// 解析 28 字节指令帧（控制器模拟端使用）
    ///
    /// 保留字段被忽略。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let [elapsed, d1, d2, d3, d4, _reserved, sync] = COMMAND.decode(bytes)?;
        Ok(Self {
            elapsed_ms: elapsed.as_u32(),
            servo_deltas: [d1, d2, d3, d4].map(WireValue::as_f32),
            sync: SyncFlag::from(sync.as_u32()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_layout() {
        let frame = CommandFrame::new(1234, [0.1, -0.2, 0.3, -0.4], SyncFlag::Sync);
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), COMMAND_FRAME_LEN);
        assert_eq!(&bytes[0..4], &1234u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0.1f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &(-0.2f32).to_le_bytes());
        assert_eq!(&bytes[12..16], &0.3f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &(-0.4f32).to_le_bytes());
        assert_eq!(&bytes[20..24], &0.0f32.to_le_bytes());
        assert_eq!(&bytes[24..28], &1u32.to_le_bytes());
    }

    #[test]
    fn test_reserved_slot_is_zero() {
        let frame = CommandFrame::new(u32::MAX, [f32::MAX; 4], SyncFlag::NotSynced);
        let bytes = frame.to_bytes();
        assert_eq!(COMMAND.offset_of("reserved"), Some(20));
        assert_eq!(&bytes[20..24], &[0, 0, 0, 0]);
        assert_eq!(&bytes[24..28], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_from_bytes() {
        let frame = CommandFrame::new(42, [1.0, 2.0, 3.0, 4.0], SyncFlag::Sync);
        let parsed = CommandFrame::from_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        assert_eq!(
            CommandFrame::from_bytes(&[0u8; 27]),
            Err(ProtocolError::MalformedFrame {
                expected: 28,
                actual: 27
            })
        );
    }

    #[test]
    fn test_sync_flag_from_u32() {
        assert_eq!(SyncFlag::from(0), SyncFlag::NotSynced);
        assert_eq!(SyncFlag::from(1), SyncFlag::Sync);
        assert!(SyncFlag::Sync.is_sync());
        assert_eq!(SyncFlag::default(), SyncFlag::NotSynced);
    }
}
