//! 上行遥测帧（控制器 → 主机）
//!
//! 基本布局 13 个 `f32`（52 字节）：
//!
//! ```text
//! [lin_acc.x y z][ang_vel.x y z][quat.x y z w][depth][temperature][leak]
//! ```
//!
//! 扩展布局在其后追加 5 个辅助 `f32`（共 72 字节），用作舵机反馈。
//! 两种布局都要求长度严格相等；桥接端按配置选择其一，不做自动探测。

use crate::ProtocolError;
use crate::schema::{FieldSpec, FrameSchema, WireValue};

/// 基本遥测帧长度（字节）
pub const TELEMETRY_BASE_LEN: usize = 52;
/// 扩展遥测帧长度（字节）
pub const TELEMETRY_EXTENDED_LEN: usize = 72;
/// 辅助字段数量
pub const AUXILIARY_COUNT: usize = 5;

pub const TELEMETRY_BASE: FrameSchema<13> = FrameSchema::new(
    "telemetry",
    [
        FieldSpec::f32("lin_acc_x"),
        FieldSpec::f32("lin_acc_y"),
        FieldSpec::f32("lin_acc_z"),
        FieldSpec::f32("ang_vel_x"),
        FieldSpec::f32("ang_vel_y"),
        FieldSpec::f32("ang_vel_z"),
        FieldSpec::f32("quat_x"),
        FieldSpec::f32("quat_y"),
        FieldSpec::f32("quat_z"),
        FieldSpec::f32("quat_w"),
        FieldSpec::f32("depth"),
        FieldSpec::f32("temperature"),
        FieldSpec::f32("leak"),
    ],
);

pub const TELEMETRY_EXTENDED: FrameSchema<18> = FrameSchema::new(
    "telemetry_extended",
    [
        FieldSpec::f32("lin_acc_x"),
        FieldSpec::f32("lin_acc_y"),
        FieldSpec::f32("lin_acc_z"),
        FieldSpec::f32("ang_vel_x"),
        FieldSpec::f32("ang_vel_y"),
        FieldSpec::f32("ang_vel_z"),
        FieldSpec::f32("quat_x"),
        FieldSpec::f32("quat_y"),
        FieldSpec::f32("quat_z"),
        FieldSpec::f32("quat_w"),
        FieldSpec::f32("depth"),
        FieldSpec::f32("temperature"),
        FieldSpec::f32("leak"),
        FieldSpec::f32("aux_1"),
        FieldSpec::f32("aux_2"),
        FieldSpec::f32("aux_3"),
        FieldSpec::f32("aux_4"),
        FieldSpec::f32("aux_5"),
    ],
);

const _: () = assert!(TELEMETRY_BASE.size() == TELEMETRY_BASE_LEN);
const _: () = assert!(TELEMETRY_EXTENDED.size() == TELEMETRY_EXTENDED_LEN);

/// 遥测帧布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FrameLayout {
    /// 13 个字段，52 字节
    #[default]
    Base,
    /// 13 个字段 + 5 个辅助字段，72 字节
    Extended,
}

impl FrameLayout {
    /// 该布局要求的数据报长度
    pub const fn frame_len(self) -> usize {
        match self {
            FrameLayout::Base => TELEMETRY_BASE_LEN,
            FrameLayout::Extended => TELEMETRY_EXTENDED_LEN,
        }
    }
}

impl std::str::FromStr for FrameLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" | "52" => Ok(FrameLayout::Base),
            "extended" | "72" => Ok(FrameLayout::Extended),
            other => Err(format!("unknown frame layout '{}' (expected base|extended)", other)),
        }
    }
}

/// 解码后的遥测帧
///
/// 每个数据报构造一次，用完即弃。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryFrame {
    /// 线加速度 [x, y, z]（m/s²）
    pub linear_acceleration: [f32; 3],
    /// 角速度 [x, y, z]（rad/s）
    pub angular_velocity: [f32; 3],
    /// 姿态四元数 [x, y, z, w]，原样透传，不做归一化
    pub orientation: [f32; 4],
    /// 深度（m，向下为正）
    pub depth: f32,
    /// 水温（°C）
    pub temperature: f32,
    /// 漏水传感器读数
    pub leak: f32,
    /// 辅助字段（仅扩展布局）
    pub auxiliary: Option<[f32; AUXILIARY_COUNT]>,
}

impl TelemetryFrame {
    /// 按指定布局解析
    ///
    /// # 错误
    /// - `ProtocolError::MalformedFrame`: 长度不等于 `layout.frame_len()`
    pub fn decode(bytes: &[u8], layout: FrameLayout) -> Result<Self, ProtocolError> {
        match layout {
            FrameLayout::Base => {
                let words = TELEMETRY_BASE.decode(bytes)?.map(WireValue::as_f32);
                Ok(Self::from_base_words(words, None))
            },
            FrameLayout::Extended => {
                let words = TELEMETRY_EXTENDED.decode(bytes)?.map(WireValue::as_f32);
                let (base, aux) = words.split_at(TELEMETRY_BASE.fields.len());
                let mut base_words = [0.0f32; 13];
                base_words.copy_from_slice(base);
                let mut aux_words = [0.0f32; AUXILIARY_COUNT];
                aux_words.copy_from_slice(aux);
                Ok(Self::from_base_words(base_words, Some(aux_words)))
            },
        }
    }

    fn from_base_words(words: [f32; 13], auxiliary: Option<[f32; AUXILIARY_COUNT]>) -> Self {
        let [ax, ay, az, gx, gy, gz, qx, qy, qz, qw, depth, temperature, leak] = words;
        Self {
            linear_acceleration: [ax, ay, az],
            angular_velocity: [gx, gy, gz],
            orientation: [qx, qy, qz, qw],
            depth,
            temperature,
            leak,
            auxiliary,
        }
    }

    /// 帧对应的布局（由是否携带辅助字段决定）
    pub fn layout(&self) -> FrameLayout {
        if self.auxiliary.is_some() {
            FrameLayout::Extended
        } else {
            FrameLayout::Base
        }
    }

    fn base_words(&self) -> [WireValue; 13] {
        let [ax, ay, az] = self.linear_acceleration;
        let [gx, gy, gz] = self.angular_velocity;
        let [qx, qy, qz, qw] = self.orientation;
        [
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
            qx,
            qy,
            qz,
            qw,
            self.depth,
            self.temperature,
            self.leak,
        ]
        .map(WireValue::F32)
    }

    /// 重新编码为线上字节（布局由 `layout()` 决定）
    ///
    /// 主要供控制器模拟端和测试使用。
    pub fn to_bytes(&self) -> Vec<u8> {
        let base = self.base_words();
        match self.auxiliary {
            None => TELEMETRY_BASE.encode(&base),
            Some(aux) => {
                let mut words = [WireValue::F32(0.0); 18];
                words[..13].copy_from_slice(&base);
                for (slot, value) in words[13..].iter_mut().zip(aux) {
                    *slot = WireValue::F32(value);
                }
                TELEMETRY_EXTENDED.encode(&words)
            },
        }
    }
}

impl TryFrom<&[u8]> for TelemetryFrame {
    type Error = ProtocolError;

    /// 按基本布局（52 字节）解析
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(bytes, FrameLayout::Base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_base_layout_offsets() {
        assert_eq!(TELEMETRY_BASE.offset_of("quat_x"), Some(24));
        assert_eq!(TELEMETRY_BASE.offset_of("depth"), Some(40));
        assert_eq!(TELEMETRY_BASE.offset_of("leak"), Some(48));
    }

    #[test]
    fn test_extended_schema_extends_base() {
        assert_eq!(&TELEMETRY_EXTENDED.fields[..13], &TELEMETRY_BASE.fields[..]);
        assert_eq!(TELEMETRY_EXTENDED.offset_of("aux_1"), Some(52));
    }

    #[test]
    fn test_decode_field_order() {
        let values: Vec<f32> = (1..=13).map(|i| i as f32).collect();
        let frame = TelemetryFrame::try_from(frame_bytes(&values).as_slice()).unwrap();

        assert_eq!(frame.linear_acceleration, [1.0, 2.0, 3.0]);
        assert_eq!(frame.angular_velocity, [4.0, 5.0, 6.0]);
        assert_eq!(frame.orientation, [7.0, 8.0, 9.0, 10.0]);
        assert_eq!(frame.depth, 11.0);
        assert_eq!(frame.temperature, 12.0);
        assert_eq!(frame.leak, 13.0);
        assert_eq!(frame.auxiliary, None);
        assert_eq!(frame.layout(), FrameLayout::Base);
    }

    #[test]
    fn test_decode_extended() {
        let values: Vec<f32> = (1..=18).map(|i| i as f32 * 0.5).collect();
        let frame =
            TelemetryFrame::decode(&frame_bytes(&values), FrameLayout::Extended).unwrap();

        assert_eq!(frame.leak, 6.5);
        assert_eq!(frame.auxiliary, Some([7.0, 7.5, 8.0, 8.5, 9.0]));
        assert_eq!(frame.layout(), FrameLayout::Extended);
    }

    #[test]
    fn test_base_layout_rejects_extended_datagram() {
        // 72 字节的数据报不会被当作 52 字节帧截断解析
        let bytes = vec![0u8; TELEMETRY_EXTENDED_LEN];
        assert_eq!(
            TelemetryFrame::decode(&bytes, FrameLayout::Base),
            Err(ProtocolError::MalformedFrame {
                expected: 52,
                actual: 72
            })
        );
    }

    #[test]
    fn test_extended_layout_rejects_between_lengths() {
        // 52..72 之间的长度在扩展布局下同样被拒绝（不会越界读取）
        for len in [52usize, 60, 71, 73] {
            let bytes = vec![0u8; len];
            assert_eq!(
                TelemetryFrame::decode(&bytes, FrameLayout::Extended),
                Err(ProtocolError::MalformedFrame {
                    expected: 72,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_depth_only_frame() {
        let mut values = [0.0f32; 13];
        values[10] = 1.5;
        let frame = TelemetryFrame::try_from(frame_bytes(&values).as_slice()).unwrap();

        assert_eq!(frame.depth, 1.5);
        assert_eq!(frame.temperature, 0.0);
        assert_eq!(frame.leak, 0.0);
        assert_eq!(frame.orientation, [0.0; 4]);
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("base".parse::<FrameLayout>(), Ok(FrameLayout::Base));
        assert_eq!("Extended".parse::<FrameLayout>(), Ok(FrameLayout::Extended));
        assert_eq!("72".parse::<FrameLayout>(), Ok(FrameLayout::Extended));
        assert!("huge".parse::<FrameLayout>().is_err());
    }

    proptest! {
        #[test]
        fn decode_is_deterministic_and_reencodes(bytes in prop::collection::vec(any::<u8>(), 52)) {
            let a = TelemetryFrame::try_from(bytes.as_slice()).unwrap();
            let b = TelemetryFrame::try_from(bytes.as_slice()).unwrap();
            // NaN 载荷按位比较，避免 NaN != NaN
            prop_assert_eq!(a.to_bytes(), b.to_bytes());
            prop_assert_eq!(a.to_bytes(), bytes);
        }

        #[test]
        fn decode_rejects_wrong_length(len in 0usize..256) {
            prop_assume!(len != TELEMETRY_BASE_LEN);
            let bytes = vec![0u8; len];
            prop_assert_eq!(
                TelemetryFrame::try_from(bytes.as_slice()),
                Err(ProtocolError::MalformedFrame { expected: 52, actual: len })
            );
        }
    }
}
