//! 坐标变换树
//!
//! 每个入站遥测帧重新计算 6 个刚体变换：
//!
//! ```text
//! world → boat → paravane → { main_wing, actuator1, actuator2, actuator3 }
//! ```
//!
//! 几何规则固定（不可配置）：
//! - `world → boat`：平移 (0, 0, 0.25)，无旋转。船体位姿暂不来自遥测。
//! - `boat → paravane`：平移 (-5, 0, -depth)，旋转为遥测四元数原样。
//! - `paravane → main_wing`：平移 (0.1, 0, 0)，绕俯仰轴转过指令通道 1 的舵角。
//! - `paravane → actuatorN`：固定安装位置，绕偏航轴转过反馈通道 N+1 的舵角。
//!
//! 角度单位为弧度；单轴旋转按 roll-pitch-yaw 组合构造，其余两轴为 0。

use crate::state::ActuatorSnapshot;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use paravane_protocol::TelemetryFrame;

/// 坐标系名称
pub mod frames {
    pub const WORLD: &str = "world";
    pub const BOAT: &str = "boat";
    pub const PARAVANE: &str = "paravane";
    pub const MAIN_WING: &str = "main_wing";
    pub const ACTUATOR1: &str = "actuator1";
    pub const ACTUATOR2: &str = "actuator2";
    pub const ACTUATOR3: &str = "actuator3";
}

/// 船体坐标系在世界坐标系中的高度（m）
const BOAT_OFFSET: [f64; 3] = [0.0, 0.0, 0.25];
/// 拖曳体相对船体的拖缆水平距离（m）
const TOW_OFFSET_X: f64 = -5.0;
/// 主翼铰接点相对拖曳体的位置（m）
const MAIN_WING_OFFSET: [f64; 3] = [0.1, 0.0, 0.0];
/// 主翼使用的指令通道
const MAIN_WING_CHANNEL: usize = 1;

/// 单轴旋转轴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    /// 绕该轴旋转 `angle` 弧度的四元数
    pub fn rotation(self, angle: f64) -> Quaternion<f64> {
        let (roll, pitch, yaw) = match self {
            Axis::Roll => (angle, 0.0, 0.0),
            Axis::Pitch => (0.0, angle, 0.0),
            Axis::Yaw => (0.0, 0.0, angle),
        };
        UnitQuaternion::from_euler_angles(roll, pitch, yaw).into_inner()
    }
}

/// 尾翼执行器安装参数
struct ActuatorMount {
    child: &'static str,
    translation: [f64; 3],
    axis: Axis,
    feedback_channel: usize,
}

// 下尾翼居中；左右尾翼关于 xz 平面对称
const ACTUATOR_MOUNTS: [ActuatorMount; 3] = [
    ActuatorMount {
        child: frames::ACTUATOR1,
        translation: [-0.2, 0.0, 0.05],
        axis: Axis::Yaw,
        feedback_channel: 2,
    },
    ActuatorMount {
        child: frames::ACTUATOR2,
        translation: [-0.2, 0.02, -0.035],
        axis: Axis::Yaw,
        feedback_channel: 3,
    },
    ActuatorMount {
        child: frames::ACTUATOR3,
        translation: [-0.2, -0.02, -0.035],
        axis: Axis::Yaw,
        feedback_channel: 4,
    },
];

/// 带父子关系的刚体位姿
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformNode {
    pub parent: &'static str,
    pub child: &'static str,
    pub translation: Vector3<f64>,
    /// 旋转（不保证单位长度：`paravane` 节点原样转发遥测四元数）
    pub rotation: Quaternion<f64>,
}

impl TransformNode {
    fn new(
        parent: &'static str,
        child: &'static str,
        translation: [f64; 3],
        rotation: Quaternion<f64>,
    ) -> Self {
        Self {
            parent,
            child,
            translation: Vector3::from(translation),
            rotation,
        }
    }
}

/// 一帧对应的完整变换树（按父 → 子顺序排列）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformTree {
    nodes: [TransformNode; 6],
}

impl TransformTree {
    /// 发布顺序的节点切片
    pub fn as_slice(&self) -> &[TransformNode] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransformNode> {
        self.nodes.iter()
    }

    /// 按子坐标系名称查找
    pub fn get(&self, child: &str) -> Option<&TransformNode> {
        self.nodes.iter().find(|node| node.child == child)
    }
}

impl<'a> IntoIterator for &'a TransformTree {
    type Item = &'a TransformNode;
    type IntoIter = std::slice::Iter<'a, TransformNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// 由遥测帧和缓存快照推导变换树
///
/// 纯函数；缓存为零值时得到静止位姿。
pub fn build_transforms(frame: &TelemetryFrame, snapshot: &ActuatorSnapshot) -> TransformTree {
    let [qx, qy, qz, qw] = frame.orientation.map(f64::from);

    let boat = TransformNode::new(
        frames::WORLD,
        frames::BOAT,
        BOAT_OFFSET,
        Quaternion::identity(),
    );

    let paravane = TransformNode::new(
        frames::BOAT,
        frames::PARAVANE,
        [TOW_OFFSET_X, 0.0, -f64::from(frame.depth)],
        Quaternion::new(qw, qx, qy, qz),
    );

    let main_wing = TransformNode::new(
        frames::PARAVANE,
        frames::MAIN_WING,
        MAIN_WING_OFFSET,
        Axis::Pitch.rotation(snapshot.commanded_channel(MAIN_WING_CHANNEL).into()),
    );

    let [act1, act2, act3] = ACTUATOR_MOUNTS.map(|mount| {
        TransformNode::new(
            frames::PARAVANE,
            mount.child,
            mount.translation,
            mount
                .axis
                .rotation(snapshot.feedback_channel(mount.feedback_channel).into()),
        )
    });

    TransformTree {
        nodes: [boat, paravane, main_wing, act1, act2, act3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn assert_quat(q: &Quaternion<f64>, x: f64, y: f64, z: f64, w: f64) {
        assert_relative_eq!(q.i, x, epsilon = 1e-9);
        assert_relative_eq!(q.j, y, epsilon = 1e-9);
        assert_relative_eq!(q.k, z, epsilon = 1e-9);
        assert_relative_eq!(q.w, w, epsilon = 1e-9);
    }

    fn sample_frame(depth: f32) -> TelemetryFrame {
        TelemetryFrame {
            orientation: [0.1, 0.2, 0.3, 0.9],
            depth,
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_geometry() {
        let snapshot = ActuatorSnapshot {
            commanded: [0.3, 0.0, 0.0, 0.0, 0.0],
            feedback: [0.0, 0.1, 0.2, 0.3, 0.0],
            ..Default::default()
        };
        let tree = build_transforms(&sample_frame(2.0), &snapshot);

        let paravane = tree.get(frames::PARAVANE).unwrap();
        assert_relative_eq!(paravane.translation.z, -2.0);
        assert_relative_eq!(paravane.translation.x, -5.0);
        assert_quat(
            &paravane.rotation,
            0.1f32 as f64,
            0.2f32 as f64,
            0.3f32 as f64,
            0.9f32 as f64,
        );

        // 指令值以 f32 缓存，期望值按同样的精度计算
        let wing = tree.get(frames::MAIN_WING).unwrap();
        let half = f64::from(0.3f32) / 2.0;
        assert_quat(&wing.rotation, 0.0, half.sin(), 0.0, half.cos());

        for (child, angle) in [
            (frames::ACTUATOR1, 0.1f32),
            (frames::ACTUATOR2, 0.2f32),
            (frames::ACTUATOR3, 0.3f32),
        ] {
            let half = f64::from(angle) / 2.0;
            let node = tree.get(child).unwrap();
            assert_quat(&node.rotation, 0.0, 0.0, half.sin(), half.cos());
        }
    }

    #[test]
    fn test_rest_pose_with_empty_cache() {
        let tree = build_transforms(&sample_frame(0.0), &ActuatorSnapshot::default());

        let boat = tree.get(frames::BOAT).unwrap();
        assert_eq!(boat.translation, Vector3::new(0.0, 0.0, 0.25));
        assert_quat(&boat.rotation, 0.0, 0.0, 0.0, 1.0);

        for child in [
            frames::MAIN_WING,
            frames::ACTUATOR1,
            frames::ACTUATOR2,
            frames::ACTUATOR3,
        ] {
            assert_quat(&tree.get(child).unwrap().rotation, 0.0, 0.0, 0.0, 1.0);
        }
    }

    #[test]
    fn test_publish_order_parent_before_child() {
        let tree = build_transforms(&sample_frame(1.0), &ActuatorSnapshot::default());
        let children: Vec<_> = tree.iter().map(|n| n.child).collect();
        assert_eq!(
            children,
            vec![
                frames::BOAT,
                frames::PARAVANE,
                frames::MAIN_WING,
                frames::ACTUATOR1,
                frames::ACTUATOR2,
                frames::ACTUATOR3,
            ]
        );

        let mut known: HashSet<&str> = HashSet::from([frames::WORLD]);
        for node in &tree {
            assert!(known.contains(node.parent), "{} before its parent", node.child);
            known.insert(node.child);
        }
    }

    #[test]
    fn test_actuator_mounts_are_distinct() {
        let tree = build_transforms(&sample_frame(0.0), &ActuatorSnapshot::default());
        let a1 = tree.get(frames::ACTUATOR1).unwrap().translation;
        let a2 = tree.get(frames::ACTUATOR2).unwrap().translation;
        let a3 = tree.get(frames::ACTUATOR3).unwrap().translation;
        assert_ne!(a1, a2);
        assert_ne!(a2, a3);
        assert_ne!(a1, a3);
    }

    #[test]
    fn test_zero_orientation_passes_through() {
        let frame = TelemetryFrame {
            depth: 1.5,
            ..Default::default()
        };
        let tree = build_transforms(&frame, &ActuatorSnapshot::default());
        let paravane = tree.get(frames::PARAVANE).unwrap();
        assert_eq!(paravane.rotation, Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(paravane.translation, Vector3::new(-5.0, 0.0, -1.5));
    }

    #[test]
    fn test_axis_rotation_roll() {
        let q = Axis::Roll.rotation(0.4);
        assert_quat(&q, (0.2f64).sin(), 0.0, 0.0, (0.2f64).cos());
    }
}
