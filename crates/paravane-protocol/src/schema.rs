//! 帧布局描述（Schema）
//!
//! 每种帧都由一个有序字段列表描述，字段宽度固定 4 字节、小端序。
//! 解析与构建只经过本模块的 `decode` / `write_into` 两个通用例程，
//! 上层不再手写偏移量运算。
//!
//! 字段数量 `N` 是类型参数，解析结果 `[WireValue; N]` 可以直接在调用处解构，
//! 字段增删时编译器会指出所有需要同步修改的位置。

use crate::{
    ProtocolError, bytes_to_f32_le, bytes_to_u32_le, f32_to_bytes_le, u32_to_bytes_le,
};

/// 单个字段的字节宽度
pub const WORD_SIZE: usize = 4;

/// 字段的线上类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldKind {
    /// IEEE-754 单精度浮点
    F32,
    /// 无符号 32 位整数
    U32,
}

/// 字段描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn f32(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::F32,
        }
    }

    pub const fn u32(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::U32,
        }
    }
}

/// 单个字段的取值（已按 `FieldKind` 解释）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue {
    F32(f32),
    U32(u32),
}

impl WireValue {
    /// 数值意义上的 f32（`U32` 字段按数值转换）
    pub fn as_f32(self) -> f32 {
        match self {
            WireValue::F32(v) => v,
            WireValue::U32(v) => v as f32,
        }
    }

    /// 数值意义上的 u32（`F32` 字段截断取整，负数饱和为 0）
    pub fn as_u32(self) -> u32 {
        match self {
            WireValue::F32(v) => v as u32,
            WireValue::U32(v) => v,
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            WireValue::F32(_) => FieldKind::F32,
            WireValue::U32(_) => FieldKind::U32,
        }
    }

    pub fn to_le_bytes(self) -> [u8; WORD_SIZE] {
        match self {
            WireValue::F32(v) => f32_to_bytes_le(v),
            WireValue::U32(v) => u32_to_bytes_le(v),
        }
    }

    fn from_le_bytes(kind: FieldKind, bytes: [u8; WORD_SIZE]) -> Self {
        match kind {
            FieldKind::F32 => WireValue::F32(bytes_to_f32_le(bytes)),
            FieldKind::U32 => WireValue::U32(bytes_to_u32_le(bytes)),
        }
    }
}

/// 定长帧布局
///
/// # Example
///
/// ```
/// use paravane_protocol::schema::{FieldSpec, FrameSchema, WireValue};
///
/// const PAIR: FrameSchema<2> = FrameSchema::new(
///     "pair",
///     [FieldSpec::u32("counter"), FieldSpec::f32("value")],
/// );
///
/// let mut buf = [0u8; 8];
/// PAIR.write_into(&[WireValue::U32(7), WireValue::F32(0.5)], &mut buf);
/// let [counter, value] = PAIR.decode(&buf).unwrap();
/// assert_eq!(counter, WireValue::U32(7));
/// assert_eq!(value, WireValue::F32(0.5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchema<const N: usize> {
    pub name: &'static str,
    pub fields: [FieldSpec; N],
}

impl<const N: usize> FrameSchema<N> {
    pub const fn new(name: &'static str, fields: [FieldSpec; N]) -> Self {
        Self { name, fields }
    }

    /// 帧总长度（字节）
    pub const fn size(&self) -> usize {
        N * WORD_SIZE
    }

    /// 字段的字节偏移
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name).map(|i| i * WORD_SIZE)
    }

    /// 按布局解析整帧
    ///
    /// 长度必须与 `size()` 完全相等，否则返回 `MalformedFrame`，不做任何部分解析。
    pub fn decode(&self, bytes: &[u8]) -> Result<[WireValue; N], ProtocolError> {
        if bytes.len() != self.size() {
            return Err(ProtocolError::MalformedFrame {
                expected: self.size(),
                actual: bytes.len(),
            });
        }

        let mut values = [WireValue::U32(0); N];
        for ((value, field), chunk) in values
            .iter_mut()
            .zip(self.fields.iter())
            .zip(bytes.chunks_exact(WORD_SIZE))
        {
            let word = [chunk[0], chunk[1], chunk[2], chunk[3]];
            *value = WireValue::from_le_bytes(field.kind, word);
        }
        Ok(values)
    }

    /// 按布局写入整帧
    ///
    /// 返回实际写入的字节数。`out` 短于 `size()` 时只写入能容纳的完整字段。
    pub fn write_into(&self, values: &[WireValue; N], out: &mut [u8]) -> usize {
        let mut written = 0;
        for ((value, field), chunk) in values
            .iter()
            .zip(self.fields.iter())
            .zip(out.chunks_exact_mut(WORD_SIZE))
        {
            debug_assert_eq!(
                value.kind(),
                field.kind,
                "{}.{} kind mismatch",
                self.name,
                field.name
            );
            chunk.copy_from_slice(&value.to_le_bytes());
            written += WORD_SIZE;
        }
        written
    }

    /// 按布局构建整帧（堆分配版本）
    pub fn encode(&self, values: &[WireValue; N]) -> Vec<u8> {
        let mut out = vec![0u8; self.size()];
        self.write_into(values, &mut out);
        out
    }
}
