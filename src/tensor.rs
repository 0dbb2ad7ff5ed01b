// 该文件是 Kanjian （看见） 项目的一部分。
// src/tensor.rs - 输入/输出张量定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Kanjian Contributors

use std::str::FromStr;

use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;
/// 每个检测槽位的字段数：x, y, width, height, confidence, classLabel
pub const SLOT_FIELDS: usize = 6;

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("图像尺寸不匹配: 期望 {expected_width}x{expected_height}, 实际 {actual_width}x{actual_height}")]
  ShapeMismatch {
    expected_width: u32,
    expected_height: u32,
    actual_width: u32,
    actual_height: u32,
  },
  #[error("未知的字节序: {0}")]
  UnknownByteOrder(String),
}

/// 张量与推理引擎之间交换原始字节时使用的字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
  #[default]
  Native,
  Little,
  Big,
}

impl ByteOrder {
  pub fn f32_to_bytes(self, value: f32) -> [u8; F32_BYTES] {
    match self {
      ByteOrder::Native => value.to_ne_bytes(),
      ByteOrder::Little => value.to_le_bytes(),
      ByteOrder::Big => value.to_be_bytes(),
    }
  }

  pub fn f32_from_bytes(self, bytes: [u8; F32_BYTES]) -> f32 {
    match self {
      ByteOrder::Native => f32::from_ne_bytes(bytes),
      ByteOrder::Little => f32::from_le_bytes(bytes),
      ByteOrder::Big => f32::from_be_bytes(bytes),
    }
  }

  /// 将浮点序列按当前字节序写成连续字节
  pub fn encode_f32s(self, values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * F32_BYTES);
    for value in values {
      bytes.extend_from_slice(&self.f32_to_bytes(*value));
    }
    bytes
  }

  /// 将连续字节按当前字节序解析为浮点序列，长度必须是 4 的整数倍
  pub fn decode_f32s(self, bytes: &[u8]) -> Result<Vec<f32>, TensorError> {
    if bytes.len() % F32_BYTES != 0 {
      return Err(TensorError::LengthMismatch {
        expected: bytes.len().div_ceil(F32_BYTES) * F32_BYTES,
        actual: bytes.len(),
      });
    }

    Ok(
      bytes
        .chunks_exact(F32_BYTES)
        .map(|chunk| self.f32_from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect(),
    )
  }
}

impl FromStr for ByteOrder {
  type Err = TensorError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "native" | "ne" => Ok(ByteOrder::Native),
      "little" | "le" => Ok(ByteOrder::Little),
      "big" | "be" => Ok(ByteOrder::Big),
      other => Err(TensorError::UnknownByteOrder(other.to_string())),
    }
  }
}

/// 模型输入张量，S 为正方形输入边长
///
/// 按行优先的像素顺序存放，每个像素的三个通道值连续排列，取值范围 [0, 1]。
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor<const S: u32> {
  data: Box<[f32]>,
}

impl<const S: u32> InputTensor<S> {
  pub const LEN: usize = {
    assert!(S > 0, "输入边长必须为正数");
    RGB_CHANNELS * S as usize * S as usize
  };
  pub const BYTE_LEN: usize = Self::LEN * F32_BYTES;

  pub fn side(&self) -> u32 {
    S
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  /// 返回 (x, y) 处像素的三个通道值
  pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; RGB_CHANNELS]> {
    if x >= S || y >= S {
      return None;
    }
    let offset = (y as usize * S as usize + x as usize) * RGB_CHANNELS;
    Some([
      self.data[offset],
      self.data[offset + 1],
      self.data[offset + 2],
    ])
  }

  pub fn to_bytes(&self, order: ByteOrder) -> Vec<u8> {
    order.encode_f32s(&self.data)
  }
}

impl<const S: u32> TryFrom<Vec<f32>> for InputTensor<S> {
  type Error = TensorError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(TensorError::LengthMismatch {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const S: u32> Default for InputTensor<S> {
  fn default() -> Self {
    Self {
      data: vec![0.0; Self::LEN].into_boxed_slice(),
    }
  }
}

/// 输出张量中的一个检测槽位
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Slot {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
  pub confidence: f32,
  pub class_label: f32,
}

impl Slot {
  fn from_fields(fields: &[f32]) -> Self {
    Self {
      x: fields[0],
      y: fields[1],
      width: fields[2],
      height: fields[3],
      confidence: fields[4],
      class_label: fields[5],
    }
  }

  pub fn to_fields(&self) -> [f32; SLOT_FIELDS] {
    [
      self.x,
      self.y,
      self.width,
      self.height,
      self.confidence,
      self.class_label,
    ]
  }
}

/// 模型输出张量，D 为最大检测数
///
/// 第 i 个槽位占据 `[i * 6, i * 6 + 6)`，字段顺序固定为
/// x, y, width, height, confidence, classLabel。
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor<const D: usize> {
  data: Box<[f32]>,
}

impl<const D: usize> OutputTensor<D> {
  pub const LEN: usize = {
    assert!(D > 0, "最大检测数必须为正数");
    D * SLOT_FIELDS
  };
  pub const BYTE_LEN: usize = Self::LEN * F32_BYTES;

  pub fn max_detections(&self) -> usize {
    D
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn slot(&self, index: usize) -> Option<Slot> {
    if index >= D {
      return None;
    }
    let start = index * SLOT_FIELDS;
    Some(Slot::from_fields(&self.data[start..start + SLOT_FIELDS]))
  }

  pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
    self.data.chunks_exact(SLOT_FIELDS).map(Slot::from_fields)
  }

  /// 覆写第 `index` 个槽位，越界属于调用方的编程错误
  pub fn set_slot(&mut self, index: usize, slot: Slot) {
    assert!(index < D, "槽位索引越界: {} >= {}", index, D);
    let start = index * SLOT_FIELDS;
    self.data[start..start + SLOT_FIELDS].copy_from_slice(&slot.to_fields());
  }

  pub fn from_bytes(bytes: &[u8], order: ByteOrder) -> Result<Self, TensorError> {
    if bytes.len() != Self::BYTE_LEN {
      return Err(TensorError::LengthMismatch {
        expected: Self::BYTE_LEN,
        actual: bytes.len(),
      });
    }
    Self::try_from(order.decode_f32s(bytes)?)
  }

  pub fn to_bytes(&self, order: ByteOrder) -> Vec<u8> {
    order.encode_f32s(&self.data)
  }
}

impl<const D: usize> TryFrom<Vec<f32>> for OutputTensor<D> {
  type Error = TensorError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(TensorError::LengthMismatch {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const D: usize> Default for OutputTensor<D> {
  fn default() -> Self {
    Self {
      data: vec![0.0; Self::LEN].into_boxed_slice(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tensor_lengths_follow_shape() {
    assert_eq!(InputTensor::<300>::LEN, 3 * 300 * 300);
    assert_eq!(InputTensor::<300>::BYTE_LEN, 4 * 300 * 300 * 3);
    assert_eq!(OutputTensor::<10>::LEN, 60);
    assert_eq!(OutputTensor::<10>::BYTE_LEN, 4 * 10 * 6);
  }

  #[test]
  fn wrong_length_is_rejected() {
    let err = OutputTensor::<10>::try_from(vec![0.0; 59]).unwrap_err();
    assert_eq!(
      err,
      TensorError::LengthMismatch {
        expected: 60,
        actual: 59
      }
    );

    let err = InputTensor::<2>::try_from(vec![0.0; 13]).unwrap_err();
    assert!(matches!(err, TensorError::LengthMismatch { expected: 12, .. }));

    let err = OutputTensor::<10>::from_bytes(&[0u8; 4 * 61], ByteOrder::Native).unwrap_err();
    assert!(matches!(err, TensorError::LengthMismatch { expected: 240, .. }));
  }

  #[test]
  fn slots_are_read_by_index() {
    let mut data = vec![0.0f32; 3 * SLOT_FIELDS];
    data[SLOT_FIELDS..2 * SLOT_FIELDS].copy_from_slice(&[0.1, 0.2, 0.3, 0.4, 0.9, 7.0]);
    let tensor = OutputTensor::<3>::try_from(data).unwrap();

    let slot = tensor.slot(1).unwrap();
    assert_eq!(slot.x, 0.1);
    assert_eq!(slot.height, 0.4);
    assert_eq!(slot.confidence, 0.9);
    assert_eq!(slot.class_label, 7.0);
    assert_eq!(tensor.slot(0), Some(Slot::default()));
    assert_eq!(tensor.slot(3), None);
    assert_eq!(tensor.slots().count(), 3);
  }

  #[test]
  fn set_slot_writes_fields_in_order() {
    let mut tensor = OutputTensor::<2>::default();
    let slot = Slot {
      x: 1.0,
      y: 2.0,
      width: 3.0,
      height: 4.0,
      confidence: 5.0,
      class_label: 6.0,
    };
    tensor.set_slot(1, slot);
    assert_eq!(
      tensor.as_slice(),
      &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
  }

  #[test]
  fn byte_order_is_explicit() {
    let le = ByteOrder::Little.encode_f32s(&[1.0]);
    let be = ByteOrder::Big.encode_f32s(&[1.0]);
    assert_eq!(le, vec![0x00, 0x00, 0x80, 0x3f]);
    assert_eq!(be, vec![0x3f, 0x80, 0x00, 0x00]);
    assert_eq!(ByteOrder::Native.encode_f32s(&[1.0]), 1.0f32.to_ne_bytes().to_vec());

    assert_eq!(ByteOrder::Big.decode_f32s(&be).unwrap(), vec![1.0]);
    assert!(ByteOrder::Little.decode_f32s(&[0u8; 5]).is_err());
  }

  #[test]
  fn output_tensor_reads_big_endian_bytes() {
    let mut tensor = OutputTensor::<1>::default();
    tensor.set_slot(
      0,
      Slot {
        confidence: 0.75,
        class_label: 3.0,
        ..Default::default()
      },
    );
    let bytes = tensor.to_bytes(ByteOrder::Big);
    assert_eq!(&bytes[16..20], &0.75f32.to_be_bytes());

    let back = OutputTensor::<1>::from_bytes(&bytes, ByteOrder::Big).unwrap();
    assert_eq!(back, tensor);
  }

  #[test]
  fn byte_order_parses_from_str() {
    assert_eq!("le".parse::<ByteOrder>().unwrap(), ByteOrder::Little);
    assert_eq!("BIG".parse::<ByteOrder>().unwrap(), ByteOrder::Big);
    assert_eq!("native".parse::<ByteOrder>().unwrap(), ByteOrder::Native);
    assert!(matches!(
      "middle".parse::<ByteOrder>(),
      Err(TensorError::UnknownByteOrder(_))
    ));
  }

  #[test]
  fn input_pixel_lookup() {
    let tensor = InputTensor::<2>::try_from((0..12).map(|v| v as f32).collect::<Vec<_>>()).unwrap();
    assert_eq!(tensor.pixel(1, 0), Some([3.0, 4.0, 5.0]));
    assert_eq!(tensor.pixel(0, 1), Some([6.0, 7.0, 8.0]));
    assert_eq!(tensor.pixel(2, 0), None);
    assert_eq!(tensor.side(), 2);
  }
}
