// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/decoder.rs - 输出张量到检测结果的解码
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

use tracing::debug;

use crate::{
  config::ConfigError,
  model::{BoundingBox, DetectResult, Detection},
  tensor::{OutputTensor, Slot},
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// 类别编号在输出张量中以浮点存储，转换为整数时的取整规则
///
/// 负数和 NaN 饱和为 0，超过 `u32::MAX` 的值饱和为 `u32::MAX`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassRounding {
  /// 四舍五入到最近整数，0.5 远离零
  #[default]
  Nearest,
  /// 直接截断小数部分
  Truncate,
}

impl ClassRounding {
  pub fn apply(self, value: f32) -> u32 {
    match self {
      ClassRounding::Nearest => value.round() as u32,
      ClassRounding::Truncate => value.trunc() as u32,
    }
  }
}

impl FromStr for ClassRounding {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nearest" | "round" => Ok(ClassRounding::Nearest),
      "truncate" | "trunc" => Ok(ClassRounding::Truncate),
      other => Err(format!("未知的取整方式: {}", other)),
    }
  }
}

/// 解析 D 槽位的输出张量
///
/// 逐槽位读取，置信度低于阈值的槽位被丢弃，其余按槽位顺序输出。
/// 不做排序，也不做 NMS：重叠的检测框会全部保留。
#[derive(Debug, Clone, Copy)]
pub struct DetectionDecoder<const D: usize> {
  confidence_threshold: f32,
  class_rounding: ClassRounding,
}

impl<const D: usize> Default for DetectionDecoder<D> {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      class_rounding: ClassRounding::default(),
    }
  }
}

impl<const D: usize> DetectionDecoder<D> {
  /// 阈值必须是有限数值，NaN 阈值会让所有槽位通过过滤
  pub fn new(
    confidence_threshold: f32,
    class_rounding: ClassRounding,
  ) -> Result<Self, ConfigError> {
    if !confidence_threshold.is_finite() {
      return Err(ConfigError::InvalidThreshold(confidence_threshold.to_string()));
    }

    Ok(Self {
      confidence_threshold,
      class_rounding,
    })
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn class_rounding(&self) -> ClassRounding {
    self.class_rounding
  }

  /// 解析单个槽位，`image_width`/`image_height` 为原图像素尺寸
  pub fn decode_slot(&self, slot: &Slot, image_width: f32, image_height: f32) -> Option<Detection> {
    // NaN 置信度同样被丢弃
    if slot.confidence < self.confidence_threshold || slot.confidence.is_nan() {
      return None;
    }

    let left = slot.x * image_width;
    let top = slot.y * image_height;
    let right = left + slot.width * image_width;
    let bottom = top + slot.height * image_height;

    Some(Detection {
      bbox: BoundingBox {
        left,
        top,
        right,
        bottom,
      },
      confidence: slot.confidence,
      class_label: self.class_rounding.apply(slot.class_label),
    })
  }

  pub fn decode(
    &self,
    output: &OutputTensor<D>,
    image_width: u32,
    image_height: u32,
  ) -> DetectResult {
    let (w, h) = (image_width as f32, image_height as f32);
    let mut items = Vec::new();

    for index in 0..D {
      let Some(slot) = output.slot(index) else {
        break;
      };
      if let Some(detection) = self.decode_slot(&slot, w, h) {
        debug!(
          "检测 {} -> 框: [{}, {}, {}, {}], 置信度: {}, 类别: {}",
          index,
          slot.x,
          slot.y,
          slot.width,
          slot.height,
          detection.confidence,
          detection.class_label
        );
        items.push(detection);
      }
    }

    debug!("保留 {} / {} 个检测槽位", items.len(), D);
    DetectResult::from(items)
  }
}
