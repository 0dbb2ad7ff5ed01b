// 该文件是 Kanjian （看见） 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 原图像素坐标下的检测框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl BoundingBox {
  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }
}

/// 解码后的一条检测结果，只由 [`DetectionDecoder`] 创建
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: BoundingBox,
  pub confidence: f32,
  pub class_label: u32,
}

impl Detection {
  pub fn kind<T: WithLabel>(&self) -> T {
    T::from_label_id(self.class_label)
  }
}

/// 按输出张量槽位顺序排列的检测结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Self;
}

mod decoder;
mod detector;
mod encoder;
mod label;

pub use self::decoder::{ClassRounding, DEFAULT_CONFIDENCE_THRESHOLD, DetectionDecoder};
pub use self::detector::{
  DEFAULT_INPUT_SIDE, DEFAULT_MAX_DETECTIONS, Detector, DetectorBuilder, DetectorError,
  Ssd300Detector,
};
pub use self::encoder::{ChannelOrder, TensorEncoder};
pub use self::label::{COCO_CLASSES, CocoLabel};
