// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/encoder.rs - 图像到输入张量的编码
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

use crate::{
  frame::{ArgbImage, blue, green, red},
  tensor::{InputTensor, RGB_CHANNELS, TensorError},
};

const CHANNEL_MAX: f32 = 255.0;

/// 每个像素写入张量时的通道顺序，必须与模型训练时一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

impl ChannelOrder {
  fn arrange(self, pixel: u32) -> [u8; RGB_CHANNELS] {
    match self {
      ChannelOrder::Rgb => [red(pixel), green(pixel), blue(pixel)],
      ChannelOrder::Bgr => [blue(pixel), green(pixel), red(pixel)],
    }
  }
}

impl FromStr for ChannelOrder {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "rgb" => Ok(ChannelOrder::Rgb),
      "bgr" => Ok(ChannelOrder::Bgr),
      other => Err(format!("未知的通道顺序: {}", other)),
    }
  }
}

/// 将 S×S 的打包像素图像编码为归一化的浮点输入张量
///
/// 不负责缩放：输入图像必须已经是 S×S。
#[derive(Debug, Clone, Copy, Default)]
pub struct TensorEncoder<const S: u32> {
  channel_order: ChannelOrder,
}

impl<const S: u32> TensorEncoder<S> {
  pub fn new(channel_order: ChannelOrder) -> Self {
    Self { channel_order }
  }

  pub fn channel_order(&self) -> ChannelOrder {
    self.channel_order
  }

  pub fn encode(&self, image: &ArgbImage) -> Result<InputTensor<S>, TensorError> {
    if image.width() != S || image.height() != S {
      return Err(TensorError::ShapeMismatch {
        expected_width: S,
        expected_height: S,
        actual_width: image.width(),
        actual_height: image.height(),
      });
    }

    let mut data = Vec::with_capacity(InputTensor::<S>::LEN);
    for &pixel in image.pixels() {
      for value in self.channel_order.arrange(pixel) {
        data.push(value as f32 / CHANNEL_MAX);
      }
    }

    InputTensor::try_from(data)
  }
}
