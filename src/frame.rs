// 该文件是 Kanjian （看见） 项目的一部分。
// src/frame.rs - 打包像素图像与帧定义
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

use crate::tensor::TensorError;

pub fn pack_argb(alpha: u8, red: u8, green: u8, blue: u8) -> u32 {
  ((alpha as u32) << 24) | ((red as u32) << 16) | ((green as u32) << 8) | blue as u32
}

pub fn alpha(pixel: u32) -> u8 {
  ((pixel >> 24) & 0xFF) as u8
}

pub fn red(pixel: u32) -> u8 {
  ((pixel >> 16) & 0xFF) as u8
}

pub fn green(pixel: u32) -> u8 {
  ((pixel >> 8) & 0xFF) as u8
}

pub fn blue(pixel: u32) -> u8 {
  (pixel & 0xFF) as u8
}

/// 每像素一个 `0xAARRGGBB` 的打包图像，按行优先存放
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgbImage {
  width: u32,
  height: u32,
  pixels: Box<[u32]>,
}

impl ArgbImage {
  pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self, TensorError> {
    let expected = width as usize * height as usize;
    if pixels.len() != expected {
      return Err(TensorError::LengthMismatch {
        expected,
        actual: pixels.len(),
      });
    }

    Ok(Self {
      width,
      height,
      pixels: pixels.into_boxed_slice(),
    })
  }

  /// 所有像素都取同一个值
  pub fn filled(width: u32, height: u32, pixel: u32) -> Self {
    Self {
      width,
      height,
      pixels: vec![pixel; width as usize * height as usize].into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn pixels(&self) -> &[u32] {
    &self.pixels
  }

  pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
    if x >= self.width || y >= self.height {
      return None;
    }
    Some(self.pixels[y as usize * self.width as usize + x as usize])
  }
}

#[cfg(feature = "image")]
impl From<&image::RgbaImage> for ArgbImage {
  fn from(image: &image::RgbaImage) -> Self {
    let (width, height) = image.dimensions();
    let pixels = image
      .pixels()
      .map(|p| pack_argb(p[3], p[0], p[1], p[2]))
      .collect::<Vec<_>>();

    Self {
      width,
      height,
      pixels: pixels.into_boxed_slice(),
    }
  }
}

#[cfg(feature = "image")]
impl ArgbImage {
  /// 丢弃 alpha 通道，转换为 RGB 图像
  pub fn to_rgb_image(&self) -> image::RgbImage {
    image::ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let pixel = self.pixels[y as usize * self.width as usize + x as usize];
      image::Rgb([red(pixel), green(pixel), blue(pixel)])
    })
  }
}

/// 一次检测请求的帧
///
/// `source` 为原始图像，检测框按它的尺寸还原；`input` 为已缩放到 S×S 的模型输入。
#[derive(Debug, Clone)]
pub struct Frame<const S: u32> {
  source: ArgbImage,
  input: ArgbImage,
}

impl<const S: u32> Frame<S> {
  pub fn new(source: ArgbImage, input: ArgbImage) -> Result<Self, TensorError> {
    if input.width() != S || input.height() != S {
      return Err(TensorError::ShapeMismatch {
        expected_width: S,
        expected_height: S,
        actual_width: input.width(),
        actual_height: input.height(),
      });
    }

    Ok(Self { source, input })
  }

  /// 原始图像已经是 S×S 时直接作为模型输入
  pub fn square(image: ArgbImage) -> Result<Self, TensorError> {
    Self::new(image.clone(), image)
  }

  pub fn source(&self) -> &ArgbImage {
    &self.source
  }

  pub fn input(&self) -> &ArgbImage {
    &self.input
  }
}
