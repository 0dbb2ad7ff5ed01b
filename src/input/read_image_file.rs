// 该文件是 Kanjian （看见） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbaImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, url_file_path,
  frame::{ArgbImage, Frame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch: {0}")]
  SchemaMismatch(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 从图像文件读取单帧
///
/// 原图保留为帧的 `source`，另外缩放一份 S×S 作为模型输入。
pub struct ImageFileInput {
  image: Option<RgbaImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch(url.scheme().to_string()));
    }

    let path = url_file_path(url);
    info!("读取图像文件: {}", path.display());
    let image = ImageReader::open(&path)?.decode()?;
    debug!("图像尺寸: {}x{}", image.width(), image.height());

    Ok(ImageFileInput::from(image.to_rgba8()))
  }
}

impl From<RgbaImage> for ImageFileInput {
  fn from(image: RgbaImage) -> Self {
    ImageFileInput { image: Some(image) }
  }
}

impl ImageFileInput {
  pub fn into_frames<const S: u32>(self) -> ImageFileInputFrames<S> {
    ImageFileInputFrames { inner: self }
  }
}

pub struct ImageFileInputFrames<const S: u32> {
  inner: ImageFileInput,
}

impl<const S: u32> Iterator for ImageFileInputFrames<S> {
  type Item = Frame<S>;

  fn next(&mut self) -> Option<Self::Item> {
    let image = self.inner.image.take()?;
    let source = ArgbImage::from(&image);

    let input = if image.dimensions() == (S, S) {
      source.clone()
    } else {
      debug!("缩放图像 {}x{} -> {}x{}", image.width(), image.height(), S, S);
      let resized = image::imageops::resize(&image, S, S, FilterType::Triangle);
      ArgbImage::from(&resized)
    };

    match Frame::new(source, input) {
      Ok(frame) => Some(frame),
      Err(e) => {
        error!("构造输入帧失败: {}", e);
        None
      }
    }
  }
}
