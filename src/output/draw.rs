// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{
  frame::{ArgbImage, Frame},
  model::{BoundingBox, DetectResult},
};

const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: u32 = 5;

/// 在原图上绘制检测框，框坐标已是原图像素坐标
pub struct Draw {
  color: [u8; 3],
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  pub fn new(color: [u8; 3], thickness: u32) -> Self {
    Self { color, thickness }
  }

  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BoundingBox) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox.left.floor() as i32).clamp(0, w - 1);
    let y_min = (bbox.top.floor() as i32).clamp(0, h - 1);
    let x_max = (bbox.right.ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox.bottom.ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 边框向内加粗
    for t in 0..self.thickness as i32 {
      let width = x_max - x_min + 1 - 2 * t;
      let height = y_max - y_min + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for detection in result.iter() {
      self.draw_bbox(image, &detection.bbox);
    }
  }

  pub fn draw_detection<F: ToRgbImage>(&self, frame: &F, result: &DetectResult) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for ArgbImage {
  fn to_rgb_image(&self) -> RgbImage {
    ArgbImage::to_rgb_image(self)
  }
}

impl<const S: u32> ToRgbImage for Frame<S> {
  fn to_rgb_image(&self) -> RgbImage {
    self.source().to_rgb_image()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Detection;

  fn result_with(bbox: BoundingBox) -> DetectResult {
    DetectResult::from(vec![Detection {
      bbox,
      confidence: 0.9,
      class_label: 0,
    }])
  }

  #[test]
  fn draws_box_outline_only() {
    let image = ArgbImage::filled(40, 30, 0xFF000000);
    let result = result_with(BoundingBox {
      left: 10.0,
      top: 5.0,
      right: 30.0,
      bottom: 25.0,
    });

    let drawn = Draw::new([255, 0, 0], 2).draw_detection(&image, &result);
    assert_eq!(drawn.get_pixel(10, 5), &Rgb([255, 0, 0]));
    assert_eq!(drawn.get_pixel(11, 15), &Rgb([255, 0, 0]));
    assert_eq!(drawn.get_pixel(30, 25), &Rgb([255, 0, 0]));
    assert_eq!(drawn.get_pixel(20, 15), &Rgb([0, 0, 0]));
    assert_eq!(drawn.get_pixel(5, 5), &Rgb([0, 0, 0]));
  }

  #[test]
  fn boxes_outside_the_image_are_clamped() {
    let image = ArgbImage::filled(10, 10, 0xFF000000);
    let result = result_with(BoundingBox {
      left: -5.0,
      top: -5.0,
      right: 50.0,
      bottom: 50.0,
    });

    let drawn = Draw::default().draw_detection(&image, &result);
    assert_eq!(drawn.get_pixel(0, 0), &Rgb(BOX_COLOR));
    assert_eq!(drawn.get_pixel(9, 9), &Rgb(BOX_COLOR));
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let image = ArgbImage::filled(10, 10, 0xFF000000);
    let result = result_with(BoundingBox {
      left: 4.0,
      top: 4.0,
      right: 4.0,
      bottom: 8.0,
    });

    let drawn = Draw::default().draw_detection(&image, &result);
    assert!(drawn.pixels().all(|p| p == &Rgb([0, 0, 0])));
  }
}
