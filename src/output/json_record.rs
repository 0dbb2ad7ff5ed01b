// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/json_record.rs - 检测结果 JSON 记录
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

use std::path::PathBuf;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, url_file_path,
  frame::Frame,
  model::{CocoLabel, DetectResult, WithLabel},
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 把检测结果按槽位顺序写成 JSON 文件
pub struct JsonRecordOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordError::SchemeMismatch);
    }

    Ok(JsonRecordOutput {
      path: url_file_path(uri),
    })
  }
}

pub fn record(width: u32, height: u32, result: &DetectResult) -> Value {
  let detections = result
    .iter()
    .map(|d| {
      json!({
        "left": d.bbox.left,
        "top": d.bbox.top,
        "right": d.bbox.right,
        "bottom": d.bbox.bottom,
        "confidence": d.confidence,
        "class_id": d.class_label,
        "class_name": d.kind::<CocoLabel>().to_label_str(),
      })
    })
    .collect::<Vec<_>>();

  json!({
    "width": width,
    "height": height,
    "detections": detections,
  })
}

impl<const S: u32> Render<Frame<S>, DetectResult> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, frame: &Frame<S>, result: &DetectResult) -> Result<(), Self::Error> {
    let source = frame.source();
    let value = record(source.width(), source.height(), result);

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&self.path, serde_json::to_string_pretty(&value)?)?;

    info!("保存检测记录到文件: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::ArgbImage,
    model::{BoundingBox, Detection},
  };

  fn detection(left: f32, class_label: u32) -> Detection {
    Detection {
      bbox: BoundingBox {
        left,
        top: 0.0,
        right: left + 10.0,
        bottom: 10.0,
      },
      confidence: 0.75,
      class_label,
    }
  }

  #[test]
  fn record_keeps_slot_order() {
    let result = DetectResult::from(vec![detection(5.0, 2), detection(1.0, 0)]);
    let value = record(100, 50, &result);

    assert_eq!(value["width"], 100);
    assert_eq!(value["detections"][0]["class_name"], "car");
    assert_eq!(value["detections"][0]["left"], 5.0);
    assert_eq!(value["detections"][1]["class_name"], "person");
    assert_eq!(value["detections"][1]["confidence"], 0.75);
  }

  #[test]
  fn writes_record_file() {
    let dir = std::env::temp_dir().join(format!("kanjian-json-{}", std::process::id()));
    let path = dir.join("result.json");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();

    let frame = Frame::<1>::new(ArgbImage::filled(8, 4, 0), ArgbImage::filled(1, 1, 0)).unwrap();
    output
      .render_result(&frame, &DetectResult::default())
      .unwrap();

    let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(written["height"], 4);
    assert_eq!(written["detections"].as_array().map(Vec::len), Some(0));
  }
}
