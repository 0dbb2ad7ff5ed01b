// 该文件是 Kanjian （看见） 项目的一部分。
// src/engine/replay.rs - 回放推理引擎
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

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, url_file_path,
  engine::Engine,
  tensor::{ByteOrder, TensorError},
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("张量错误: {0}")]
  TensorError(#[from] TensorError),
  #[error("回放张量长度不匹配: 期望 {expected} 字节, 录制 {actual} 字节")]
  OutputSize { expected: usize, actual: usize },
}

/// 回放预先录制的输出张量的推理引擎
///
/// 输入内容被忽略，每次推理都把同一份输出字节写入缓冲区。
/// 录制文件可以是原始 f32 字节（按 `order` 解释），也可以是浮点数的 JSON 数组。
#[derive(Debug, Clone)]
pub struct ReplayEngine {
  output: Box<[u8]>,
}

impl ReplayEngine {
  pub fn from_bytes(bytes: Vec<u8>) -> Self {
    Self {
      output: bytes.into_boxed_slice(),
    }
  }

  /// 浮点输出按 `order` 写成引擎字节
  pub fn from_floats(values: &[f32], order: ByteOrder) -> Self {
    Self::from_bytes(order.encode_f32s(values))
  }

  pub fn open(path: impl AsRef<Path>, order: ByteOrder) -> Result<Self, ReplayError> {
    let path = path.as_ref();
    info!("加载回放张量: {}", path.display());
    let data = std::fs::read(path)?;

    let is_json = path
      .extension()
      .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
      let values: Vec<f32> = serde_json::from_slice(&data)?;
      debug!("JSON 张量包含 {} 个浮点数", values.len());
      Ok(Self::from_floats(&values, order))
    } else {
      // 原始字节本身已是目标字节序，这里只检查对齐
      order.decode_f32s(&data)?;
      debug!("原始张量大小: {} 字节", data.len());
      Ok(Self::from_bytes(data))
    }
  }

  pub fn output_len(&self) -> usize {
    self.output.len()
  }
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayEngine {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let order = url
      .query_pairs()
      .find(|(k, _)| k == "order")
      .map(|(_, v)| v.parse::<ByteOrder>())
      .transpose()?
      .unwrap_or_default();

    Self::open(url_file_path(url), order)
  }
}

impl Engine for ReplayEngine {
  type Error = ReplayError;

  fn infer(&self, input: &[u8], output: &mut [u8]) -> Result<(), Self::Error> {
    if output.len() != self.output.len() {
      return Err(ReplayError::OutputSize {
        expected: output.len(),
        actual: self.output.len(),
      });
    }

    debug!("回放输出张量, 输入 {} 字节", input.len());
    output.copy_from_slice(&self.output);
    Ok(())
  }
}
