// 该文件是 Kanjian （看见） 项目的一部分。
// src/config.rs - 检测流水线配置
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

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  model::{ChannelOrder, ClassRounding, DEFAULT_CONFIDENCE_THRESHOLD},
  tensor::ByteOrder,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须是有限数值: {0}")]
  InvalidThreshold(String),
  #[error("参数 '{key}' 的值无效: {message}")]
  InvalidValue { key: String, message: String },
}

/// 检测流水线的可调参数
///
/// 可以从模型 URL 的查询参数中读取：
/// `confidence`、`order`（native/le/be）、`rounding`（nearest/truncate）、`channels`（rgb/bgr）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
  pub confidence_threshold: f32,
  pub byte_order: ByteOrder,
  pub class_rounding: ClassRounding,
  pub channel_order: ChannelOrder,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      byte_order: ByteOrder::default(),
      class_rounding: ClassRounding::default(),
      channel_order: ChannelOrder::default(),
    }
  }
}

impl DetectorConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Result<Self, ConfigError> {
    if !threshold.is_finite() {
      return Err(ConfigError::InvalidThreshold(threshold.to_string()));
    }
    self.confidence_threshold = threshold;
    Ok(self)
  }

  pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
    self.byte_order = byte_order;
    self
  }

  pub fn with_class_rounding(mut self, class_rounding: ClassRounding) -> Self {
    self.class_rounding = class_rounding;
    self
  }

  pub fn with_channel_order(mut self, channel_order: ChannelOrder) -> Self {
    self.channel_order = channel_order;
    self
  }

  /// 从 URL 查询参数覆盖默认配置，未知参数仅告警
  pub fn from_query(url: &Url) -> Result<Self, ConfigError> {
    let mut config = Self::default();

    for (key, value) in url.query_pairs() {
      let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
      };

      match &*key {
        "confidence" => {
          let threshold = value
            .parse::<f32>()
            .map_err(|_| ConfigError::InvalidThreshold(value.to_string()))?;
          config = config.with_confidence_threshold(threshold)?;
        }
        "order" => {
          let order = value
            .parse::<ByteOrder>()
            .map_err(|e| invalid(e.to_string()))?;
          config = config.with_byte_order(order);
        }
        "rounding" => {
          let rounding = value.parse::<ClassRounding>().map_err(invalid)?;
          config = config.with_class_rounding(rounding);
        }
        "channels" => {
          let channels = value.parse::<ChannelOrder>().map_err(invalid)?;
          config = config.with_channel_order(channels);
        }
        other => warn!("忽略未知参数: {}", other),
      }
    }

    Ok(config)
  }
}
