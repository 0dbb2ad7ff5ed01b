// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/detector.rs - 编码、推理、解码流水线
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::{ConfigError, DetectorConfig},
  engine::{Engine, EngineError, EngineSession, ReplayEngine, ReplayError},
  frame::Frame,
  model::{DetectResult, DetectionDecoder, Model, TensorEncoder},
  tensor::{ByteOrder, InputTensor, OutputTensor, TensorError},
};

pub const DEFAULT_INPUT_SIDE: u32 = 300;
pub const DEFAULT_MAX_DETECTIONS: usize = 10;

/// 300×300 输入、最多 10 个检测槽位的检测器
pub type Ssd300Detector<E> = Detector<E, DEFAULT_INPUT_SIDE, DEFAULT_MAX_DETECTIONS>;

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("张量错误: {0}")]
  TensorError(#[from] TensorError),
  #[error("推理引擎错误: {0}")]
  EngineError(#[from] EngineError),
  #[error("配置错误: {0}")]
  ConfigError(#[from] ConfigError),
  #[error("回放引擎错误: {0}")]
  ReplayError(#[from] ReplayError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

/// 单线程同步检测流水线：编码 → 推理 → 解码
///
/// 每次调用都分配自己的输入/输出张量，不在请求之间复用缓冲区。
pub struct Detector<E: Engine, const S: u32, const D: usize> {
  session: EngineSession<E>,
  encoder: TensorEncoder<S>,
  decoder: DetectionDecoder<D>,
  byte_order: ByteOrder,
}

pub struct DetectorBuilder<E: Engine> {
  engine: E,
  config: DetectorConfig,
}

impl<E: Engine> DetectorBuilder<E> {
  pub fn new(engine: E) -> Self {
    Self {
      engine,
      config: DetectorConfig::default(),
    }
  }

  pub fn config(mut self, config: DetectorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn build<const S: u32, const D: usize>(
    self,
  ) -> Result<Detector<E, S, D>, DetectorError> {
    let DetectorConfig {
      confidence_threshold,
      byte_order,
      class_rounding,
      channel_order,
    } = self.config;

    info!(
      "创建检测器: 输入 {}x{}, 最大检测数 {}, 置信度阈值 {}",
      S, S, D, confidence_threshold
    );
    debug!(
      "字节序: {:?}, 通道顺序: {:?}, 类别取整: {:?}",
      byte_order, channel_order, class_rounding
    );

    let decoder = DetectionDecoder::new(confidence_threshold, class_rounding)?;

    Ok(Detector {
      session: EngineSession::new(
        self.engine,
        InputTensor::<S>::BYTE_LEN,
        OutputTensor::<D>::BYTE_LEN,
      ),
      encoder: TensorEncoder::new(channel_order),
      decoder,
      byte_order,
    })
  }
}

impl<E: Engine, const S: u32, const D: usize> Detector<E, S, D> {
  pub fn encoder(&self) -> &TensorEncoder<S> {
    &self.encoder
  }

  pub fn decoder(&self) -> &DetectionDecoder<D> {
    &self.decoder
  }

  pub fn byte_order(&self) -> ByteOrder {
    self.byte_order
  }

  /// 只执行推理引擎调用，返回解析后的输出张量
  pub fn run_engine(&self, input: &InputTensor<S>) -> Result<OutputTensor<D>, DetectorError> {
    let raw_input = input.to_bytes(self.byte_order);
    let mut raw_output = vec![0u8; OutputTensor::<D>::BYTE_LEN];
    self.session.infer(&raw_input, &mut raw_output)?;
    Ok(OutputTensor::from_bytes(&raw_output, self.byte_order)?)
  }

  /// 释放推理引擎，之后检测器不可再用
  pub fn close(self) -> Result<(), DetectorError> {
    Ok(self.session.close()?)
  }
}

impl<const S: u32, const D: usize> FromUrl for Detector<ReplayEngine, S, D> {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != ReplayEngine::SCHEME {
      return Err(DetectorError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        ReplayEngine::SCHEME
      )));
    }

    let config = DetectorConfig::from_query(url)?;
    let engine = ReplayEngine::from_url(url)?;
    DetectorBuilder::new(engine).config(config).build()
  }
}

impl<E: Engine, const S: u32, const D: usize> Model for Detector<E, S, D> {
  type Input = Frame<S>;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("编码输入张量");
    let tensor = self.encoder.encode(input.input())?;

    let output = self.run_engine(&tensor)?;

    debug!("后处理模型输出");
    let source = input.source();
    let result = self.decoder.decode(&output, source.width(), source.height());
    debug!("检测到 {} 个物体", result.len());
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;
  use crate::{
    frame::ArgbImage,
    model::ClassRounding,
    tensor::{SLOT_FIELDS, Slot},
  };

  #[derive(Error, Debug)]
  #[error("engine exploded")]
  struct Exploded;

  /// 记录收到的输入，并返回固定输出
  struct RecordingEngine {
    seen: Rc<RefCell<Vec<u8>>>,
    output: Vec<u8>,
    fail: bool,
  }

  impl Engine for RecordingEngine {
    type Error = Exploded;

    fn infer(&self, input: &[u8], output: &mut [u8]) -> Result<(), Self::Error> {
      if self.fail {
        return Err(Exploded);
      }
      *self.seen.borrow_mut() = input.to_vec();
      output.copy_from_slice(&self.output);
      Ok(())
    }
  }

  fn engine_with(output: &OutputTensor<4>, order: ByteOrder) -> (RecordingEngine, Rc<RefCell<Vec<u8>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let engine = RecordingEngine {
      seen: seen.clone(),
      output: output.to_bytes(order),
      fail: false,
    };
    (engine, seen)
  }

  #[test]
  fn runs_the_full_pipeline() {
    let mut output = OutputTensor::<4>::default();
    output.set_slot(
      2,
      Slot {
        x: 0.5,
        y: 0.25,
        width: 0.25,
        height: 0.5,
        confidence: 0.8,
        class_label: 1.0,
      },
    );
    let (engine, seen) = engine_with(&output, ByteOrder::Native);
    let detector: Detector<_, 2, 4> = DetectorBuilder::new(engine).build().unwrap();

    let frame = Frame::<2>::new(
      ArgbImage::filled(200, 100, 0),
      ArgbImage::filled(2, 2, 0xFFFF0000),
    )
    .unwrap();
    let result = detector.infer(&frame).unwrap();

    assert_eq!(seen.borrow().len(), 4 * 3 * 2 * 2);
    assert_eq!(&seen.borrow()[0..4], &1.0f32.to_ne_bytes());
    assert_eq!(result.len(), 1);
    let detection = &result.items[0];
    assert_eq!(detection.bbox.left, 100.0);
    assert_eq!(detection.bbox.top, 25.0);
    assert_eq!(detection.bbox.right, 150.0);
    assert_eq!(detection.bbox.bottom, 75.0);
    assert_eq!(detection.class_label, 1);
  }

  #[test]
  fn byte_order_applies_to_both_buffers() {
    let mut output = OutputTensor::<4>::default();
    output.set_slot(
      0,
      Slot {
        confidence: 0.9,
        class_label: 3.0,
        ..Default::default()
      },
    );
    let (engine, seen) = engine_with(&output, ByteOrder::Big);
    let config = DetectorConfig::default().with_byte_order(ByteOrder::Big);
    let detector: Detector<_, 1, 4> = DetectorBuilder::new(engine).config(config).build().unwrap();

    let frame = Frame::<1>::square(ArgbImage::filled(1, 1, 0xFF0000FF)).unwrap();
    let result = detector.infer(&frame).unwrap();

    assert_eq!(&seen.borrow()[8..12], &1.0f32.to_be_bytes());
    assert_eq!(result.items[0].class_label, 3);
  }

  #[test]
  fn encoder_rejects_input_of_another_side() {
    let (engine, _) = engine_with(&OutputTensor::<4>::default(), ByteOrder::Native);
    let detector: Detector<_, 2, 4> = DetectorBuilder::new(engine).build().unwrap();

    let frame = Frame::<3>::square(ArgbImage::filled(3, 3, 0)).unwrap();
    let err = detector.encoder().encode(frame.input()).unwrap_err();
    assert!(matches!(err, TensorError::ShapeMismatch { .. }));
  }

  #[test]
  fn non_finite_threshold_fails_the_build() {
    let (engine, _) = engine_with(&OutputTensor::<4>::default(), ByteOrder::Native);
    let config = DetectorConfig {
      confidence_threshold: f32::NAN,
      ..Default::default()
    };
    let result: Result<Detector<_, 1, 4>, _> = DetectorBuilder::new(engine).config(config).build();
    assert!(matches!(
      result,
      Err(DetectorError::ConfigError(ConfigError::InvalidThreshold(_)))
    ));
  }

  #[test]
  fn engine_failure_fails_the_request() {
    let engine = RecordingEngine {
      seen: Rc::new(RefCell::new(Vec::new())),
      output: vec![0; 4 * SLOT_FIELDS * 4],
      fail: true,
    };
    let detector: Detector<_, 1, 4> = DetectorBuilder::new(engine).build().unwrap();
    let frame = Frame::<1>::square(ArgbImage::filled(1, 1, 0)).unwrap();

    let err = detector.infer(&frame).unwrap_err();
    assert!(matches!(
      err,
      DetectorError::EngineError(EngineError::Engine(_))
    ));
  }

  #[test]
  fn config_reaches_decoder() {
    let (engine, _) = engine_with(&OutputTensor::<4>::default(), ByteOrder::Native);
    let config = DetectorConfig::default()
      .with_confidence_threshold(0.3)
      .unwrap()
      .with_class_rounding(ClassRounding::Truncate);
    let detector: Detector<_, 1, 4> = DetectorBuilder::new(engine).config(config).build().unwrap();

    assert_eq!(detector.decoder().confidence_threshold(), 0.3);
    assert_eq!(detector.decoder().class_rounding(), ClassRounding::Truncate);
    detector.close().unwrap();
  }

  #[test]
  fn rejects_unknown_model_scheme() {
    let url = Url::parse("rknn:///models/ssd.rknn").unwrap();
    let result = Ssd300Detector::<ReplayEngine>::from_url(&url);
    assert!(matches!(result, Err(DetectorError::ModelPathError(_))));
  }
}
