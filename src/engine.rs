// 该文件是 Kanjian （看见） 项目的一部分。
// src/engine.rs - 推理引擎边界
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
use tracing::{debug, error, info};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 黑盒推理引擎
///
/// `infer` 读取完整的输入字节并同步填满调用方提供的输出缓冲区，
/// 没有部分结果。`release` 由 [`EngineSession`] 保证只调用一次。
pub trait Engine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, input: &[u8], output: &mut [u8]) -> Result<(), Self::Error>;

  fn release(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("推理引擎错误: {0}")]
  Engine(#[source] BoxedError),
  #[error("输入缓冲区长度不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  InputSize { expected: usize, actual: usize },
  #[error("输出缓冲区长度不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  OutputSize { expected: usize, actual: usize },
}

impl EngineError {
  fn engine<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    EngineError::Engine(Box::new(err))
  }
}

/// 持有引擎句柄的推理会话
///
/// 固定输入/输出的字节长度。`close` 消耗会话并释放引擎；
/// 未显式关闭的会话在析构时释放，两条路径都只释放一次。
pub struct EngineSession<E: Engine> {
  engine: E,
  released: bool,
  input_len: usize,
  output_len: usize,
}

impl<E: Engine> EngineSession<E> {
  pub fn new(engine: E, input_len: usize, output_len: usize) -> Self {
    info!(
      "创建推理会话: 输入 {} 字节, 输出 {} 字节",
      input_len, output_len
    );
    Self {
      engine,
      released: false,
      input_len,
      output_len,
    }
  }

  pub fn input_len(&self) -> usize {
    self.input_len
  }

  pub fn output_len(&self) -> usize {
    self.output_len
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  pub fn infer(&self, input: &[u8], output: &mut [u8]) -> Result<(), EngineError> {
    if input.len() != self.input_len {
      return Err(EngineError::InputSize {
        expected: self.input_len,
        actual: input.len(),
      });
    }
    if output.len() != self.output_len {
      return Err(EngineError::OutputSize {
        expected: self.output_len,
        actual: output.len(),
      });
    }

    debug!("执行模型推理");
    self.engine.infer(input, output).map_err(|e| {
      error!("推理失败: {}", e);
      EngineError::engine(e)
    })
  }

  pub fn close(mut self) -> Result<(), EngineError> {
    self.release()
  }

  // 释放失败同样视为已释放，析构时不再重试
  fn release(&mut self) -> Result<(), EngineError> {
    if self.released {
      return Ok(());
    }
    self.released = true;
    info!("释放推理引擎");
    self.engine.release().map_err(EngineError::engine)
  }
}

impl<E: Engine> Drop for EngineSession<E> {
  fn drop(&mut self) {
    if let Err(e) = self.release() {
      error!("释放推理引擎失败: {}", e);
    }
  }
}

mod replay;
pub use self::replay::{ReplayEngine, ReplayError};
