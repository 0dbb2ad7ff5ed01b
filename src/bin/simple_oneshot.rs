// 该文件是 Kanjian （看见） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use kanjian::{
  FromUrl,
  engine::ReplayEngine,
  input::ImageFileInput,
  model::{DEFAULT_INPUT_SIDE, Ssd300Detector},
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// Kanjian 单张图像检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型（推理引擎）路径，例如 replay:///path/out.bin?confidence=0.5&order=native
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///path/photo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，image:///path/out.png 或 json:///path/out.json
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let model = Ssd300Detector::<ReplayEngine>::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(input.into_frames::<DEFAULT_INPUT_SIDE>(), model, output)?;

  Ok(())
}
