// 该文件是 Qingfeng （清风） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像推理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use anyhow::Result;
use clap::Parser;
use url::Url;

use qingfeng::{
  FromUrl,
  args::PipelineArgs,
  detector::Detector,
  input::InputWrapper,
  model::ReplayModel,
  output::OutputWrapper,
  task::{OneShotTask, Task, TaskSummary},
  utils::{Severity, format_message},
};
use tracing::info;

/// Qingfeng 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理输出回放地址，如 replay:///path/output.bin?shape=1,25200,85
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，如 image:///path/a.jpg 或 folder:///path/frames
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，如 image:///path/out.jpg 或 folder:///path/record?record=name
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[command(flatten)]
  pub pipeline: PipelineArgs,
}

fn run(args: Args) -> Result<TaskSummary> {
  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let inference = ReplayModel::from_url(&args.model)?;
  let detector = Detector::new(
    inference,
    args.pipeline.letterbox_config()?,
    args.pipeline.postprocess_config()?,
  );
  let output = OutputWrapper::from_url(&args.output)?.with_labels(args.pipeline.labels());

  OneShotTask.run_task(input, detector, output)
}

fn main() {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  match run(args) {
    Ok(summary) => {
      println!(
        "{}",
        format_message(Severity::Info, "处理帧数", &summary.frames.to_string())
      );
      if summary.skipped > 0 {
        println!(
          "{}",
          format_message(Severity::Warning, "跳过帧数", &summary.skipped.to_string())
        );
      }
      println!(
        "{}",
        format_message(Severity::Info, "检测总数", &summary.detections.to_string())
      );
      if let Some(latency) = summary.average_latency {
        println!(
          "{}",
          format_message(Severity::Info, "平均延迟", &format!("{:.2?}", latency))
        );
      }
    }
    Err(e) => {
      eprintln!(
        "{}",
        format_message(Severity::Error, "Inference Error", &format!("{:#}", e))
      );
      std::process::exit(1);
    }
  }
}
