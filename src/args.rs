// 该文件是 Qingfeng （清风） 项目的一部分。
// src/args.rs - 流水线参数配置
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

use std::path::PathBuf;

use clap::Args;

use crate::{
  error::PipelineError,
  label::Labels,
  letterbox::LetterboxConfig,
  postprocess::{
    DEFAULT_MAX_PREDICTIONS, DEFAULT_NMS_THRESHOLD, DEFAULT_NMS_TOP_K, DEFAULT_SCORE_THRESHOLD,
    PostprocessorConfig,
  },
};

/// 预处理与后处理参数，各个可执行文件共用
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD, value_name = "THRESHOLD")]
  pub score_threshold: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_NMS_THRESHOLD, value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 每个类别参与 NMS 的最大候选数
  #[arg(long, default_value_t = DEFAULT_NMS_TOP_K, value_name = "COUNT")]
  pub nms_top_k: usize,

  /// 每张图像最多输出的检测框数
  #[arg(long, default_value_t = DEFAULT_MAX_PREDICTIONS, value_name = "COUNT")]
  pub max_predictions: usize,

  /// 允许同一个锚点输出多个类别
  #[arg(long)]
  pub multi_label: bool,

  /// 模型输入宽度
  #[arg(long, default_value_t = 640, value_name = "PIXELS")]
  pub input_width: u32,

  /// 模型输入高度
  #[arg(long, default_value_t = 640, value_name = "PIXELS")]
  pub input_height: u32,

  /// 模型步长，输入边长向上对齐到该值的整数倍
  #[arg(long, default_value_t = 32, value_name = "PIXELS")]
  pub stride: u32,

  /// 标签文件，每行一个；缺省或读取失败时使用 COCO 标签
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,
}

impl PipelineArgs {
  pub fn postprocess_config(&self) -> Result<PostprocessorConfig, PipelineError> {
    PostprocessorConfig::builder()
      .score_threshold(self.score_threshold)
      .nms_threshold(self.nms_threshold)
      .nms_top_k(self.nms_top_k)
      .max_predictions(self.max_predictions)
      .multi_label_per_box(self.multi_label)
      .build()
  }

  pub fn letterbox_config(&self) -> Result<LetterboxConfig, PipelineError> {
    LetterboxConfig::from_input_size(self.input_width, self.input_height, self.stride)
  }

  pub fn labels(&self) -> Labels {
    match &self.labels {
      Some(path) => Labels::from_file_or_coco(path),
      None => Labels::coco(),
    }
  }
}
