// 该文件是 Qingfeng （清风） 项目的一部分。
// src/postprocess/config.rs - 后处理配置
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

use tracing::error;

use crate::error::PipelineError;

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
pub const DEFAULT_NMS_TOP_K: usize = 1000;
pub const DEFAULT_MAX_PREDICTIONS: usize = 300;

/// 后处理配置，只能通过 [`PostprocessorBuilder`] 构造
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessorConfig {
  score_threshold: f32,
  nms_threshold: f32,
  nms_top_k: usize,
  max_predictions: usize,
  multi_label_per_box: bool,
}

impl PostprocessorConfig {
  pub fn builder() -> PostprocessorBuilder {
    PostprocessorBuilder::default()
  }

  /// 置信度必须严格大于该值
  pub fn score_threshold(&self) -> f32 {
    self.score_threshold
  }

  /// IoU 严格大于该值时抑制
  pub fn nms_threshold(&self) -> f32 {
    self.nms_threshold
  }

  /// 每个类别参与 NMS 的最大候选数
  pub fn nms_top_k(&self) -> usize {
    self.nms_top_k
  }

  /// 每张图像最终保留的最大框数
  pub fn max_predictions(&self) -> usize {
    self.max_predictions
  }

  /// 是否允许一个锚点为多个类别产生候选
  pub fn multi_label_per_box(&self) -> bool {
    self.multi_label_per_box
  }
}

#[derive(Debug, Clone)]
pub struct PostprocessorBuilder {
  score_threshold: f32,
  nms_threshold: f32,
  nms_top_k: usize,
  max_predictions: usize,
  multi_label_per_box: bool,
}

impl Default for PostprocessorBuilder {
  fn default() -> Self {
    Self {
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      nms_top_k: DEFAULT_NMS_TOP_K,
      max_predictions: DEFAULT_MAX_PREDICTIONS,
      multi_label_per_box: false,
    }
  }
}

impl PostprocessorBuilder {
  pub fn score_threshold(mut self, threshold: f32) -> Self {
    self.score_threshold = threshold;
    self
  }

  pub fn nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn nms_top_k(mut self, top_k: usize) -> Self {
    self.nms_top_k = top_k;
    self
  }

  pub fn max_predictions(mut self, max_predictions: usize) -> Self {
    self.max_predictions = max_predictions;
    self
  }

  pub fn multi_label_per_box(mut self, multi_label: bool) -> Self {
    self.multi_label_per_box = multi_label;
    self
  }

  pub fn build(self) -> Result<PostprocessorConfig, PipelineError> {
    check_unit("score_threshold", self.score_threshold)?;
    check_unit("nms_threshold", self.nms_threshold)?;
    check_positive("nms_top_k", self.nms_top_k)?;
    check_positive("max_predictions", self.max_predictions)?;

    Ok(PostprocessorConfig {
      score_threshold: self.score_threshold,
      nms_threshold: self.nms_threshold,
      nms_top_k: self.nms_top_k,
      max_predictions: self.max_predictions,
      multi_label_per_box: self.multi_label_per_box,
    })
  }
}

fn check_unit(name: &str, value: f32) -> Result<(), PipelineError> {
  // NaN 也会落在这里
  if !(0.0..=1.0).contains(&value) {
    error!("{} 超出 [0, 1] 范围: {}", name, value);
    return Err(PipelineError::config(format!(
      "{} 必须在 [0, 1] 内, 实际为 {}",
      name, value
    )));
  }
  Ok(())
}

fn check_positive(name: &str, value: usize) -> Result<(), PipelineError> {
  if value == 0 {
    error!("{} 必须大于 0", name);
    return Err(PipelineError::config(format!("{} 必须大于 0", name)));
  }
  Ok(())
}
