// 该文件是 Qingfeng （清风） 项目的一部分。
// src/postprocess.rs - 检测后处理
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

//! 阈值过滤、按类别 NMS 与最终数量截断。
//!
//! 最终的 `max_predictions` 截断发生在各类别 NMS 之后，按全局置信度排序。
//! 当某个类别有大量高置信度检测时，低置信度的类别可能被整体挤掉，这是预期行为。

use tracing::debug;

use crate::{
  decode::{DecodedOutput, RawPrediction, check_blocks, predictions},
  error::PipelineError,
  model::DetectItem,
};

mod config;
mod nms;

pub use self::config::{
  DEFAULT_MAX_PREDICTIONS, DEFAULT_NMS_THRESHOLD, DEFAULT_NMS_TOP_K, DEFAULT_SCORE_THRESHOLD,
  PostprocessorBuilder, PostprocessorConfig,
};
pub use self::nms::{Candidate, area, class_aware_nms, compare_candidates, iou, suppress};

/// 后处理器，除不可变配置外不持有任何状态
#[derive(Debug, Clone)]
pub struct Postprocessor {
  config: PostprocessorConfig,
}

impl Postprocessor {
  pub fn new(config: PostprocessorConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &PostprocessorConfig {
    &self.config
  }

  /// 处理一张图像的几何块 `[N, 5]` 与分数块 `[N, C]`
  pub fn forward(
    &self,
    geometry: &[f32],
    geometry_shape: [usize; 2],
    scores: &[f32],
    scores_shape: [usize; 2],
  ) -> Result<Vec<DetectItem>, PipelineError> {
    let (num_anchors, num_classes) = check_blocks(geometry, geometry_shape, scores, scores_shape)?;
    if num_anchors == 0 {
      return Ok(Vec::new());
    }

    let candidates = generate_candidates(predictions(geometry, scores, num_classes), &self.config);
    let num_candidates = candidates.len();

    let kept = class_aware_nms(
      candidates,
      self.config.nms_top_k(),
      self.config.nms_threshold(),
    );
    let num_kept = kept.len();

    let items = merge_and_cap(kept, self.config.max_predictions());
    debug!(
      "后处理: {} 个锚点 -> {} 个候选 -> NMS 后 {} -> 输出 {}",
      num_anchors,
      num_candidates,
      num_kept,
      items.len()
    );

    Ok(items)
  }

  pub fn forward_decoded(&self, decoded: &DecodedOutput) -> Result<Vec<DetectItem>, PipelineError> {
    self.forward(
      decoded.geometry(),
      decoded.geometry_shape(),
      decoded.scores(),
      decoded.scores_shape(),
    )
  }

  /// 批量接口，每张图像独立处理，任一失败则整体失败
  pub fn forward_batch(
    &self,
    batch: &[DecodedOutput],
  ) -> Result<Vec<Vec<DetectItem>>, PipelineError> {
    batch
      .iter()
      .map(|decoded| self.forward_decoded(decoded))
      .collect()
  }
}

/// 中心点格式转为角点格式，负宽高视为 0
pub fn center_to_corners(center_x: f32, center_y: f32, width: f32, height: f32) -> [f32; 4] {
  let half_w = width.max(0.0) / 2.0;
  let half_h = height.max(0.0) / 2.0;
  [
    center_x - half_w,
    center_y - half_h,
    center_x + half_w,
    center_y + half_h,
  ]
}

/// 置信度严格大于阈值的 (框, 类别) 组合
pub fn generate_candidates<'a>(
  rows: impl Iterator<Item = RawPrediction<'a>>,
  config: &PostprocessorConfig,
) -> Vec<Candidate> {
  let threshold = config.score_threshold();
  let mut candidates = Vec::new();

  for (anchor, row) in rows.enumerate() {
    let objectness = row.objectness;
    let bbox = || center_to_corners(row.center_x, row.center_y, row.width, row.height);

    if config.multi_label_per_box() {
      for (class_id, &class_score) in row.class_scores.iter().enumerate() {
        let score = objectness * class_score;
        if score > threshold {
          candidates.push(Candidate {
            bbox: bbox(),
            class_id,
            score,
            anchor,
          });
        }
      }
    } else if let Some((class_id, class_score)) = argmax(row.class_scores) {
      let score = objectness * class_score;
      if score > threshold {
        candidates.push(Candidate {
          bbox: bbox(),
          class_id,
          score,
          anchor,
        });
      }
    }
  }

  candidates
}

/// 最大分数及其类别号，并列时取较小类别号
fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (idx, &score) in scores.iter().enumerate() {
    match best {
      Some((_, best_score)) if score <= best_score => {}
      _ if score.is_nan() => {}
      _ => best = Some((idx, score)),
    }
  }
  best
}

/// 合并各类别结果，按置信度降序并截断到 `max_predictions`
pub fn merge_and_cap(mut kept: Vec<Candidate>, max_predictions: usize) -> Vec<DetectItem> {
  kept.sort_by(compare_candidates);
  kept.truncate(max_predictions);
  kept
    .into_iter()
    .map(|c| DetectItem {
      class_id: c.class_id,
      score: c.score,
      bbox: c.bbox,
    })
    .collect()
}
