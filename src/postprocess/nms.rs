// 该文件是 Qingfeng （清风） 项目的一部分。
// src/postprocess/nms.rs - 按类别的非极大值抑制
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

use std::{cmp::Ordering, collections::BTreeMap};

/// 阈值过滤后的候选框，坐标位于网络输入空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  /// [x_min, y_min, x_max, y_max]
  pub bbox: [f32; 4],
  pub class_id: usize,
  /// objectness × class_score
  pub score: f32,
  /// 在输出张量中的行号
  pub anchor: usize,
}

/// 置信度降序，同分时锚点序号升序，再按类别升序
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
  b.score
    .total_cmp(&a.score)
    .then_with(|| a.anchor.cmp(&b.anchor))
    .then_with(|| a.class_id.cmp(&b.class_id))
}

pub fn area(bbox: &[f32; 4]) -> f32 {
  (bbox[2] - bbox[0]).max(0.0) * (bbox[3] - bbox[1]).max(0.0)
}

/// 计算两个边界框的 IoU，并集为 0 时返回 0
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = area(a) + area(b) - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 单一类别内的贪心 NMS
///
/// 先排序并截断到 `top_k`，然后依次保留与所有已保留框 IoU 不超过阈值的候选。
/// IoU 恰好等于阈值时不抑制。
pub fn suppress(mut candidates: Vec<Candidate>, top_k: usize, iou_threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(compare_candidates);
  candidates.truncate(top_k);

  let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
  for candidate in candidates {
    if kept
      .iter()
      .all(|k| iou(&k.bbox, &candidate.bbox) <= iou_threshold)
    {
      kept.push(candidate);
    }
  }
  kept
}

/// 按类别分组后分别做 NMS，不同类别之间互不抑制
///
/// 结果按类别号升序拼接，每个类别内部按置信度降序。
pub fn class_aware_nms(candidates: Vec<Candidate>, top_k: usize, iou_threshold: f32) -> Vec<Candidate> {
  let mut partitions: BTreeMap<usize, Vec<Candidate>> = BTreeMap::new();
  for candidate in candidates {
    partitions
      .entry(candidate.class_id)
      .or_default()
      .push(candidate);
  }
  let partitions: Vec<Vec<Candidate>> = partitions.into_values().collect();

  #[cfg(feature = "parallel")]
  let kept: Vec<Vec<Candidate>> = {
    use rayon::prelude::*;
    partitions
      .into_par_iter()
      .map(|partition| suppress(partition, top_k, iou_threshold))
      .collect()
  };

  #[cfg(not(feature = "parallel"))]
  let kept: Vec<Vec<Candidate>> = partitions
    .into_iter()
    .map(|partition| suppress(partition, top_k, iou_threshold))
    .collect();

  kept.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  fn candidate(bbox: [f32; 4], class_id: usize, score: f32, anchor: usize) -> Candidate {
    Candidate {
      bbox,
      class_id,
      score,
      anchor,
    }
  }

  #[test]
  fn iou_of_box_with_itself_is_one() {
    let a = [10.0, 20.0, 50.0, 80.0];
    assert_relative_eq!(iou(&a, &a), 1.0);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = [0.0, 0.0, 10.0, 10.0];
    let b = [20.0, 20.0, 30.0, 30.0];
    assert_eq!(iou(&a, &b), 0.0);
    // 仅边相接
    let c = [10.0, 0.0, 20.0, 10.0];
    assert_eq!(iou(&a, &c), 0.0);
  }

  #[test]
  fn iou_is_symmetric() {
    let a = [0.0, 0.0, 10.0, 10.0];
    let b = [5.0, 5.0, 15.0, 20.0];
    assert_relative_eq!(iou(&a, &b), iou(&b, &a));
    // 交集 25, 并集 100 + 150 - 25
    assert_relative_eq!(iou(&a, &b), 25.0 / 225.0);
  }

  #[test]
  fn degenerate_boxes_have_zero_iou() {
    let point = [5.0, 5.0, 5.0, 5.0];
    assert_eq!(iou(&point, &point), 0.0);
    let line = [0.0, 0.0, 10.0, 0.0];
    assert_eq!(iou(&line, &[0.0, 0.0, 10.0, 10.0]), 0.0);
  }

  #[test]
  fn lower_score_overlap_is_suppressed() {
    let kept = suppress(
      vec![
        candidate([0.0, 0.0, 10.0, 10.0], 0, 0.8, 0),
        candidate([0.0, 0.0, 10.0, 9.0], 0, 0.9, 1),
      ],
      100,
      0.5,
    );
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].anchor, 1);
  }

  #[test]
  fn iou_equal_to_threshold_is_kept() {
    // IoU = 50 / 100 = 0.5
    let kept = suppress(
      vec![
        candidate([0.0, 0.0, 10.0, 10.0], 0, 0.9, 0),
        candidate([0.0, 0.0, 10.0, 5.0], 0, 0.8, 1),
      ],
      100,
      0.5,
    );
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn equal_scores_prefer_lower_anchor() {
    let bbox = [0.0, 0.0, 10.0, 10.0];
    let kept = suppress(
      vec![
        candidate(bbox, 0, 0.7, 9),
        candidate(bbox, 0, 0.7, 3),
        candidate(bbox, 0, 0.7, 5),
      ],
      100,
      0.5,
    );
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].anchor, 3);
  }

  #[test]
  fn top_k_truncates_before_suppression() {
    let kept = suppress(
      vec![
        candidate([0.0, 0.0, 1.0, 1.0], 0, 0.5, 0),
        candidate([10.0, 10.0, 11.0, 11.0], 0, 0.9, 1),
        candidate([20.0, 20.0, 21.0, 21.0], 0, 0.7, 2),
      ],
      2,
      0.5,
    );
    let anchors: Vec<usize> = kept.iter().map(|c| c.anchor).collect();
    assert_eq!(anchors, vec![1, 2]);
  }

  #[test]
  fn classes_do_not_suppress_each_other() {
    let bbox = [0.0, 0.0, 10.0, 10.0];
    let kept = class_aware_nms(
      vec![
        candidate(bbox, 16, 0.9, 0),
        candidate(bbox, 15, 0.85, 0),
        candidate(bbox, 16, 0.3, 1),
      ],
      100,
      0.0,
    );
    assert_eq!(kept.len(), 2);
    // 类别号升序拼接
    assert_eq!(kept[0].class_id, 15);
    assert_eq!(kept[1].class_id, 16);
    assert_eq!(kept[1].anchor, 0);
  }

  #[test]
  fn empty_input_yields_empty_output() {
    assert!(class_aware_nms(Vec::new(), 10, 0.5).is_empty());
  }

  #[cfg(feature = "parallel")]
  #[test]
  fn parallel_nms_matches_sequential_fold() {
    // 线性同余发生器，保证候选框可复现
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut next = move || {
      state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
      ((state >> 40) as f32) / ((1u64 << 24) as f32)
    };
    let candidates: Vec<Candidate> = (0..2000)
      .map(|anchor| {
        let x = next() * 300.0;
        let y = next() * 300.0;
        let w = 5.0 + next() * 40.0;
        let h = 5.0 + next() * 40.0;
        let class_id = (next() * 12.0) as usize;
        candidate([x, y, x + w, y + h], class_id, next(), anchor)
      })
      .collect();

    let mut partitions: BTreeMap<usize, Vec<Candidate>> = BTreeMap::new();
    for c in &candidates {
      partitions.entry(c.class_id).or_default().push(*c);
    }
    let expected: Vec<Candidate> = partitions
      .into_values()
      .fold(Vec::new(), |mut kept, partition| {
        kept.extend(suppress(partition, 50, 0.45));
        kept
      });

    let kept = class_aware_nms(candidates, 50, 0.45);
    assert!(!kept.is_empty());
    assert_eq!(kept, expected);
  }
}
