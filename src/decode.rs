// 该文件是 Qingfeng （清风） 项目的一部分。
// src/decode.rs - 推理输出解码
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

//! 把 `[N, 5 + C]` 的扁平预测缓冲区拆成几何块 `[N, 5]` 和类别分数块 `[N, C]`。
//! 这里只做重排，不做任何阈值过滤。

use tracing::debug;

use crate::{error::PipelineError, utils::checked_product};

/// 每行几何部分的宽度: cx, cy, w, h, objectness
pub const GEOMETRY_WIDTH: usize = 5;

/// 推理输出的带形状视图，构造时校验长度
#[derive(Debug, Clone, Copy)]
pub struct OutputView<'a> {
  data: &'a [f32],
  shape: &'a [usize],
}

impl<'a> OutputView<'a> {
  pub fn new(data: &'a [f32], shape: &'a [usize]) -> Result<Self, PipelineError> {
    if shape.is_empty() {
      return Err(PipelineError::shape("输出形状为空"));
    }
    let expected = checked_product(shape.iter().copied())
      .ok_or_else(|| PipelineError::shape(format!("形状 {:?} 的元素总数溢出", shape)))?;
    if data.len() != expected {
      return Err(PipelineError::shape(format!(
        "数据长度不匹配: 形状 {:?} 需要 {}, 实际 {}",
        shape,
        expected,
        data.len()
      )));
    }
    Ok(Self { data, shape })
  }

  pub fn data(&self) -> &'a [f32] {
    self.data
  }

  pub fn shape(&self) -> &'a [usize] {
    self.shape
  }
}

/// 推理后端返回的原始输出
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  data: Vec<f32>,
  shape: Vec<usize>,
}

impl OutputTensor {
  pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, PipelineError> {
    OutputView::new(&data, &shape)?;
    Ok(Self { data, shape })
  }

  pub fn view(&self) -> OutputView<'_> {
    OutputView {
      data: &self.data,
      shape: &self.shape,
    }
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }
}

/// 单个锚点的原始预测
#[derive(Debug, Clone, Copy)]
pub struct RawPrediction<'a> {
  pub center_x: f32,
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
  pub objectness: f32,
  pub class_scores: &'a [f32],
}

/// 解码结果，几何块 `[N, 5]` 与分数块 `[N, C]`
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedOutput {
  geometry: Vec<f32>,
  scores: Vec<f32>,
  num_anchors: usize,
  num_classes: usize,
}

impl DecodedOutput {
  pub fn num_anchors(&self) -> usize {
    self.num_anchors
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  pub fn geometry(&self) -> &[f32] {
    &self.geometry
  }

  pub fn scores(&self) -> &[f32] {
    &self.scores
  }

  pub fn geometry_shape(&self) -> [usize; 2] {
    [self.num_anchors, GEOMETRY_WIDTH]
  }

  pub fn scores_shape(&self) -> [usize; 2] {
    [self.num_anchors, self.num_classes]
  }
}

/// 按 `[N, 5 + C]` 或 `[1, N, 5 + C]` 拆分输出
pub fn decode(output: OutputView<'_>) -> Result<DecodedOutput, PipelineError> {
  let (num_anchors, row_width) = match *output.shape() {
    [n, w] => (n, w),
    [1, n, w] => (n, w),
    [batch, _, _] => {
      return Err(PipelineError::shape(format!(
        "仅支持 batch = 1, 实际为 {}",
        batch
      )));
    }
    _ => {
      return Err(PipelineError::shape(format!(
        "输出维度应为 2 或 3, 实际形状 {:?}",
        output.shape()
      )));
    }
  };

  if row_width <= GEOMETRY_WIDTH {
    return Err(PipelineError::shape(format!(
      "每行宽度 {} 不足 5 + C (C >= 1)",
      row_width
    )));
  }
  let num_classes = row_width - GEOMETRY_WIDTH;

  let geometry_len = block_len(num_anchors, GEOMETRY_WIDTH)?;
  let scores_len = block_len(num_anchors, num_classes)?;
  let mut geometry = Vec::with_capacity(geometry_len);
  let mut scores = Vec::with_capacity(scores_len);
  for row in output.data().chunks_exact(row_width) {
    let (geo, cls) = row.split_at(GEOMETRY_WIDTH);
    geometry.extend_from_slice(geo);
    scores.extend_from_slice(cls);
  }

  debug!("解码输出: {} 个锚点, {} 个类别", num_anchors, num_classes);

  Ok(DecodedOutput {
    geometry,
    scores,
    num_anchors,
    num_classes,
  })
}

/// 校验几何块和分数块的形状，返回 (N, C)
pub(crate) fn check_blocks(
  geometry: &[f32],
  geometry_shape: [usize; 2],
  scores: &[f32],
  scores_shape: [usize; 2],
) -> Result<(usize, usize), PipelineError> {
  let [num_anchors, geo_width] = geometry_shape;
  let [score_rows, num_classes] = scores_shape;

  if geo_width != GEOMETRY_WIDTH {
    return Err(PipelineError::shape(format!(
      "几何块宽度应为 {}, 实际 {}",
      GEOMETRY_WIDTH, geo_width
    )));
  }
  if score_rows != num_anchors {
    return Err(PipelineError::shape(format!(
      "几何块 {} 行与分数块 {} 行不一致",
      num_anchors, score_rows
    )));
  }
  if num_classes == 0 {
    return Err(PipelineError::shape("类别数必须至少为 1"));
  }
  if geometry.len() != block_len(num_anchors, GEOMETRY_WIDTH)? {
    return Err(PipelineError::shape(format!(
      "几何块长度 {} 与形状 {:?} 不符",
      geometry.len(),
      geometry_shape
    )));
  }
  if scores.len() != block_len(num_anchors, num_classes)? {
    return Err(PipelineError::shape(format!(
      "分数块长度 {} 与形状 {:?} 不符",
      scores.len(),
      scores_shape
    )));
  }
  Ok((num_anchors, num_classes))
}

fn block_len(rows: usize, width: usize) -> Result<usize, PipelineError> {
  rows
    .checked_mul(width)
    .ok_or_else(|| PipelineError::shape(format!("块形状 [{}, {}] 的元素总数溢出", rows, width)))
}

/// 逐行遍历已校验的两个块
pub(crate) fn predictions<'a>(
  geometry: &'a [f32],
  scores: &'a [f32],
  num_classes: usize,
) -> impl Iterator<Item = RawPrediction<'a>> + 'a {
  geometry
    .chunks_exact(GEOMETRY_WIDTH)
    .zip(scores.chunks_exact(num_classes))
    .map(|(geo, class_scores)| RawPrediction {
      center_x: geo[0],
      center_y: geo[1],
      width: geo[2],
      height: geo[3],
      objectness: geo[4],
      class_scores,
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rows_are_split_into_blocks() {
    // 2 个锚点, 2 个类别
    let data = vec![
      1.0, 2.0, 3.0, 4.0, 0.5, 0.1, 0.9, //
      5.0, 6.0, 7.0, 8.0, 0.6, 0.8, 0.2,
    ];
    let shape = [1, 2, 7];
    let decoded = decode(OutputView::new(&data, &shape).unwrap()).unwrap();

    assert_eq!(decoded.geometry_shape(), [2, 5]);
    assert_eq!(decoded.scores_shape(), [2, 2]);
    assert_eq!(
      decoded.geometry(),
      &[1.0, 2.0, 3.0, 4.0, 0.5, 5.0, 6.0, 7.0, 8.0, 0.6]
    );
    assert_eq!(decoded.scores(), &[0.1, 0.9, 0.8, 0.2]);
  }

  #[test]
  fn two_dimensional_shape_is_accepted() {
    let data = vec![0.0; 12];
    let shape = [2, 6];
    let decoded = decode(OutputView::new(&data, &shape).unwrap()).unwrap();
    assert_eq!(decoded.num_anchors(), 2);
    assert_eq!(decoded.num_classes(), 1);
  }

  #[test]
  fn empty_output_decodes_to_empty_blocks() {
    let data: Vec<f32> = Vec::new();
    let shape = [1, 0, 85];
    let decoded = decode(OutputView::new(&data, &shape).unwrap()).unwrap();
    assert_eq!(decoded.num_anchors(), 0);
    assert_eq!(decoded.num_classes(), 80);
    assert!(decoded.geometry().is_empty());
  }

  #[test]
  fn length_mismatch_is_rejected() {
    let data = vec![0.0; 10];
    assert!(matches!(
      OutputView::new(&data, &[1, 2, 6]),
      Err(PipelineError::InvalidShape(_))
    ));
    assert!(matches!(
      OutputTensor::new(data, vec![]),
      Err(PipelineError::InvalidShape(_))
    ));
  }

  #[test]
  fn rows_without_class_columns_are_rejected() {
    let data = vec![0.0; 10];
    let shape = [2, 5];
    assert!(matches!(
      decode(OutputView::new(&data, &shape).unwrap()),
      Err(PipelineError::InvalidShape(_))
    ));
  }

  #[test]
  fn batch_larger_than_one_is_rejected() {
    let data = vec![0.0; 24];
    let shape = [2, 2, 6];
    assert!(matches!(
      decode(OutputView::new(&data, &shape).unwrap()),
      Err(PipelineError::InvalidShape(_))
    ));
  }

  #[test]
  fn block_check_reports_row_mismatch() {
    let geometry = vec![0.0; 10];
    let scores = vec![0.0; 3];
    assert!(matches!(
      check_blocks(&geometry, [2, 5], &scores, [3, 1]),
      Err(PipelineError::InvalidShape(_))
    ));
    assert_eq!(
      check_blocks(&geometry, [2, 5], &scores[..2], [2, 1]).unwrap(),
      (2, 1)
    );
  }

  #[test]
  fn overflowing_shape_is_rejected() {
    assert!(matches!(
      OutputView::new(&[], &[usize::MAX, 2]),
      Err(PipelineError::InvalidShape(_))
    ));
    assert!(matches!(
      OutputView::new(&[], &[1 << 62, 8]),
      Err(PipelineError::InvalidShape(_))
    ));
    assert!(matches!(
      OutputTensor::new(Vec::new(), vec![1, 1 << 62, 8]),
      Err(PipelineError::InvalidShape(_))
    ));
  }

  #[test]
  fn block_check_rejects_overflowing_rows() {
    let rows = usize::MAX / 2;
    assert!(matches!(
      check_blocks(&[], [rows, 5], &[], [rows, 1]),
      Err(PipelineError::InvalidShape(_))
    ));
    assert!(matches!(
      check_blocks(&[], [0, 5], &[], [0, usize::MAX]),
      Ok((0, usize::MAX))
    ));
  }
}
