// 该文件是 Qingfeng （清风） 项目的一部分。
// src/letterbox.rs - Letterbox 几何变换
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

use image::{
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use tracing::debug;

use crate::error::PipelineError;

pub const DEFAULT_MODEL_INPUT_SIDE: u32 = 640;
pub const DEFAULT_TARGET_STRIDE: u32 = 32;
pub const DEFAULT_FILL: [u8; 3] = [114, 114, 114];

/// Letterbox 配置，构造后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LetterboxConfig {
  model_input_side: u32,
  target_stride: u32,
  target_size: u32,
  fill: [u8; 3],
}

impl Default for LetterboxConfig {
  fn default() -> Self {
    Self {
      model_input_side: DEFAULT_MODEL_INPUT_SIDE,
      target_stride: DEFAULT_TARGET_STRIDE,
      target_size: DEFAULT_MODEL_INPUT_SIDE,
      fill: DEFAULT_FILL,
    }
  }
}

impl LetterboxConfig {
  pub fn new(model_input_side: u32, target_stride: u32) -> Result<Self, PipelineError> {
    if model_input_side == 0 {
      return Err(PipelineError::config("model_input_side 必须大于 0"));
    }
    if target_stride == 0 {
      return Err(PipelineError::config("target_stride 必须大于 0"));
    }
    // 向上取整到步长的整数倍
    let target_size = model_input_side
      .div_ceil(target_stride)
      .checked_mul(target_stride)
      .ok_or_else(|| {
        PipelineError::config(format!(
          "model_input_side {} 按步长 {} 对齐后超出 u32 范围",
          model_input_side, target_stride
        ))
      })?;
    Ok(Self {
      model_input_side,
      target_stride,
      target_size,
      fill: DEFAULT_FILL,
    })
  }

  /// 由模型输入尺寸 (宽, 高) 构造，取较长边
  pub fn from_input_size(width: u32, height: u32, target_stride: u32) -> Result<Self, PipelineError> {
    Self::new(width.max(height), target_stride)
  }

  pub fn with_fill(mut self, fill: [u8; 3]) -> Self {
    self.fill = fill;
    self
  }

  pub fn model_input_side(&self) -> u32 {
    self.model_input_side
  }

  pub fn target_stride(&self) -> u32 {
    self.target_stride
  }

  pub fn fill(&self) -> [u8; 3] {
    self.fill
  }

  /// 步长对齐后的网络输入边长
  pub fn target_size(&self) -> u32 {
    self.target_size
  }
}

/// 网络输入空间到原图空间的缩放比例
///
/// 填充只加在右侧和下侧，因此逆变换只需缩放，无需平移。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxRatio {
  pub x: f32,
  pub y: f32,
}

impl LetterboxRatio {
  pub fn uniform(ratio: f32) -> Self {
    Self { x: ratio, y: ratio }
  }

  pub fn identity() -> Self {
    Self::uniform(1.0)
  }
}

#[derive(Debug, Clone)]
pub struct Letterboxed {
  pub image: RgbImage,
  pub ratio: LetterboxRatio,
}

/// 将图像填充为正方形并缩放到步长对齐的目标尺寸
pub fn letterbox(source: &RgbImage, config: &LetterboxConfig) -> Result<Letterboxed, PipelineError> {
  let (width, height) = source.dimensions();
  if width == 0 || height == 0 {
    return Err(PipelineError::input(format!(
      "图像尺寸退化: {}x{}",
      width, height
    )));
  }

  let max_side = width.max(height);
  let target_size = config.target_size();

  let image = if width == height {
    resize_square(source, target_size)
  } else {
    let padded = pad_bottom_right(source, max_side, config.fill);
    resize_square(&padded, target_size)
  };

  let ratio = LetterboxRatio::uniform(max_side as f32 / target_size as f32);
  debug!(
    "letterbox: {}x{} -> {}x{} (边长 {}), 比例 {:.4}",
    width, height, target_size, target_size, max_side, ratio.x
  );

  Ok(Letterboxed { image, ratio })
}

fn pad_bottom_right(source: &RgbImage, side: u32, fill: [u8; 3]) -> RgbImage {
  let mut padded = RgbImage::from_pixel(side, side, Rgb(fill));
  imageops::replace(&mut padded, source, 0, 0);
  padded
}

fn resize_square(square: &RgbImage, target_size: u32) -> RgbImage {
  if square.width() == target_size {
    return square.clone();
  }
  // Triangle 即双线性插值
  imageops::resize(square, target_size, target_size, FilterType::Triangle)
}
