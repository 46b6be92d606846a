// 该文件是 Qingfeng （清风） 项目的一部分。
// src/detector.rs - 目标检测流水线
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

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  decode::decode,
  error::PipelineError,
  frame::RgbNchwTensor,
  letterbox::{LetterboxConfig, Letterboxed, letterbox},
  model::{DetectResult, Inference, Model},
  postprocess::{Postprocessor, PostprocessorConfig},
  remap::remap,
};

#[derive(Error, Debug)]
pub enum DetectorError<E> {
  #[error("流水线错误: {0}")]
  Pipeline(#[from] PipelineError),
  #[error("推理错误: {0}")]
  Inference(E),
}

/// letterbox -> 推理 -> 解码 -> 后处理 -> 坐标还原
///
/// 每次调用互不影响，可以逐帧重复调用。
pub struct Detector<I> {
  inference: I,
  letterbox: LetterboxConfig,
  postprocessor: Postprocessor,
}

impl<I: Inference> Detector<I> {
  pub fn new(inference: I, letterbox: LetterboxConfig, postprocess: PostprocessorConfig) -> Self {
    Self {
      inference,
      letterbox,
      postprocessor: Postprocessor::new(postprocess),
    }
  }

  pub fn letterbox_config(&self) -> &LetterboxConfig {
    &self.letterbox
  }

  pub fn postprocessor(&self) -> &Postprocessor {
    &self.postprocessor
  }

  /// 返回原图像素坐标下的检测框
  pub fn detect(&self, image: &RgbImage) -> Result<DetectResult, DetectorError<I::Error>> {
    let Letterboxed {
      image: boxed,
      ratio,
    } = letterbox(image, &self.letterbox)?;

    let tensor = RgbNchwTensor::from(&boxed);
    debug!("执行推理, 输入形状 {:?}", tensor.shape());
    let output = self
      .inference
      .run(&tensor)
      .map_err(DetectorError::Inference)?;

    let decoded = decode(output.view())?;
    let items = self.postprocessor.forward_decoded(&decoded)?;
    debug!("检测到 {} 个物体", items.len());

    Ok(remap(&items, ratio).into())
  }
}

impl<I: Inference> Model for Detector<I> {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectorError<I::Error>;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}
