// 该文件是 Qingfeng （清风） 项目的一部分。
// src/model/replay.rs - 回放推理输出
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

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::OutputTensor,
  error::PipelineError,
  frame::RgbNchwTensor,
  model::Inference,
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("缺少 shape 参数")]
  MissingShape,
  #[error("shape 参数无效: {0}")]
  InvalidShapeParam(String),
  #[error("文件长度 {0} 不是 4 的倍数")]
  TruncatedFile(usize),
  #[error(transparent)]
  Pipeline(#[from] PipelineError),
}

/// 把事先导出的网络输出（小端 f32）作为每一帧的推理结果
///
/// URL 形如 `replay:///path/output.bin?shape=1,25200,85`。
#[derive(Debug, Clone)]
pub struct ReplayModel {
  output: OutputTensor,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModel {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let shape = url
      .query_pairs()
      .find(|(k, _)| k == "shape")
      .map(|(_, v)| parse_shape(&v))
      .ok_or(ReplayError::MissingShape)??;

    info!("加载回放输出: {}", url.path());
    let bytes = std::fs::read(url.path())?;
    debug!(
      "回放文件大小: {:.2} MB",
      bytes.len() as f64 / (1024.0 * 1024.0)
    );

    Self::from_le_bytes(&bytes, shape)
  }
}

impl ReplayModel {
  pub fn new(output: OutputTensor) -> Self {
    Self { output }
  }

  pub fn from_le_bytes(bytes: &[u8], shape: Vec<usize>) -> Result<Self, ReplayError> {
    if bytes.len() % 4 != 0 {
      error!("回放文件长度 {} 不是 4 的倍数", bytes.len());
      return Err(ReplayError::TruncatedFile(bytes.len()));
    }
    let data = bytes
      .chunks_exact(4)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect();
    Ok(Self::new(OutputTensor::new(data, shape)?))
  }
}

fn parse_shape(text: &str) -> Result<Vec<usize>, ReplayError> {
  text
    .split(',')
    .map(|dim| {
      dim
        .trim()
        .parse::<usize>()
        .map_err(|e| ReplayError::InvalidShapeParam(format!("{}: {}", text, e)))
    })
    .collect()
}

impl Inference for ReplayModel {
  type Error = ReplayError;

  fn run(&self, input: &RgbNchwTensor) -> Result<OutputTensor, Self::Error> {
    debug!(
      "回放推理: 输入 {:?}, 输出 {:?}",
      input.shape(),
      self.output.shape()
    );
    Ok(self.output.clone())
  }
}
