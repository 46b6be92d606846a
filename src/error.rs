// 该文件是 Qingfeng （清风） 项目的一部分。
// src/error.rs - 流水线错误定义
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

/// 预处理/后处理核心的错误类型
///
/// 三类错误都是确定性的本地错误，重试没有意义。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
  /// 阈值或上限超出范围，构造时报告
  #[error("配置无效: {0}")]
  InvalidConfig(String),
  /// 张量形状与 `5 + C` 布局不一致
  #[error("张量形状无效: {0}")]
  InvalidShape(String),
  /// 输入图像尺寸退化
  #[error("输入无效: {0}")]
  InvalidInput(String),
}

impl PipelineError {
  pub fn config(msg: impl Into<String>) -> Self {
    PipelineError::InvalidConfig(msg.into())
  }

  pub fn shape(msg: impl Into<String>) -> Self {
    PipelineError::InvalidShape(msg.into())
  }

  pub fn input(msg: impl Into<String>) -> Self {
    PipelineError::InvalidInput(msg.into())
  }
}
