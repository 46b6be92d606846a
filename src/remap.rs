// 该文件是 Qingfeng （清风） 项目的一部分。
// src/remap.rs - 坐标还原
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

use crate::{letterbox::LetterboxRatio, model::DetectItem};

/// 把网络输入空间的框映射回原图像素空间
///
/// 只做缩放不做平移。落在填充区域的框会被映射到原图范围之外，由使用方裁剪或忽略。
pub fn remap_item(item: &DetectItem, ratio: LetterboxRatio) -> DetectItem {
  let [x1, y1, x2, y2] = item.bbox;
  DetectItem {
    class_id: item.class_id,
    score: item.score,
    bbox: [x1 * ratio.x, y1 * ratio.y, x2 * ratio.x, y2 * ratio.y],
  }
}

pub fn remap(items: &[DetectItem], ratio: LetterboxRatio) -> Vec<DetectItem> {
  items
    .iter()
    .map(|item| remap_item(item, ratio))
    .collect()
}

/// 把框裁剪到 `width × height` 的图像范围内
pub fn clip_to_image(item: &DetectItem, width: u32, height: u32) -> DetectItem {
  let (w, h) = (width as f32, height as f32);
  let [x1, y1, x2, y2] = item.bbox;
  DetectItem {
    class_id: item.class_id,
    score: item.score,
    bbox: [x1.clamp(0.0, w), y1.clamp(0.0, h), x2.clamp(0.0, w), y2.clamp(0.0, h)],
  }
}
