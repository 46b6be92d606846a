// 该文件是 Qingfeng （清风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化与记录
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

use std::path::Path;

use image::Rgb;
use serde_json::json;

use crate::{
  label::Labels,
  model::{DetectItem, DetectResult},
};

#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
pub use self::painter::{Draw, FontLoadError};

// 按类别号循环取色
const PALETTE: [[u8; 3]; 10] = [
  [255, 56, 56],
  [255, 157, 151],
  [255, 112, 31],
  [255, 178, 29],
  [207, 210, 49],
  [72, 249, 10],
  [26, 147, 52],
  [0, 212, 187],
  [0, 194, 255],
  [52, 69, 147],
];

pub fn class_color(class_id: usize) -> Rgb<u8> {
  Rgb(PALETTE[class_id % PALETTE.len()])
}

#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
mod painter {
  use std::{path::Path, sync::Arc};

  use ab_glyph::{FontVec, PxScale};
  use image::{Rgb, RgbImage};
  use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
  };
  use thiserror::Error;
  use tracing::info;
  use url::Url;

  use super::class_color;
  use crate::{
    label::Labels,
    model::{DetectItem, DetectResult},
    remap::clip_to_image,
  };

  const BOX_THICKNESS: u32 = 2;
  const LABEL_FONT_SIZE: f32 = 20.0;
  const LABEL_TEXT_HEIGHT: u32 = 24;
  const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度，粗略估计
  const LABEL_TEXT_PADDING: i32 = 2;
  const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

  #[derive(Error, Debug)]
  pub enum FontLoadError {
    #[error("无法读取字体文件: {0}")]
    Io(#[from] std::io::Error),
    #[error("字体文件无效: {0}")]
    InvalidFont(#[from] ab_glyph::InvalidFont),
  }

  /// 在原图上画检测框
  ///
  /// 加载了字体时在框上方写 `名称 置信度`，否则只画框。
  #[derive(Clone, Default)]
  pub struct Draw {
    font: Option<Arc<FontVec>>,
    pub labels: Labels,
  }

  impl Draw {
    /// 读取 URL 中的 `font` 参数
    pub fn from_url(url: &Url) -> Result<Self, FontLoadError> {
      match url.query_pairs().find(|(k, _)| k == "font") {
        Some((_, path)) => Draw::default().with_font_file(&*path),
        None => Ok(Draw::default()),
      }
    }

    pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, FontLoadError> {
      let path = path.as_ref();
      let font = FontVec::try_from_vec(std::fs::read(path)?)?;
      info!("加载标签字体: {}", path.display());
      self.font = Some(Arc::new(font));
      Ok(self)
    }

    pub fn has_font(&self) -> bool {
      self.font.is_some()
    }

    // 超出图像的部分先裁剪，退化为线或点的框不绘制
    fn draw_bbox(&self, image: &mut RgbImage, item: &DetectItem) {
      let (w, h) = image.dimensions();
      let [x_min, y_min, x_max, y_max] = clip_to_image(item, w, h).bbox;
      let x_min = x_min.floor() as i32;
      let y_min = y_min.floor() as i32;
      let x_max = (x_max.ceil() as i32).min(w as i32 - 1);
      let y_max = (y_max.ceil() as i32).min(h as i32 - 1);

      let color = class_color(item.class_id);
      for t in 0..BOX_THICKNESS as i32 {
        let width = x_max - x_min - 2 * t;
        let height = y_max - y_min - 2 * t;
        if width <= 0 || height <= 0 {
          break;
        }
        let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
        draw_hollow_rect_mut(image, rect, color);
      }

      if let Some(font) = &self.font {
        let text = format!("{} {:.2}", self.labels.name(item.class_id), item.score);
        if let Some(rect) = label_rect(&text, x_min, y_min, w) {
          draw_filled_rect_mut(image, rect, color);
          draw_text_mut(
            image,
            LABEL_TEXT_COLOR,
            rect.left() + LABEL_TEXT_PADDING,
            rect.top() + LABEL_TEXT_PADDING,
            PxScale::from(LABEL_FONT_SIZE),
            &**font,
            &text,
          );
        }
      }
    }

    pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
      for item in result.iter() {
        self.draw_bbox(image, item);
      }
    }
  }

  /// 标签底色放在框的上方，靠近上边缘时贴住图像顶部
  fn label_rect(text: &str, x_min: i32, y_min: i32, image_width: u32) -> Option<Rect> {
    let text_width = (text.chars().count() as f32 * LABEL_CHAR_WIDTH) as i32;
    let x = x_min.max(0);
    let y = (y_min - LABEL_TEXT_HEIGHT as i32).max(0);
    let width = text_width.min(image_width as i32 - x);
    if width <= 0 {
      return None;
    }
    Some(Rect::at(x, y).of_size(width as u32, LABEL_TEXT_HEIGHT))
  }

  #[cfg(test)]
  mod tests {
    use super::*;

    #[test]
    fn label_sits_above_box() {
      let rect = label_rect("dog 0.90", 100, 80, 640).unwrap();
      assert_eq!((rect.left(), rect.top()), (100, 56));
      assert_eq!((rect.width(), rect.height()), (88, LABEL_TEXT_HEIGHT));
    }

    #[test]
    fn label_is_kept_inside_image() {
      let rect = label_rect("person 0.50", 600, 5, 640).unwrap();
      assert_eq!(rect.top(), 0);
      assert_eq!(rect.width(), 40);
      assert!(label_rect("cat 0.70", 640, 100, 640).is_none());
    }

    #[test]
    fn url_without_font_draws_boxes_only() {
      let url = Url::parse("image:///tmp/out.png?record").unwrap();
      assert!(!Draw::from_url(&url).unwrap().has_font());
    }

    #[test]
    fn unreadable_or_invalid_font_is_reported() {
      let dir = tempfile::tempdir().unwrap();
      let missing = dir.path().join("missing.ttf");
      let url = Url::parse(&format!("image:///tmp/out.png?font={}", missing.display())).unwrap();
      assert!(matches!(Draw::from_url(&url), Err(FontLoadError::Io(_))));

      let broken = dir.path().join("broken.ttf");
      std::fs::write(&broken, b"not a font").unwrap();
      assert!(matches!(
        Draw::default().with_font_file(&broken),
        Err(FontLoadError::InvalidFont(_))
      ));
    }

    #[test]
    fn boxes_are_drawn_inside_image() {
      let mut image = RgbImage::new(64, 48);
      let result: DetectResult = vec![DetectItem {
        class_id: 3,
        score: 0.8,
        bbox: [8.0, 8.0, 40.0, 100.0],
      }]
      .into();
      Draw::default().draw_detections(&mut image, &result);

      assert_eq!(*image.get_pixel(8, 8), class_color(3));
      assert_eq!(*image.get_pixel(9, 20), class_color(3));
      assert_eq!(*image.get_pixel(40, 47), class_color(3));
      assert_eq!(*image.get_pixel(20, 20), Rgb([0, 0, 0]));
    }
  }
}

/// 把检测结果写成文本和 JSON 记录
#[derive(Debug, Clone, Default)]
pub struct Record {
  pub label_with_name: bool,
  pub labels: Labels,
}

impl Record {
  fn label_of(&self, item: &DetectItem) -> String {
    if self.label_with_name {
      self.labels.name(item.class_id).to_string()
    } else {
      item.class_id.to_string()
    }
  }

  /// 每行 `label, score, x1, y1, x2, y2`
  pub fn to_lines(&self, result: &DetectResult) -> String {
    result
      .iter()
      .map(|item| {
        format!(
          "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
          self.label_of(item),
          item.score,
          item.bbox[0],
          item.bbox[1],
          item.bbox[2],
          item.bbox[3]
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub fn to_json(&self, result: &DetectResult) -> serde_json::Value {
    let items: Vec<serde_json::Value> = result
      .iter()
      .map(|item| {
        json!({
          "class_id": item.class_id,
          "label": self.labels.name(item.class_id),
          "score": item.score,
          "bbox": item.bbox,
        })
      })
      .collect();
    json!({ "count": items.len(), "detections": items })
  }

  /// 写出 `<path>.txt` 与 `<path>.json`
  pub fn record(&self, result: &DetectResult, path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.to_lines(result))?;
    let json = serde_json::to_string_pretty(&self.to_json(result))?;
    std::fs::write(path.with_extension("json"), json)?;
    Ok(())
  }
}
