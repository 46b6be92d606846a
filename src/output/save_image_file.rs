// 该文件是 Qingfeng （清风） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use image::RgbImage;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  label::Labels,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, FontLoadError, Record},
  },
};

/// 在原图上画框后保存，`?record` 时同时写出记录文件
pub struct SaveImageFileOutput {
  path: String,
  draw: Draw,
  record: Option<Record>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("字体错误: {0}")]
  FontError(#[from] FontLoadError),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let record = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| Record {
        label_with_name: v != "id",
        labels: Labels::default(),
      });

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
      draw: Draw::from_url(uri)?,
      record,
    })
  }
}

impl SaveImageFileOutput {
  pub fn with_labels(mut self, labels: Labels) -> Self {
    if let Some(record) = self.record.as_mut() {
      record.labels = labels.clone();
    }
    self.draw.labels = labels;
    self
  }

  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    let path = Path::new(&self.path);
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(path)?;

    warn!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<RgbImage, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    let mut image = frame.clone();
    self.draw.draw_detections(&mut image, result);
    self.save_image(&image)?;
    if let Some(record) = &self.record {
      record.record(result, Path::new(&self.path))?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;

  #[test]
  fn drawn_image_and_record_are_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("result.png");
    let url = Url::parse(&format!("image://{}?record=name", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let frame = RgbImage::new(32, 32);
    let result: DetectResult = vec![DetectItem {
      class_id: 0,
      score: 0.75,
      bbox: [4.0, 4.0, 20.0, 20.0],
    }]
    .into();
    output.render_result(&frame, &result).unwrap();

    assert!(path.exists());
    let text = std::fs::read_to_string(path.with_extension("txt")).unwrap();
    assert!(text.starts_with("person, 0.7500"));
  }

  #[test]
  fn missing_font_is_reported() {
    let url = Url::parse("image:///tmp/out.png?font=/nonexistent/label.ttf").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::FontError(FontLoadError::Io(_)))
    ));
  }
}
