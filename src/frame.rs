// 该文件是 Qingfeng （清风） 项目的一部分。
// src/frame.rs - NCHW 输入张量定义
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

const RGB_CHANNELS: usize = 3;
const PIXEL_SCALE: f32 = 1.0 / 255.0;

/// 归一化到 [0, 1] 的 RGB 浮点张量，形状 `[1, 3, H, W]`
#[derive(Debug, Clone)]
pub struct RgbNchwTensor {
  data: Box<[f32]>,
  height: usize,
  width: usize,
}

impl From<&RgbImage> for RgbNchwTensor {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);
    let plane = width * height;
    let mut data = vec![0.0f32; RGB_CHANNELS * plane];

    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = y as usize * width + x as usize;
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = pixel[c] as f32 * PIXEL_SCALE;
      }
    }

    Self {
      data: data.into_boxed_slice(),
      height,
      width,
    }
  }
}

impl RgbNchwTensor {
  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.height, self.width]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;
  use image::Rgb;

  #[test]
  fn hwc_is_split_into_planes() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([255, 0, 51]));
    image.put_pixel(1, 0, Rgb([0, 255, 102]));

    let tensor = RgbNchwTensor::from(&image);
    assert_eq!(tensor.shape(), [1, 3, 1, 2]);

    let data = tensor.as_nchw();
    assert_relative_eq!(data[0], 1.0, epsilon = 1e-6);
    assert_relative_eq!(data[1], 0.0);
    assert_relative_eq!(data[2], 0.0);
    assert_relative_eq!(data[3], 1.0, epsilon = 1e-6);
    assert_relative_eq!(data[4], 0.2, epsilon = 1e-6);
    assert_relative_eq!(data[5], 0.4, epsilon = 1e-6);
  }
}
