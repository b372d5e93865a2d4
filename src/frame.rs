// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/frame.rs - 视频帧定义
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

use image::{GrayImage, Rgb, RgbImage, imageops};

/// 解码后的一帧 RGB 图像以及其在视频中的序号
#[derive(Debug, Clone)]
pub struct Frame {
  index: u64,
  image: RgbImage,
}

impl Frame {
  pub fn new(index: u64, image: RgbImage) -> Self {
    Self { index, image }
  }

  /// 以单一颜色填充的帧，主要用于构造合成视频
  pub fn filled(index: u64, width: u32, height: u32, value: u8) -> Self {
    Self::new(
      index,
      RgbImage::from_pixel(width, height, Rgb([value, value, value])),
    )
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn image_mut(&mut self) -> &mut RgbImage {
    &mut self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }

  /// 灰度图
  pub fn luma(&self) -> GrayImage {
    imageops::grayscale(&self.image)
  }
}

impl AsRef<RgbImage> for Frame {
  fn as_ref(&self) -> &RgbImage {
    &self.image
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_grey_pixels_keep_intensity() {
    let frame = Frame::filled(3, 8, 4, 77);
    let luma = frame.luma();

    assert_eq!(frame.index(), 3);
    assert_eq!(luma.dimensions(), (8, 4));
    assert!(luma.pixels().all(|p| p[0] == 77));
  }
}
