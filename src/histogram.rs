// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/histogram.rs - 灰度直方图与相关性比较
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

use image::GrayImage;
use thiserror::Error;

use crate::frame::Frame;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HistogramError {
  #[error("分箱数必须在 1..=256 之间, 实际为 {0}")]
  InvalidBins(usize),
  #[error("掩码尺寸 {mask:?} 与图像尺寸 {image:?} 不一致")]
  MaskSizeMismatch { image: (u32, u32), mask: (u32, u32) },
}

/// 灰度直方图，0..=255 等宽分箱，保存未归一化的像素计数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
  bins: Vec<u32>,
}

impl Histogram {
  pub fn from_bins(bins: Vec<u32>) -> Self {
    Self { bins }
  }

  /// 统计灰度图的直方图；给定掩码时只统计掩码非零的像素
  pub fn from_luma(
    image: &GrayImage,
    mask: Option<&GrayImage>,
    bins: usize,
  ) -> Result<Self, HistogramError> {
    if bins == 0 || bins > 256 {
      return Err(HistogramError::InvalidBins(bins));
    }

    let mut counts = vec![0u32; bins];
    let bin_of = |value: u8| value as usize * bins / 256;

    match mask {
      None => {
        for pixel in image.pixels() {
          counts[bin_of(pixel[0])] += 1;
        }
      }
      Some(mask) => {
        if mask.dimensions() != image.dimensions() {
          return Err(HistogramError::MaskSizeMismatch {
            image: image.dimensions(),
            mask: mask.dimensions(),
          });
        }
        for (pixel, m) in image.pixels().zip(mask.pixels()) {
          if m[0] != 0 {
            counts[bin_of(pixel[0])] += 1;
          }
        }
      }
    }

    Ok(Self { bins: counts })
  }

  /// 先转为灰度再统计
  pub fn from_frame(
    frame: &Frame,
    mask: Option<&GrayImage>,
    bins: usize,
  ) -> Result<Self, HistogramError> {
    Self::from_luma(&frame.luma(), mask, bins)
  }

  pub fn bins(&self) -> &[u32] {
    &self.bins
  }

  pub fn len(&self) -> usize {
    self.bins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bins.is_empty()
  }

  /// 参与统计的像素总数
  pub fn total(&self) -> u64 {
    self.bins.iter().map(|&c| c as u64).sum()
  }

  /// 两个直方图的皮尔逊相关系数，1.0 表示分布完全一致
  ///
  /// 任一直方图方差为零（例如空掩码得到的全零直方图）时分母为零，此时返回 1.0，
  /// 与 OpenCV `HISTCMP_CORREL` 的约定一致。分箱数不同时只比较公共部分。
  pub fn correlation(&self, other: &Histogram) -> f64 {
    let n = self.bins.len().min(other.bins.len());
    if n == 0 {
      return 1.0;
    }

    let (mut s1, mut s2, mut s11, mut s22, mut s12) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for (&a, &b) in self.bins.iter().zip(other.bins.iter()) {
      let (a, b) = (a as f64, b as f64);
      s1 += a;
      s2 += b;
      s11 += a * a;
      s22 += b * b;
      s12 += a * b;
    }

    let scale = 1.0 / n as f64;
    let num = s12 - s1 * s2 * scale;
    let denom2 = (s11 - s1 * s1 * scale) * (s22 - s2 * s2 * scale);
    if denom2.abs() > f64::EPSILON {
      num / denom2.sqrt()
    } else {
      1.0
    }
  }

  /// 每行一个分箱计数的文本格式
  pub fn to_text(&self) -> String {
    let mut text = String::with_capacity(self.bins.len() * 4);
    for count in &self.bins {
      text.push_str(&count.to_string());
      text.push('\n');
    }
    text
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Luma;

  fn gradient(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]))
  }

  #[test]
  fn test_counts_every_pixel_without_mask() {
    let image = gradient(40, 30);
    let hist = Histogram::from_luma(&image, None, 64).unwrap();
    assert_eq!(hist.len(), 64);
    assert_eq!(hist.total(), 40 * 30);
  }

  #[test]
  fn test_bin_edges_cover_full_range() {
    let image = GrayImage::from_fn(4, 1, |x, _| Luma([[0u8, 3, 4, 255][x as usize]]));
    let hist = Histogram::from_luma(&image, None, 64).unwrap();
    assert_eq!(hist.bins()[0], 2);
    assert_eq!(hist.bins()[1], 1);
    assert_eq!(hist.bins()[63], 1);
  }

  #[test]
  fn test_mask_restricts_population() {
    let image = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 10 } else { 200 }]));
    let mask = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 255 } else { 0 }]));
    let hist = Histogram::from_luma(&image, Some(&mask), 16).unwrap();

    assert_eq!(hist.total(), 50);
    assert_eq!(hist.bins()[10 * 16 / 256], 50);
    assert_eq!(hist.bins()[200 * 16 / 256], 0);
  }

  #[test]
  fn test_mask_size_must_match() {
    let image = gradient(10, 10);
    let mask = GrayImage::new(9, 10);
    assert_eq!(
      Histogram::from_luma(&image, Some(&mask), 8),
      Err(HistogramError::MaskSizeMismatch {
        image: (10, 10),
        mask: (9, 10)
      })
    );
  }

  #[test]
  fn test_invalid_bins() {
    let image = gradient(4, 4);
    assert_eq!(
      Histogram::from_luma(&image, None, 0),
      Err(HistogramError::InvalidBins(0))
    );
    assert_eq!(
      Histogram::from_luma(&image, None, 257),
      Err(HistogramError::InvalidBins(257))
    );
  }

  #[test]
  fn test_self_correlation_is_maximal() {
    let hist = Histogram::from_luma(&gradient(64, 48), None, 64).unwrap();
    assert!((hist.correlation(&hist) - 1.0).abs() < 1e-12);
  }

  #[test]
  fn test_disjoint_spikes_are_dissimilar() {
    let mut a = vec![0u32; 64];
    let mut b = vec![0u32; 64];
    a[7] = 1000;
    b[62] = 1000;
    let corr = Histogram::from_bins(a).correlation(&Histogram::from_bins(b));
    assert!((corr + 1.0 / 63.0).abs() < 1e-12);
  }

  #[test]
  fn test_flat_histograms_correlate_fully() {
    let empty = Histogram::from_bins(vec![0; 64]);
    let flat = Histogram::from_bins(vec![5; 64]);
    assert_eq!(empty.correlation(&flat), 1.0);
  }

  #[test]
  fn test_scaled_histogram_is_perfectly_correlated() {
    let a = Histogram::from_bins((0..32).map(|i| i * 3 + 1).collect());
    let b = Histogram::from_bins((0..32).map(|i| (i * 3 + 1) * 4).collect());
    assert!((a.correlation(&b) - 1.0).abs() < 1e-12);
  }

  #[test]
  fn test_to_text_one_bin_per_line() {
    let hist = Histogram::from_bins(vec![3, 0, 12]);
    assert_eq!(hist.to_text(), "3\n0\n12\n");
  }
}
