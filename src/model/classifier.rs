// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/model/classifier.rs - 信箱分类器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  POSTBOX_COUNT,
  config::DetectorConfig,
  frame::Frame,
  histogram::{Histogram, HistogramError},
  mask::region_mask,
  model::{BoxMeasurement, ClassificationRow, FrameReport, Model},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClassifierError {
  #[error("分类器尚未用基准帧初始化")]
  NotInitialized,
  #[error("帧尺寸 {actual:?} 与基准帧尺寸 {expected:?} 不一致")]
  FrameSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  #[error("直方图错误: {0}")]
  HistogramError(#[from] HistogramError),
}

/// 基准帧之后保留的状态
struct Baseline {
  dimensions: (u32, u32),
  histograms: [Histogram; POSTBOX_COUNT],
  previous: Histogram,
}

/// 信箱分类器
///
/// 以第一帧（假定所有信箱为空）作为基准，之后每一帧：
///
/// 1. 比较当前帧与上一帧的整帧直方图，相关性低于 `motion_threshold` 时整帧标记为遮挡；
/// 2. 否则对每个信箱，比较区域直方图与基准直方图，相关性低于 `presence_threshold`
///    时标记为有信件。
///
/// 基准直方图只在 [`PostboxClassifier::initialize`] 时计算一次。
pub struct PostboxClassifier {
  config: DetectorConfig,
  baseline: Option<Baseline>,
}

impl PostboxClassifier {
  pub fn new(config: DetectorConfig) -> Self {
    Self {
      config,
      baseline: None,
    }
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn is_initialized(&self) -> bool {
    self.baseline.is_some()
  }

  /// 清除基准与上一帧，下一帧将重新作为基准
  pub fn reset(&mut self) {
    self.baseline = None;
  }

  fn box_histograms(
    &self,
    frame: &Frame,
  ) -> Result<[Histogram; POSTBOX_COUNT], ClassifierError> {
    let (width, height) = frame.dimensions();
    let luma = frame.luma();
    let mut histograms = Vec::with_capacity(POSTBOX_COUNT);
    for region in self.config.layout.iter() {
      let mask = region_mask(width, height, &region.corners);
      histograms.push(Histogram::from_luma(&luma, Some(&mask), self.config.hbins)?);
    }
    Ok(
      histograms
        .try_into()
        .unwrap_or_else(|_| unreachable!("布局固定为 {} 个信箱", POSTBOX_COUNT)),
    )
  }

  /// 用基准帧计算各信箱的基准直方图，返回全空的结果
  pub fn initialize(&mut self, frame: &Frame) -> Result<FrameReport, ClassifierError> {
    let histograms = self.box_histograms(frame)?;
    let previous = Histogram::from_frame(frame, None, self.config.hbins)?;

    info!(
      "基准帧 {} 已记录: {}x{}, {} 个信箱",
      frame.index(),
      frame.width(),
      frame.height(),
      POSTBOX_COUNT
    );

    let boxes = histograms.clone().map(|histogram| BoxMeasurement {
      histogram,
      correlation: 1.0,
    });

    self.baseline = Some(Baseline {
      dimensions: frame.dimensions(),
      histograms,
      previous,
    });

    Ok(FrameReport {
      index: frame.index(),
      row: ClassificationRow::empty(),
      motion_correlation: None,
      boxes: Some(boxes),
    })
  }

  /// 对基准帧之后的一帧进行分类
  pub fn classify(&mut self, frame: &Frame) -> Result<FrameReport, ClassifierError> {
    let hbins = self.config.hbins;
    let motion_threshold = self.config.motion_threshold;
    let presence_threshold = self.config.presence_threshold;

    let baseline = self
      .baseline
      .as_ref()
      .ok_or(ClassifierError::NotInitialized)?;
    if baseline.dimensions != frame.dimensions() {
      return Err(ClassifierError::FrameSizeMismatch {
        expected: baseline.dimensions,
        actual: frame.dimensions(),
      });
    }

    let current = Histogram::from_frame(frame, None, hbins)?;
    let motion = baseline.previous.correlation(&current);

    let (row, boxes) = if motion < motion_threshold {
      debug!(
        "帧 {}: 整帧相关性 {:.4} < {}, 视为遮挡",
        frame.index(),
        motion,
        motion_threshold
      );
      (ClassificationRow::obscured(), None)
    } else {
      let histograms = self.box_histograms(frame)?;
      let mut presence = [false; POSTBOX_COUNT];
      let boxes: [BoxMeasurement; POSTBOX_COUNT] = {
        let mut iter = histograms.into_iter().zip(baseline.histograms.iter());
        std::array::from_fn(|i| {
          let (histogram, base) = iter
            .next()
            .unwrap_or_else(|| unreachable!("布局固定为 {} 个信箱", POSTBOX_COUNT));
          let correlation = base.correlation(&histogram);
          presence[i] = correlation < presence_threshold;
          BoxMeasurement {
            histogram,
            correlation,
          }
        })
      };
      debug!(
        "帧 {}: 整帧相关性 {:.4}, 信箱相关性 {:?}",
        frame.index(),
        motion,
        boxes.iter().map(|b| b.correlation).collect::<Vec<_>>()
      );
      (ClassificationRow::from_presence(presence), Some(boxes))
    };

    if let Some(baseline) = self.baseline.as_mut() {
      baseline.previous = current;
    }

    Ok(FrameReport {
      index: frame.index(),
      row,
      motion_correlation: Some(motion),
      boxes,
    })
  }
}

impl Model for PostboxClassifier {
  type Input = Frame;
  type Output = FrameReport;
  type Error = ClassifierError;

  /// 第一帧作为基准，之后逐帧分类
  fn infer(&mut self, input: &Frame) -> Result<FrameReport, ClassifierError> {
    if self.is_initialized() {
      self.classify(input)
    } else {
      self.initialize(input)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::{Point, PostboxLayout, PostboxRegion},
    model::BoxState,
  };
  use image::{Rgb, RgbImage};

  const W: u32 = 120;
  const H: u32 = 80;

  // 六个互不重叠的 10x10 方块，两行三列
  fn grid_layout() -> PostboxLayout {
    let regions = std::array::from_fn(|i| {
      let x = 10 + (i as i32 % 3) * 35;
      let y = 10 + (i as i32 / 3) * 35;
      PostboxRegion {
        corners: [
          Point::new(x, y),
          Point::new(x + 10, y),
          Point::new(x, y + 10),
          Point::new(x + 10, y + 10),
        ],
        label_anchor: Point::new(x, y),
      }
    });
    PostboxLayout { regions }
  }

  fn classifier() -> PostboxClassifier {
    PostboxClassifier::new(DetectorConfig::default().with_layout(grid_layout()))
  }

  // 上半部分 30，下半部分 200
  fn background(index: u64) -> Frame {
    let image = RgbImage::from_fn(W, H, |_, y| {
      if y < H / 2 {
        Rgb([30, 30, 30])
      } else {
        Rgb([200, 200, 200])
      }
    });
    Frame::new(index, image)
  }

  fn with_box_filled(mut frame: Frame, layout: &PostboxLayout, index: usize, value: u8) -> Frame {
    let mask = region_mask(W, H, &layout.regions[index].corners);
    for (x, y, m) in mask.enumerate_pixels() {
      if m[0] != 0 {
        frame.image_mut().put_pixel(x, y, Rgb([value, value, value]));
      }
    }
    frame
  }

  #[test]
  fn test_classify_requires_baseline() {
    let mut classifier = classifier();
    assert_eq!(
      classifier.classify(&background(1)).unwrap_err(),
      ClassifierError::NotInitialized
    );
  }

  #[test]
  fn test_baseline_row_is_empty() {
    let mut classifier = classifier();
    let report = classifier.infer(&background(0)).unwrap();
    assert_eq!(report.row, ClassificationRow::empty());
    assert!(report.motion_correlation.is_none());
    assert!(classifier.is_initialized());
  }

  #[test]
  fn test_unchanged_frame_is_empty() {
    let mut classifier = classifier();
    classifier.infer(&background(0)).unwrap();
    let report = classifier.infer(&background(1)).unwrap();
    assert_eq!(report.row, ClassificationRow::empty());
    assert!((report.motion_correlation.unwrap() - 1.0).abs() < 1e-9);
  }

  #[test]
  fn test_changed_box_is_present() {
    let layout = grid_layout();
    let mut classifier = classifier();
    classifier.infer(&background(0)).unwrap();
    let frame = with_box_filled(background(1), &layout, 4, 120);
    let report = classifier.infer(&frame).unwrap();

    assert!(report.motion_correlation.unwrap() >= DetectorConfig::default().motion_threshold);
    assert_eq!(report.row.present_boxes(), vec![4]);
    assert_eq!(report.row.get(4), Some(BoxState::PostPresent));
  }

  #[test]
  fn test_global_change_obscures_whole_row() {
    let mut classifier = classifier();
    classifier.infer(&background(0)).unwrap();
    let report = classifier.infer(&Frame::filled(1, W, H, 120)).unwrap();

    assert_eq!(report.row, ClassificationRow::obscured());
    assert!(report.boxes.is_none());
  }

  #[test]
  fn test_motion_compares_against_previous_frame() {
    let mut classifier = classifier();
    classifier.infer(&background(0)).unwrap();
    assert!(classifier.infer(&Frame::filled(1, W, H, 120)).unwrap().row.is_obscured());
    // 与上一帧相同，不再视为遮挡；但与基准相比每个信箱都变了
    let report = classifier.infer(&Frame::filled(2, W, H, 120)).unwrap();
    assert!(!report.row.is_obscured());
    assert_eq!(report.row.present_boxes(), vec![0, 1, 2, 3, 4, 5]);
  }

  #[test]
  fn test_frame_size_must_match_baseline() {
    let mut classifier = classifier();
    classifier.infer(&background(0)).unwrap();
    assert_eq!(
      classifier.infer(&Frame::filled(1, W + 1, H, 30)).unwrap_err(),
      ClassifierError::FrameSizeMismatch {
        expected: (W, H),
        actual: (W + 1, H)
      }
    );
  }

  #[test]
  fn test_reset_takes_new_baseline() {
    let layout = grid_layout();
    let mut classifier = classifier();
    classifier.infer(&background(0)).unwrap();
    classifier.reset();
    assert!(!classifier.is_initialized());

    let changed = with_box_filled(background(1), &layout, 2, 120);
    assert_eq!(classifier.infer(&changed).unwrap().row, ClassificationRow::empty());
    assert_eq!(
      classifier.infer(&changed).unwrap().row,
      ClassificationRow::empty()
    );
  }

  #[test]
  fn test_rows_are_deterministic() {
    let layout = grid_layout();
    let frames = vec![
      background(0),
      background(1),
      with_box_filled(background(2), &layout, 1, 250),
      Frame::filled(3, W, H, 90),
      with_box_filled(background(4), &layout, 5, 120),
    ];

    let run = || {
      let mut classifier = classifier();
      frames
        .iter()
        .map(|f| classifier.infer(f).unwrap().row)
        .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
  }
}
