// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/config.rs - 信箱几何布局与检测参数
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::POSTBOX_COUNT;

/// 默认直方图分箱数
pub const DEFAULT_HBINS: usize = 64;
/// 默认运动（遮挡）阈值 T1
pub const DEFAULT_MOTION_THRESHOLD: f64 = 0.9875;
/// 默认信件阈值 T2
pub const DEFAULT_PRESENCE_THRESHOLD: f64 = 0.85;
/// 角点坐标的绝对值上限，超出时掩码生成会先截断到该范围
pub const MAX_CORNER_COORDINATE: i32 = 10_000;

// 原始拍摄机位下六个信箱的四个角点，顺序为 左上、右上、左下、右下
const DEFAULT_CORNERS: [[(i32, i32); 4]; POSTBOX_COUNT] = [
  [(26, 113), (106, 113), (13, 133), (107, 134)],
  [(119, 115), (199, 115), (119, 135), (210, 136)],
  [(30, 218), (108, 218), (18, 255), (109, 254)],
  [(119, 217), (194, 217), (118, 253), (207, 253)],
  [(32, 317), (106, 315), (22, 365), (108, 363)],
  [(119, 315), (191, 314), (118, 362), (202, 361)],
];

const DEFAULT_LABEL_ANCHORS: [(i32, i32); POSTBOX_COUNT] = [
  (26, 113),
  (119, 115),
  (30, 218),
  (119, 217),
  (32, 317),
  (119, 315),
];

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("直方图分箱数必须在 1..=256 之间, 实际为 {0}")]
  InvalidBins(usize),
  #[error("阈值 {name} 必须是有限数值, 实际为 {value}")]
  InvalidThreshold { name: &'static str, value: f64 },
  #[error("信箱 {slot} 的角点 ({x}, {y}) 超出 ±{max} 范围", max = MAX_CORNER_COORDINATE)]
  CornerOutOfRange { slot: usize, x: i32, y: i32 },
}

/// 像素坐标，序列化为 `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Point {
  pub x: i32,
  pub y: i32,
}

impl Point {
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }

  pub fn within_range(&self) -> bool {
    (-MAX_CORNER_COORDINATE..=MAX_CORNER_COORDINATE).contains(&self.x)
      && (-MAX_CORNER_COORDINATE..=MAX_CORNER_COORDINATE).contains(&self.y)
  }

  /// 截断到 ±[`MAX_CORNER_COORDINATE`]
  pub fn clamped(&self) -> Self {
    Self {
      x: self.x.clamp(-MAX_CORNER_COORDINATE, MAX_CORNER_COORDINATE),
      y: self.y.clamp(-MAX_CORNER_COORDINATE, MAX_CORNER_COORDINATE),
    }
  }
}

impl From<(i32, i32)> for Point {
  fn from((x, y): (i32, i32)) -> Self {
    Self { x, y }
  }
}

impl From<Point> for (i32, i32) {
  fn from(point: Point) -> Self {
    (point.x, point.y)
  }
}

/// 单个信箱区域：四个角点（任意顺序，取凸包）以及标注文字的锚点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostboxRegion {
  pub corners: [Point; 4],
  pub label_anchor: Point,
}

/// 六个信箱的布局，下标即信箱编号
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostboxLayout {
  pub regions: [PostboxRegion; POSTBOX_COUNT],
}

impl Default for PostboxLayout {
  fn default() -> Self {
    let regions = std::array::from_fn(|i| PostboxRegion {
      corners: DEFAULT_CORNERS[i].map(Point::from),
      label_anchor: Point::from(DEFAULT_LABEL_ANCHORS[i]),
    });
    Self { regions }
  }
}

impl PostboxLayout {
  pub fn iter(&self) -> impl Iterator<Item = &PostboxRegion> {
    self.regions.iter()
  }
}

/// 检测器配置，构造分类器时传入，之后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
  pub layout: PostboxLayout,
  pub hbins: usize,
  /// 相邻两帧整帧直方图相关性低于该值时视为画面被遮挡
  pub motion_threshold: f64,
  /// 信箱区域直方图与基准的相关性低于该值时视为有信件
  pub presence_threshold: f64,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      layout: PostboxLayout::default(),
      hbins: DEFAULT_HBINS,
      motion_threshold: DEFAULT_MOTION_THRESHOLD,
      presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
    }
  }
}

impl DetectorConfig {
  pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
    let config: DetectorConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("读取检测配置: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  pub fn with_hbins(mut self, hbins: usize) -> Self {
    self.hbins = hbins;
    self
  }

  pub fn with_motion_threshold(mut self, threshold: f64) -> Self {
    self.motion_threshold = threshold;
    self
  }

  pub fn with_presence_threshold(mut self, threshold: f64) -> Self {
    self.presence_threshold = threshold;
    self
  }

  pub fn with_layout(mut self, layout: PostboxLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.hbins == 0 || self.hbins > 256 {
      return Err(ConfigError::InvalidBins(self.hbins));
    }
    if !self.motion_threshold.is_finite() {
      return Err(ConfigError::InvalidThreshold {
        name: "motion_threshold",
        value: self.motion_threshold,
      });
    }
    if !self.presence_threshold.is_finite() {
      return Err(ConfigError::InvalidThreshold {
        name: "presence_threshold",
        value: self.presence_threshold,
      });
    }
    for (i, region) in self.layout.iter().enumerate() {
      if let Some(p) = region.corners.iter().find(|p| !p.within_range()) {
        return Err(ConfigError::CornerOutOfRange {
          slot: i + 1,
          x: p.x,
          y: p.y,
        });
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_layout_matches_camera() {
    let layout = PostboxLayout::default();
    assert_eq!(layout.regions[0].corners[0], Point::new(26, 113));
    assert_eq!(layout.regions[5].corners[3], Point::new(202, 361));
    assert_eq!(layout.regions[3].label_anchor, Point::new(119, 217));
  }

  #[test]
  fn test_partial_json_falls_back_to_defaults() {
    let config = DetectorConfig::from_json_str(r#"{ "hbins": 32 }"#).unwrap();
    assert_eq!(config.hbins, 32);
    assert_eq!(config.motion_threshold, DEFAULT_MOTION_THRESHOLD);
    assert_eq!(config.layout, PostboxLayout::default());
  }

  #[test]
  fn test_json_points_are_pairs() {
    let json = serde_json::to_value(PostboxLayout::default()).unwrap();
    assert_eq!(json["regions"][0]["corners"][1], serde_json::json!([106, 113]));

    let back: PostboxLayout = serde_json::from_value(json).unwrap();
    assert_eq!(back, PostboxLayout::default());
  }

  #[test]
  fn test_invalid_bins_rejected() {
    assert!(matches!(
      DetectorConfig::default().with_hbins(0).validate(),
      Err(ConfigError::InvalidBins(0))
    ));
    assert!(matches!(
      DetectorConfig::from_json_str(r#"{ "hbins": 300 }"#),
      Err(ConfigError::InvalidBins(300))
    ));
  }

  #[test]
  fn test_non_finite_threshold_rejected() {
    let config = DetectorConfig::default().with_presence_threshold(f64::NAN);
    assert!(matches!(
      config.validate(),
      Err(ConfigError::InvalidThreshold {
        name: "presence_threshold",
        ..
      })
    ));
  }

  #[test]
  fn test_far_corner_rejected() {
    let mut layout = PostboxLayout::default();
    layout.regions[2].corners[1] = Point::new(40, -2_000_000_000);
    let config = DetectorConfig::default().with_layout(layout);
    assert!(matches!(
      config.validate(),
      Err(ConfigError::CornerOutOfRange {
        slot: 3,
        x: 40,
        y: -2_000_000_000
      })
    ));

    let json = r#"{ "layout": { "regions": [
      { "corners": [[0, 0], [10, 0], [0, 10], [10, 20000]], "label_anchor": [0, 0] },
      { "corners": [[0, 0], [10, 0], [0, 10], [10, 10]], "label_anchor": [0, 0] },
      { "corners": [[0, 0], [10, 0], [0, 10], [10, 10]], "label_anchor": [0, 0] },
      { "corners": [[0, 0], [10, 0], [0, 10], [10, 10]], "label_anchor": [0, 0] },
      { "corners": [[0, 0], [10, 0], [0, 10], [10, 10]], "label_anchor": [0, 0] },
      { "corners": [[0, 0], [10, 0], [0, 10], [10, 10]], "label_anchor": [0, 0] }
    ] } }"#;
    assert!(matches!(
      DetectorConfig::from_json_str(json),
      Err(ConfigError::CornerOutOfRange { slot: 1, .. })
    ));
  }

  #[test]
  fn test_clamped_point() {
    assert_eq!(Point::new(i32::MIN, 5).clamped(), Point::new(-MAX_CORNER_COORDINATE, 5));
    assert!(Point::new(i32::MAX, 0).clamped().within_range());
    assert!(!Point::new(0, MAX_CORNER_COORDINATE + 1).within_range());
  }
}
