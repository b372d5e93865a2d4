// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/model.rs - 分类结果与模型接口
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{POSTBOX_COUNT, histogram::Histogram};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个信箱在某一帧的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum BoxState {
  /// 画面被遮挡，无法判断
  Obscured,
  #[default]
  Empty,
  PostPresent,
}

impl BoxState {
  pub fn as_i8(self) -> i8 {
    match self {
      BoxState::Obscured => -1,
      BoxState::Empty => 0,
      BoxState::PostPresent => 1,
    }
  }
}

impl From<BoxState> for i8 {
  fn from(state: BoxState) -> Self {
    state.as_i8()
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RowError {
  #[error("无效的信箱状态值: {0}")]
  InvalidState(i8),
  #[error("遮挡必须作用于整帧，但该行只有部分信箱被标记为遮挡")]
  PartialObscuration,
}

impl TryFrom<i8> for BoxState {
  type Error = RowError;

  fn try_from(value: i8) -> Result<Self, Self::Error> {
    match value {
      -1 => Ok(BoxState::Obscured),
      0 => Ok(BoxState::Empty),
      1 => Ok(BoxState::PostPresent),
      other => Err(RowError::InvalidState(other)),
    }
  }
}

/// 一帧的分类结果，每个信箱一个状态
///
/// 遮挡是整帧状态：只要有一个元素为 `Obscured`，六个元素都是 `Obscured`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "[BoxState; POSTBOX_COUNT]", into = "[BoxState; POSTBOX_COUNT]")]
pub struct ClassificationRow([BoxState; POSTBOX_COUNT]);

impl ClassificationRow {
  pub fn empty() -> Self {
    Self([BoxState::Empty; POSTBOX_COUNT])
  }

  pub fn obscured() -> Self {
    Self([BoxState::Obscured; POSTBOX_COUNT])
  }

  /// 由各信箱是否有信件构造
  pub fn from_presence(presence: [bool; POSTBOX_COUNT]) -> Self {
    Self(presence.map(|present| {
      if present {
        BoxState::PostPresent
      } else {
        BoxState::Empty
      }
    }))
  }

  pub fn is_obscured(&self) -> bool {
    self.0[0] == BoxState::Obscured
  }

  pub fn get(&self, index: usize) -> Option<BoxState> {
    self.0.get(index).copied()
  }

  pub fn states(&self) -> &[BoxState; POSTBOX_COUNT] {
    &self.0
  }

  /// 有信件的信箱下标（从 0 开始）
  pub fn present_boxes(&self) -> Vec<usize> {
    self
      .0
      .iter()
      .enumerate()
      .filter(|(_, s)| **s == BoxState::PostPresent)
      .map(|(i, _)| i)
      .collect()
  }

  pub fn as_i8s(&self) -> [i8; POSTBOX_COUNT] {
    self.0.map(BoxState::as_i8)
  }
}

impl TryFrom<[BoxState; POSTBOX_COUNT]> for ClassificationRow {
  type Error = RowError;

  fn try_from(states: [BoxState; POSTBOX_COUNT]) -> Result<Self, Self::Error> {
    let obscured = states.iter().filter(|s| **s == BoxState::Obscured).count();
    if obscured != 0 && obscured != POSTBOX_COUNT {
      return Err(RowError::PartialObscuration);
    }
    Ok(Self(states))
  }
}

impl From<ClassificationRow> for [BoxState; POSTBOX_COUNT] {
  fn from(row: ClassificationRow) -> Self {
    row.0
  }
}

impl fmt::Display for ClassificationRow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let values = self.as_i8s().map(|v| format!("{:>2}", v));
    write!(f, "[{}]", values.join(", "))
  }
}

/// 单个信箱的测量值
#[derive(Debug, Clone)]
pub struct BoxMeasurement {
  pub histogram: Histogram,
  /// 与基准直方图的相关性
  pub correlation: f64,
}

/// 分类器对一帧的完整输出
#[derive(Debug, Clone)]
pub struct FrameReport {
  pub index: u64,
  pub row: ClassificationRow,
  /// 与上一帧整帧直方图的相关性，基准帧为 `None`
  pub motion_correlation: Option<f64>,
  /// 各信箱的测量值，遮挡帧不做逐箱比较，为 `None`
  pub boxes: Option<[BoxMeasurement; POSTBOX_COUNT]>,
}

#[derive(Error, Debug)]
pub enum ResultsError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按帧序累积的分类结果，下标即帧号
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunResults {
  rows: Vec<ClassificationRow>,
}

impl RunResults {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, row: ClassificationRow) {
    self.rows.push(row);
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn rows(&self) -> &[ClassificationRow] {
    &self.rows
  }

  pub fn iter(&self) -> impl Iterator<Item = &ClassificationRow> {
    self.rows.iter()
  }

  pub fn obscured_frames(&self) -> usize {
    self.rows.iter().filter(|r| r.is_obscured()).count()
  }

  pub fn present_count(&self) -> usize {
    self.rows.iter().map(|r| r.present_boxes().len()).sum()
  }

  pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ResultsError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(self)?)?;
    Ok(())
  }

  pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ResultsError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
  }
}

impl From<Vec<ClassificationRow>> for RunResults {
  fn from(rows: Vec<ClassificationRow>) -> Self {
    Self { rows }
  }
}

impl FromIterator<ClassificationRow> for RunResults {
  fn from_iter<T: IntoIterator<Item = ClassificationRow>>(iter: T) -> Self {
    Self {
      rows: iter.into_iter().collect(),
    }
  }
}

mod classifier;
pub use self::classifier::{ClassifierError, PostboxClassifier};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_state_values() {
    assert_eq!(BoxState::Obscured.as_i8(), -1);
    assert_eq!(BoxState::Empty.as_i8(), 0);
    assert_eq!(BoxState::PostPresent.as_i8(), 1);
    assert_eq!(BoxState::try_from(2), Err(RowError::InvalidState(2)));
  }

  #[test]
  fn test_obscured_row_covers_every_box() {
    let row = ClassificationRow::obscured();
    assert!(row.is_obscured());
    assert_eq!(row.as_i8s(), [-1; POSTBOX_COUNT]);
    assert!(row.present_boxes().is_empty());
  }

  #[test]
  fn test_partial_obscuration_is_rejected() {
    let states = [
      BoxState::Obscured,
      BoxState::Empty,
      BoxState::Empty,
      BoxState::PostPresent,
      BoxState::Empty,
      BoxState::Empty,
    ];
    assert_eq!(
      ClassificationRow::try_from(states),
      Err(RowError::PartialObscuration)
    );
    assert!(serde_json::from_str::<ClassificationRow>("[-1, 0, 0, 0, 0, 0]").is_err());
  }

  #[test]
  fn test_results_json_layout() {
    let results: RunResults = vec![
      ClassificationRow::empty(),
      ClassificationRow::from_presence([false, true, false, false, false, true]),
      ClassificationRow::obscured(),
    ]
    .into();

    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json["rows"][1], serde_json::json!([0, 1, 0, 0, 0, 1]));
    assert_eq!(json["rows"][2], serde_json::json!([-1, -1, -1, -1, -1, -1]));

    let back: RunResults = serde_json::from_value(json).unwrap();
    assert_eq!(back, results);
    assert_eq!(back.obscured_frames(), 1);
    assert_eq!(back.present_count(), 2);
  }

  #[test]
  fn test_row_display() {
    let row = ClassificationRow::from_presence([true, false, false, false, false, false]);
    assert_eq!(row.to_string(), "[ 1,  0,  0,  0,  0,  0]");
  }
}
