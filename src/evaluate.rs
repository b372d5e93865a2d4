// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/evaluate.rs - 与人工标注对比的评估指标
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

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::{BoxState, RunResults};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EvaluationError {
  #[error("帧数不一致: 检测结果 {results} 帧, 标注 {truth} 帧")]
  LengthMismatch { results: usize, truth: usize },
  #[error("{metric} 无定义: 分母为零")]
  UndefinedMetric { metric: &'static str },
}

/// 某一类别的计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Confusion {
  /// 预测与标注同为正例
  pub agree: usize,
  /// 预测为正例
  pub predicted: usize,
  /// 标注为正例
  pub actual: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
  pub precision: f64,
  pub recall: f64,
  pub f1: f64,
}

impl Confusion {
  pub fn observe(&mut self, predicted: bool, actual: bool) {
    self.predicted += predicted as usize;
    self.actual += actual as usize;
    self.agree += (predicted && actual) as usize;
  }

  pub fn precision(&self) -> Result<f64, EvaluationError> {
    if self.predicted == 0 {
      return Err(EvaluationError::UndefinedMetric {
        metric: "precision",
      });
    }
    Ok(self.agree as f64 / self.predicted as f64)
  }

  pub fn recall(&self) -> Result<f64, EvaluationError> {
    if self.actual == 0 {
      return Err(EvaluationError::UndefinedMetric { metric: "recall" });
    }
    Ok(self.agree as f64 / self.actual as f64)
  }

  /// 精确率、召回率与 F1；任一分母为零时返回 `UndefinedMetric`
  pub fn metrics(&self) -> Result<Metrics, EvaluationError> {
    let precision = self.precision()?;
    let recall = self.recall()?;
    if precision + recall == 0.0 {
      return Err(EvaluationError::UndefinedMetric { metric: "f1" });
    }
    Ok(Metrics {
      precision,
      recall,
      f1: 2.0 * (precision * recall) / (precision + recall),
    })
  }
}

/// 有信件（所有信箱、所有帧合并统计）与遮挡（只看第一个信箱位置）两类的计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Evaluation {
  pub present: Confusion,
  pub obscured: Confusion,
}

pub fn evaluate(results: &RunResults, truth: &RunResults) -> Result<Evaluation, EvaluationError> {
  if results.len() != truth.len() {
    return Err(EvaluationError::LengthMismatch {
      results: results.len(),
      truth: truth.len(),
    });
  }

  let mut evaluation = Evaluation::default();
  for (predicted, actual) in results.iter().zip(truth.iter()) {
    evaluation
      .obscured
      .observe(predicted.is_obscured(), actual.is_obscured());
    for (p, a) in predicted.states().iter().zip(actual.states().iter()) {
      evaluation.present.observe(
        *p == BoxState::PostPresent,
        *a == BoxState::PostPresent,
      );
    }
  }
  Ok(evaluation)
}

impl fmt::Display for Evaluation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (name, confusion) in [("present", &self.present), ("obscured", &self.obscured)] {
      write!(
        f,
        "{:<9} agree={} predicted={} actual={}",
        name, confusion.agree, confusion.predicted, confusion.actual
      )?;
      match confusion.metrics() {
        Ok(m) => writeln!(
          f,
          " precision={:.4} recall={:.4} f1={:.4}",
          m.precision, m.recall, m.f1
        )?,
        Err(e) => writeln!(f, " ({})", e)?,
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ClassificationRow;

  #[test]
  fn test_known_overlap() {
    let confusion = Confusion {
      agree: 6,
      predicted: 10,
      actual: 8,
    };
    let metrics = confusion.metrics().unwrap();
    assert_eq!(metrics.precision, 0.6);
    assert_eq!(metrics.recall, 0.75);
    assert_eq!(metrics.f1, 2.0 * (0.6 * 0.75) / (0.6 + 0.75));
  }

  #[test]
  fn test_overlap_through_evaluate() {
    let t = true;
    let f = false;
    let results: RunResults = vec![
      ClassificationRow::from_presence([t; 6]),
      ClassificationRow::from_presence([t, t, t, t, f, f]),
    ]
    .into();
    let truth: RunResults = vec![
      ClassificationRow::from_presence([t; 6]),
      ClassificationRow::from_presence([f, f, f, f, t, t]),
    ]
    .into();

    let evaluation = evaluate(&results, &truth).unwrap();
    assert_eq!(
      evaluation.present,
      Confusion {
        agree: 6,
        predicted: 10,
        actual: 8
      }
    );
    let metrics = evaluation.present.metrics().unwrap();
    assert_eq!(metrics.precision, 0.6);
    assert_eq!(metrics.recall, 0.75);
    assert_eq!(metrics.f1, 2.0 * (0.6 * 0.75) / (0.6 + 0.75));
  }

  #[test]
  fn test_zero_denominators_are_explicit() {
    let nothing_predicted = Confusion {
      agree: 0,
      predicted: 0,
      actual: 3,
    };
    assert_eq!(
      nothing_predicted.metrics(),
      Err(EvaluationError::UndefinedMetric {
        metric: "precision"
      })
    );

    let nothing_actual = Confusion {
      agree: 0,
      predicted: 2,
      actual: 0,
    };
    assert_eq!(
      nothing_actual.recall(),
      Err(EvaluationError::UndefinedMetric { metric: "recall" })
    );

    let no_overlap = Confusion {
      agree: 0,
      predicted: 2,
      actual: 2,
    };
    assert_eq!(
      no_overlap.metrics(),
      Err(EvaluationError::UndefinedMetric { metric: "f1" })
    );
  }

  #[test]
  fn test_obscured_counts_frames_not_boxes() {
    let results: RunResults = vec![ClassificationRow::obscured(), ClassificationRow::empty()].into();
    let truth: RunResults = vec![ClassificationRow::obscured(), ClassificationRow::obscured()].into();

    let evaluation = evaluate(&results, &truth).unwrap();
    assert_eq!(
      evaluation.obscured,
      Confusion {
        agree: 1,
        predicted: 1,
        actual: 2
      }
    );
    assert_eq!(evaluation.present, Confusion::default());
  }

  #[test]
  fn test_length_mismatch() {
    let results: RunResults = vec![ClassificationRow::empty()].into();
    let truth = RunResults::new();
    assert_eq!(
      evaluate(&results, &truth),
      Err(EvaluationError::LengthMismatch {
        results: 1,
        truth: 0
      })
    );
  }
}
