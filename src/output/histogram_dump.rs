// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/output/histogram_dump.rs - 信箱直方图导出
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

use std::{collections::BTreeSet, path::PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::FrameReport,
  output::{Render, frame_selection},
};

/// 把指定帧各信箱的掩码直方图写成文本文件，供离线调阈值
///
/// URL 形如 `hist:///out/hist?frames=8,12`，每个信箱一个文件
/// `frame-00008-box-1.txt`，信箱编号从 1 开始，每行一个分箱计数。
pub struct HistogramDumpOutput {
  directory: PathBuf,
  frames: Option<BTreeSet<u64>>,
}

#[derive(Error, Debug)]
pub enum HistogramDumpError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的查询参数: {0}")]
  InvalidQuery(String),
}

impl FromUrlWithScheme for HistogramDumpOutput {
  const SCHEME: &'static str = "hist";
}

impl FromUrl for HistogramDumpOutput {
  type Error = HistogramDumpError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(HistogramDumpError::SchemeMismatch(format!(
        "期望导出方式 '{}', 实际导出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(HistogramDumpOutput {
      directory: PathBuf::from(uri.path()),
      frames: frame_selection(uri).map_err(HistogramDumpError::InvalidQuery)?,
    })
  }
}

impl HistogramDumpOutput {
  /// `slot` 从 0 开始，文件名中的编号从 1 开始
  pub fn box_path(&self, index: u64, slot: usize) -> PathBuf {
    self
      .directory
      .join(format!("frame-{:05}-box-{}.txt", index, slot + 1))
  }
}

impl Render<Frame, FrameReport> for HistogramDumpOutput {
  type Error = HistogramDumpError;

  fn render_result(&self, _frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    if let Some(frames) = &self.frames
      && !frames.contains(&result.index)
    {
      return Ok(());
    }

    let Some(boxes) = &result.boxes else {
      debug!("第 {} 帧没有逐箱直方图，跳过导出", result.index);
      return Ok(());
    };

    std::fs::create_dir_all(&self.directory)?;
    for (slot, measurement) in boxes.iter().enumerate() {
      std::fs::write(
        self.box_path(result.index, slot),
        measurement.histogram.to_text(),
      )?;
    }

    info!(
      "导出第 {} 帧直方图到目录: {}",
      result.index,
      self.directory.display()
    );

    Ok(())
  }
}
