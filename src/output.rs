// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::BTreeSet;

use crate::FromUrl;
#[cfg(any(
  feature = "save_image_file",
  feature = "histogram_dump",
  feature = "gstreamer_output"
))]
use crate::FromUrlWithScheme;
use crate::config::PostboxLayout;
use crate::frame::Frame;
use crate::model::FrameReport;
use thiserror::Error;
use url::Url;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

impl<F, O, R: Render<F, O>> Render<F, O> for Vec<R> {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &O) -> Result<(), Self::Error> {
    for output in self {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}

pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "histogram_dump")]
mod histogram_dump;
#[cfg(feature = "histogram_dump")]
pub use self::histogram_dump::{HistogramDumpError, HistogramDumpOutput};

#[cfg(feature = "gstreamer_output")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_video_output::{GStreamerVideoOutput, GStreamerVideoOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "histogram_dump")]
  #[error("直方图导出错误: {0}")]
  HistogramDumpError(#[from] HistogramDumpError),
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 视频输出错误: {0}")]
  GStreamerVideoOutputError(#[from] GStreamerVideoOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("URI 方案 '{scheme}' 需要启用 '{feature}' 特性")]
  FeatureDisabled {
    scheme: String,
    feature: &'static str,
  },
}

/// 已知但未在本次构建中启用的输出 scheme
fn disabled_feature(scheme: &str) -> Option<&'static str> {
  match scheme {
    "image" if !cfg!(feature = "save_image_file") => Some("save_image_file"),
    "hist" if !cfg!(feature = "histogram_dump") => Some("histogram_dump"),
    "gst" if !cfg!(feature = "gstreamer_output") => Some("gstreamer_output"),
    _ => None,
  }
}

/// 解析 `frames=8,12` 查询参数；未给出时返回 `None`，表示输出所有帧
pub(crate) fn frame_selection(url: &Url) -> Result<Option<BTreeSet<u64>>, String> {
  let Some((_, value)) = url.query_pairs().find(|(k, _)| k == "frames") else {
    return Ok(None);
  };
  value
    .split(',')
    .filter(|s| !s.trim().is_empty())
    .map(|s| {
      s.trim()
        .parse::<u64>()
        .map_err(|_| format!("无效的帧号 '{}'", s))
    })
    .collect::<Result<BTreeSet<u64>, String>>()
    .map(Some)
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "histogram_dump")]
  HistogramDumpOutput(HistogramDumpOutput),
  #[cfg(feature = "gstreamer_output")]
  GStreamerVideoOutput(GStreamerVideoOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "histogram_dump")]
      HistogramDumpOutput::SCHEME => {
        let output = HistogramDumpOutput::from_url(url)?;
        Ok(OutputWrapper::HistogramDumpOutput(output))
      }
      #[cfg(feature = "gstreamer_output")]
      GStreamerVideoOutput::SCHEME => {
        let output = GStreamerVideoOutput::from_url(url)?;
        Ok(OutputWrapper::GStreamerVideoOutput(output))
      }
      other => match disabled_feature(other) {
        Some(feature) => Err(OutputError::FeatureDisabled {
          scheme: other.to_string(),
          feature,
        }),
        None => Err(OutputError::SchemeMismatch(other.to_string())),
      },
    }
  }
}

impl OutputWrapper {
  /// 标注位置使用的信箱布局
  pub fn with_layout(self, layout: &PostboxLayout) -> Self {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_layout(layout.clone()))
      }
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideoOutput(output) => {
        OutputWrapper::GStreamerVideoOutput(output.with_layout(layout.clone()))
      }
      #[allow(unreachable_patterns)]
      other => other,
    }
  }
}

impl Render<Frame, FrameReport> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "histogram_dump")]
      OutputWrapper::HistogramDumpOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideoOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[allow(unreachable_patterns)]
      _ => Ok(()),
    }
  }
}
