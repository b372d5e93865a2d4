// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 视频输入模块
//!
//! 通过 GStreamer 解码视频文件，逐帧输出 RGB 图像。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## Cargo 特性
//!
//! 需要启用 `gstreamer_input` 特性。
//!
//! ## 基本用法
//!
//! ```no_run
//! use postwatch::{FromUrl, input::GStreamerInput};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("gst://file/data/PostboxesWithLines1.avi")?;
//! let input = GStreamerInput::from_url(&url)?;
//!
//! for frame in input {
//!     println!("帧 {}: {}x{}", frame.index(), frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! 支持的查询参数：
//!
//! - `rotate`: 0 / 90 / 180 / 270，解码后旋转画面
//!
//! appsink 不丢帧，离线分析时每一帧都会被处理。

use std::{collections::HashMap, path::PathBuf};

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://file/..."）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// 视频文件不存在
  #[error("Video source not found: {0}")]
  SourceNotFound(PathBuf),
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

enum PipelineItem {
  FileSource(String),
  VideoFlip { method: u32 },
  TargetFormat { format: &'static str },
}

impl PipelineItem {
  fn to_pipeline(&self) -> String {
    match self {
      PipelineItem::FileSource(path) => {
        format!("filesrc location=\"{}\" ! decodebin", path)
      }
      PipelineItem::VideoFlip { method } => format!("videoflip method={}", method),
      PipelineItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }

  fn video_flip(rotate: Option<&str>) -> Option<PipelineItem> {
    let method = match rotate? {
      "90" => 1,
      "180" => 2,
      "270" => 3,
      _ => return None,
    };
    Some(PipelineItem::VideoFlip { method })
  }
}

/// GStreamer 视频输入
///
/// 管理 GStreamer 管道和 appsink，按解码顺序输出帧，流结束时迭代结束。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  next_index: u64,
}

impl FromUrlWithScheme for GStreamerInput {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInput {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("file") {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    let path = PathBuf::from(url.path());
    if !path.is_file() {
      error!("Video source not found: {}", path.display());
      return Err(GStreamerInputError::SourceNotFound(path));
    }

    let mut items = vec![PipelineItem::FileSource(path.display().to_string())];
    if let Some(flip) = PipelineItem::video_flip(query.get("rotate").map(String::as_str)) {
      items.push(flip);
    }
    items.push(PipelineItem::TargetFormat { format: "RGB" });

    Self::launch(&items)
  }
}

impl GStreamerInput {
  fn launch(items: &[PipelineItem]) -> Result<Self, GStreamerInputError> {
    gst::init()?;

    let basic_pipeline = items
      .iter()
      .map(PipelineItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    let full_pipeline = format!(
      "{} ! appsink name=sink sync=false max-buffers=4 drop=false",
      basic_pipeline
    );

    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerInput {
      pipeline,
      appsink,
      next_index: 0,
    })
  }

  fn pull_sample(&self) -> Option<gst::Sample> {
    match self.appsink.pull_sample() {
      Ok(sample) => Some(sample),
      Err(e) => {
        if self.appsink.is_eos() {
          info!("GStreamer input reached end of stream");
        } else {
          error!("Failed to pull sample: {}", e);
        }
        None
      }
    }
  }
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.pull_sample()?;
    match convert_sample(sample) {
      Ok(image) => {
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Some(frame)
      }
      Err(e) => {
        error!("Failed to fetch sample: {}", e);
        None
      }
    }
  }
}

fn convert_sample(sample: gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  // 每行末尾可能有对齐填充
  let expected_size = stride * (height.saturating_sub(1)) + width * 3;
  if data.len() < expected_size {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  let swap = match video_info.format() {
    gst_video::VideoFormat::Rgb => false,
    gst_video::VideoFormat::Bgr => true,
    _ => return Err(GStreamerInputError::UnsupportedFormat),
  };

  let mut image = RgbImage::new(width as u32, height as u32);
  for (y, row) in image.rows_mut().enumerate() {
    let src = &data[y * stride..y * stride + width * 3];
    for (pixel, rgb) in row.zip(src.chunks_exact(3)) {
      pixel.0 = if swap {
        [rgb[2], rgb[1], rgb[0]]
      } else {
        [rgb[0], rgb[1], rgb[2]]
      };
    }
  }

  Ok(image)
}
