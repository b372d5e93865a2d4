// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 标注视频输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 标注视频输出模块
//!
//! 把标注后的帧显示在窗口中，或编码保存为视频文件。
//!
//! ## URL Scheme
//!
//! - `gst://display`: 本地窗口显示
//! - `gst:///out/annotated.mp4?fps=25`: 保存为文件，按扩展名选择编码器
//!
//! ## 支持的格式
//!
//! - **MP4** / **MKV** / **AVI** (H.264)
//! - **WebM** (VP8)
//!
//! ## 参数说明
//!
//! - `fps`: 帧率（帧/秒），默认 30
//! - `outline`: 额外画出信箱区域轮廓
//!
//! 画面尺寸取自第一帧，之后所有帧必须同尺寸。

use std::{
  collections::HashMap,
  sync::{Mutex, OnceLock},
};

use crate::{
  FromUrl, FromUrlWithScheme,
  config::PostboxLayout,
  frame::Frame,
  model::FrameReport,
  output::{Render, draw::Annotator},
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

/// GStreamer 视频输出错误类型
#[derive(Error, Debug)]
pub enum GStreamerVideoOutputError {
  /// URI scheme 不匹配
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsrc 元素
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  /// 无法转换元素为 appsrc
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 帧尺寸与第一帧不一致
  #[error("Frame size changed from {expected:?} to {actual:?}")]
  FrameSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  /// 缓冲区创建错误
  #[error("Buffer creation error")]
  BufferCreationError,
}

const DISPLAY_HOST: &str = "display";

fn encoder_pipeline(file_path: &str) -> String {
  let encoder = if file_path.ends_with(".mkv") {
    "videoconvert ! video/x-raw,format=I420 ! x264enc speed-preset=fast ! h264parse ! matroskamux"
  } else if file_path.ends_with(".avi") {
    "videoconvert ! video/x-raw,format=I420 ! x264enc ! avimux"
  } else if file_path.ends_with(".webm") {
    "videoconvert ! vp8enc ! webmmux"
  } else {
    // 默认 MP4
    "videoconvert ! video/x-raw,format=I420 ! x264enc speed-preset=fast tune=zerolatency ! h264parse ! mp4mux"
  };
  format!(
    "appsrc name=src ! {} ! filesink location=\"{}\"",
    encoder, file_path
  )
}

/// GStreamer 标注视频输出
pub struct GStreamerVideoOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  fps: i32,
  dimensions: OnceLock<(u32, u32)>,
  frame_count: Mutex<u64>,
  annotator: Annotator,
}

impl FromUrlWithScheme for GStreamerVideoOutput {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerVideoOutput {
  type Error = GStreamerVideoOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GStreamerVideoOutputError::SchemeMismatch);
    }

    gst::init()?;

    let query_pairs: HashMap<_, _> = url.query_pairs().collect();
    let fps: i32 = query_pairs
      .get("fps")
      .and_then(|v| v.parse().ok())
      .filter(|fps| *fps > 0)
      .unwrap_or(30);
    let outline = query_pairs.contains_key("outline");

    let pipeline_desc = if url.host_str() == Some(DISPLAY_HOST) {
      "appsrc name=src ! videoconvert ! autovideosink".to_string()
    } else {
      encoder_pipeline(url.path())
    };

    info!("Creating video output pipeline: {}", pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| {
        GStreamerVideoOutputError::PipelineError("Failed to create pipeline".to_string())
      })?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoOutputError::AppSrcConversionFailed)?;
    appsrc.set_format(gst::Format::Time);

    Ok(GStreamerVideoOutput {
      pipeline,
      appsrc,
      fps,
      dimensions: OnceLock::new(),
      frame_count: Mutex::new(0),
      annotator: Annotator::default().with_outline(outline),
    })
  }
}

impl Drop for GStreamerVideoOutput {
  fn drop(&mut self) {
    if self.dimensions.get().is_some() {
      // 发送 EOS 以便封装器写完文件尾
      let _ = self.appsrc.end_of_stream();
      if let Some(bus) = self.pipeline.bus() {
        let _ = bus.timed_pop_filtered(
          gst::ClockTime::from_seconds(5),
          &[gst::MessageType::Eos, gst::MessageType::Error],
        );
      }
    }

    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer video output pipeline: {}", e);
    }

    let frame_count = self.frame_count.lock().map(|c| *c).unwrap_or_default();
    info!("Video output closed. Total frames written: {}", frame_count);
  }
}

impl GStreamerVideoOutput {
  pub fn with_layout(mut self, layout: PostboxLayout) -> Self {
    self.annotator = self.annotator.with_layout(layout);
    self
  }

  /// 第一帧到来时设置 caps 并启动管道
  fn ensure_started(&self, dimensions: (u32, u32)) -> Result<(), GStreamerVideoOutputError> {
    if let Some(expected) = self.dimensions.get() {
      if *expected != dimensions {
        return Err(GStreamerVideoOutputError::FrameSizeMismatch {
          expected: *expected,
          actual: dimensions,
        });
      }
      return Ok(());
    }

    let (width, height) = dimensions;
    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field("framerate", gst::Fraction::new(self.fps, 1))
      .build();
    self.appsrc.set_caps(Some(&caps));
    self.pipeline.set_state(gst::State::Playing)?;
    let _ = self.dimensions.set(dimensions);

    info!(
      "Video output initialized: {}x{} @ {} fps",
      width, height, self.fps
    );
    Ok(())
  }

  fn push_frame(&self, data: &[u8]) -> Result<(), GStreamerVideoOutputError> {
    let mut buffer = gst::Buffer::with_size(data.len())
      .map_err(|_| GStreamerVideoOutputError::BufferCreationError)?;

    let mut frame_count = self
      .frame_count
      .lock()
      .map_err(|_| GStreamerVideoOutputError::PipelineError("Frame counter poisoned".to_string()))?;
    let duration = 1_000_000_000 / self.fps as u64;
    let timestamp = *frame_count * duration;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerVideoOutputError::BufferCreationError)?;
      {
        let mut buffer_map = buffer_ref.map_writable().map_err(|_| {
          GStreamerVideoOutputError::PipelineError("Failed to map buffer".to_string())
        })?;
        buffer_map.copy_from_slice(data);
      }
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(timestamp));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(duration));
    }

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerVideoOutputError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;
    *frame_count += 1;

    Ok(())
  }
}

impl Render<Frame, FrameReport> for GStreamerVideoOutput {
  type Error = GStreamerVideoOutputError;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    self.ensure_started(frame.dimensions())?;
    let image = self.annotator.annotate(frame, result);
    self.push_frame(&padded_rows(image.as_raw(), frame.width()))
  }
}

/// GStreamer 的 RGB 行跨度按 4 字节对齐
fn padded_rows(data: &[u8], width: u32) -> std::borrow::Cow<'_, [u8]> {
  let row = width as usize * 3;
  let stride = (row + 3) & !3;
  if row == stride || row == 0 {
    return std::borrow::Cow::Borrowed(data);
  }
  let mut padded = Vec::with_capacity(data.len() / row * stride);
  for chunk in data.chunks_exact(row) {
    padded.extend_from_slice(chunk);
    padded.resize(padded.len() + stride - row, 0);
  }
  std::borrow::Cow::Owned(padded)
}
