// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/output/save_image_file.rs - 保存标注后的帧图像
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

use std::{
  collections::BTreeSet,
  path::PathBuf,
  sync::atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::PostboxLayout,
  frame::Frame,
  mask::layout_mask,
  model::FrameReport,
  output::{Render, draw::Annotator, frame_selection},
};

/// 把标注后的帧保存为 `<目录>/frame-00012.png`
///
/// URL 形如 `image:///out/frames?frames=8,12&outline`：
///
/// - `frames`: 只保存这些帧号，缺省保存全部
/// - `outline`: 额外画出信箱区域轮廓
/// - `masks`: 收到第一帧时把六个信箱掩码的并集存为 `<目录>/masks.png`，不受 `frames` 限制
pub struct SaveImageFileOutput {
  directory: PathBuf,
  frames: Option<BTreeSet<u64>>,
  annotator: Annotator,
  masks: bool,
  masks_written: AtomicBool,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的查询参数: {0}")]
  InvalidQuery(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let frames = frame_selection(uri).map_err(SaveImageFileError::InvalidQuery)?;
    let outline = uri.query_pairs().any(|(k, _)| k == "outline");
    let masks = uri.query_pairs().any(|(k, _)| k == "masks");

    Ok(SaveImageFileOutput {
      directory: PathBuf::from(uri.path()),
      frames,
      annotator: Annotator::default().with_outline(outline),
      masks,
      masks_written: AtomicBool::new(false),
    })
  }
}

impl SaveImageFileOutput {
  pub fn with_layout(mut self, layout: PostboxLayout) -> Self {
    self.annotator = self.annotator.with_layout(layout);
    self
  }

  pub fn frame_path(&self, index: u64) -> PathBuf {
    self.directory.join(format!("frame-{:05}.png", index))
  }

  pub fn masks_path(&self) -> PathBuf {
    self.directory.join("masks.png")
  }

  fn save_masks(&self, frame: &Frame) -> Result<(), SaveImageFileError> {
    if !self.masks || self.masks_written.swap(true, Ordering::SeqCst) {
      return Ok(());
    }

    std::fs::create_dir_all(&self.directory)?;
    let path = self.masks_path();
    layout_mask(frame.width(), frame.height(), self.annotator.layout()).save(&path)?;
    info!("保存信箱掩码到文件: {}", path.display());

    Ok(())
  }

  fn wants(&self, index: u64) -> bool {
    self
      .frames
      .as_ref()
      .map(|frames| frames.contains(&index))
      .unwrap_or(true)
  }
}

impl Render<Frame, FrameReport> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    self.save_masks(frame)?;

    if !self.wants(frame.index()) {
      debug!("跳过第 {} 帧图像", frame.index());
      return Ok(());
    }

    std::fs::create_dir_all(&self.directory)?;
    let path = self.frame_path(frame.index());
    self.annotator.annotate(frame, result).save(&path)?;

    info!("保存图像到文件: {}", path.display());

    Ok(())
  }
}
