// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/input/read_image_file.rs - 图像文件 / 图像序列输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Source not found: {0}")]
  SourceNotFound(PathBuf),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// 单张图像，或按文件名排序的一个目录下的所有图像（视为一段视频的逐帧导出）
pub struct ImageFileInput {
  paths: VecDeque<PathBuf>,
  next_index: u64,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(url.path())
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    if !path.exists() {
      error!("Image source not found: {}", path.display());
      return Err(ImageFileInputError::SourceNotFound(path.to_path_buf()));
    }

    let paths = if path.is_dir() {
      let mut paths = Vec::new();
      for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.is_file() && is_image(&entry_path) {
          paths.push(entry_path);
        }
      }
      paths.sort();
      info!(
        "Image sequence opened: {} ({} frames)",
        path.display(),
        paths.len()
      );
      paths
    } else {
      vec![path.to_path_buf()]
    };

    Ok(ImageFileInput {
      paths: paths.into(),
      next_index: 0,
    })
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.paths.pop_front()?;
    let image = ImageReader::open(&path)
      .map_err(image::ImageError::IoError)
      .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::IoError))
      .and_then(|reader| reader.decode());

    match image {
      Ok(image) => {
        let frame = Frame::new(self.next_index, image.into_rgb8());
        self.next_index += 1;
        Some(frame)
      }
      Err(e) => {
        // 损坏的帧视为流结束
        error!("Failed to decode {}: {}", path.display(), e);
        self.paths.clear();
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("postwatch-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn test_directory_is_read_in_name_order() {
    let dir = scratch_dir("image-sequence");
    for (name, value) in [("frame-002.png", 20u8), ("frame-000.png", 0), ("frame-001.png", 10)] {
      RgbImage::from_pixel(4, 3, Rgb([value, value, value]))
        .save(dir.join(name))
        .unwrap();
    }
    std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

    let url = Url::parse(&format!("image://{}", dir.display())).unwrap();
    let frames: Vec<Frame> = ImageFileInput::from_url(&url).unwrap().collect();

    assert_eq!(frames.len(), 3);
    for (i, frame) in frames.iter().enumerate() {
      assert_eq!(frame.index(), i as u64);
      assert_eq!(frame.image().get_pixel(0, 0)[0], i as u8 * 10);
    }

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn test_missing_source_is_an_error() {
    let missing = std::env::temp_dir().join("postwatch-does-not-exist/clip");
    assert!(matches!(
      ImageFileInput::open(&missing),
      Err(ImageFileInputError::SourceNotFound(_))
    ));
  }

  #[test]
  fn test_wrong_scheme() {
    let url = Url::parse("gst://file/tmp/clip.avi").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }

  #[test]
  fn test_corrupt_frame_ends_stream() {
    let dir = scratch_dir("corrupt-frame");
    RgbImage::from_pixel(2, 2, Rgb([1, 1, 1]))
      .save(dir.join("a.png"))
      .unwrap();
    std::fs::write(dir.join("b.png"), b"broken").unwrap();
    RgbImage::from_pixel(2, 2, Rgb([1, 1, 1]))
      .save(dir.join("c.png"))
      .unwrap();

    let input = ImageFileInput::open(&dir).unwrap();
    assert_eq!(input.remaining(), 3);
    assert_eq!(input.count(), 1);

    let _ = std::fs::remove_dir_all(&dir);
  }
}
