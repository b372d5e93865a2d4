// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;

use crate::{FromUrl, frame::Frame};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
  #[error("URI scheme '{scheme}' requires the '{feature}' feature")]
  FeatureDisabled {
    scheme: String,
    feature: &'static str,
  },
}

/// 已知但未在本次构建中启用的输入 scheme
fn disabled_feature(scheme: &str) -> Option<&'static str> {
  match scheme {
    "gst" if !cfg!(feature = "gstreamer_input") => Some("gstreamer_input"),
    "image" if !cfg!(feature = "read_image_file") => Some("read_image_file"),
    _ => None,
  }
}

pub enum InputWrapper {
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerInput::SCHEME {
        let input = GStreamerInput::from_url(url)?;
        return Ok(InputWrapper::GStreamerInput(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    if let Some(feature) = disabled_feature(url.scheme()) {
      return Err(InputError::FeatureDisabled {
        scheme: url.scheme().to_string(),
        feature,
      });
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[allow(unreachable_patterns)]
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unknown_scheme() {
    let url = url::Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(s)) if s == "rtsp"
    ));
  }

  #[test]
  fn test_disabled_backend_is_named() {
    assert_eq!(
      disabled_feature("gst").is_some(),
      !cfg!(feature = "gstreamer_input")
    );
    assert_eq!(
      disabled_feature("image").is_some(),
      !cfg!(feature = "read_image_file")
    );
    assert_eq!(disabled_feature("rtsp"), None);
  }

  #[cfg(not(feature = "gstreamer_input"))]
  #[test]
  fn test_video_file_without_gstreamer() {
    let url = url::Url::parse("gst://file/data/PostboxesWithLines1.avi").unwrap();
    let err = InputWrapper::from_url(&url).err().unwrap();
    assert!(matches!(
      &err,
      InputError::FeatureDisabled { scheme, feature: "gstreamer_input" } if scheme == "gst"
    ));
    assert!(err.to_string().contains("gstreamer_input"));
  }
}
