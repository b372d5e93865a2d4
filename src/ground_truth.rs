// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/ground_truth.rs - 人工标注文件解析
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

//! # 标注文件格式
//!
//! 按帧序每行一帧，空行与 `#` 开头的注释行会被忽略：
//!
//! ```text
//! # frame 0
//! empty
//! present 1 2 3
//! obscured
//! ```
//!
//! - `empty`：所有信箱为空；
//! - `obscured`（或 `view`）：画面被遮挡，六个信箱均为未知；
//! - `present <n>...`：列出有信件的信箱编号，从 1 开始。

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::{
  POSTBOX_COUNT,
  model::{ClassificationRow, RunResults},
};

#[derive(Error, Debug)]
pub enum GroundTruthError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("第 {line} 行: 未知标记 '{tag}'")]
  UnknownTag { line: usize, tag: String },
  #[error("第 {line} 行: 无效的信箱编号 '{value}'，应在 1..={max} 之间", max = POSTBOX_COUNT)]
  InvalidBox { line: usize, value: String },
  #[error("第 {line} 行: 'present' 后缺少信箱编号")]
  MissingBoxes { line: usize },
  #[error("第 {line} 行: '{tag}' 后不应有其他内容")]
  TrailingTokens { line: usize, tag: String },
}

fn parse_line(number: usize, line: &str) -> Result<ClassificationRow, GroundTruthError> {
  let mut tokens = line.split_whitespace();
  let tag = tokens.next().unwrap_or_default().to_ascii_lowercase();

  match tag.as_str() {
    "empty" | "obscured" | "view" => {
      if tokens.next().is_some() {
        return Err(GroundTruthError::TrailingTokens { line: number, tag });
      }
      Ok(if tag == "empty" {
        ClassificationRow::empty()
      } else {
        ClassificationRow::obscured()
      })
    }
    "present" => {
      let mut presence = [false; POSTBOX_COUNT];
      let mut any = false;
      for token in tokens {
        let index = token
          .parse::<usize>()
          .ok()
          .filter(|n| (1..=POSTBOX_COUNT).contains(n))
          .ok_or_else(|| GroundTruthError::InvalidBox {
            line: number,
            value: token.to_string(),
          })?;
        presence[index - 1] = true;
        any = true;
      }
      if !any {
        return Err(GroundTruthError::MissingBoxes { line: number });
      }
      Ok(ClassificationRow::from_presence(presence))
    }
    _ => Err(GroundTruthError::UnknownTag { line: number, tag }),
  }
}

pub fn parse(text: &str) -> Result<RunResults, GroundTruthError> {
  let mut rows = Vec::new();
  for (i, line) in text.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    rows.push(parse_line(i + 1, line)?);
  }
  Ok(RunResults::from(rows))
}

pub fn load(path: impl AsRef<Path>) -> Result<RunResults, GroundTruthError> {
  let path = path.as_ref();
  let text = std::fs::read_to_string(path)?;
  let truth = parse(&text)?;
  info!("读取标注文件 {}: {} 帧", path.display(), truth.len());
  Ok(truth)
}
