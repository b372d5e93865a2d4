// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Postwatch 信箱检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  /// 支持格式:
  /// - 图像或图像序列目录: image:///data/frames
  /// - 视频文件: gst://file/data/PostboxesWithLines1.avi
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// JSON 检测配置（信箱布局、分箱数、阈值）
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 直方图分箱数，覆盖配置文件
  #[arg(long, value_name = "BINS")]
  pub bins: Option<usize>,

  /// 整帧遮挡阈值，覆盖配置文件
  #[arg(long, value_name = "THRESHOLD")]
  pub motion_threshold: Option<f64>,

  /// 信件阈值，覆盖配置文件
  #[arg(long, value_name = "THRESHOLD")]
  pub presence_threshold: Option<f64>,

  /// 输出路径，可重复
  /// 支持格式:
  /// - 标注图像: image:///out/frames?frames=8,12&outline
  /// - 直方图: hist:///out/hist?frames=8,12
  /// - 视频: gst://display 或 gst:///out/annotated.mp4?fps=25
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,

  /// 分类结果保存路径（JSON）
  #[arg(long, value_name = "FILE")]
  pub results: Option<PathBuf>,

  /// 标注文件，给出时运行结束后计算准确率
  #[arg(long, value_name = "FILE")]
  pub ground_truth: Option<PathBuf>,

  /// 两帧之间的等待时间（毫秒），0 表示不等待
  #[arg(long, default_value = "35", value_name = "MILLIS")]
  pub delay_ms: u64,

  /// 最大处理帧数（含基准帧）
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<usize>,
}
