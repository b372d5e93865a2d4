// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use postwatch::{
  FromUrl,
  config::DetectorConfig,
  evaluate::evaluate,
  ground_truth,
  input::InputWrapper,
  model::PostboxClassifier,
  output::OutputWrapper,
  task::{PostboxRun, Task},
};

fn load_config(args: &args::Args) -> Result<DetectorConfig> {
  let mut config = match &args.config {
    Some(path) => DetectorConfig::from_json_file(path)
      .with_context(|| format!("无法读取检测配置 {}", path.display()))?,
    None => DetectorConfig::default(),
  };
  if let Some(bins) = args.bins {
    config = config.with_hbins(bins);
  }
  if let Some(threshold) = args.motion_threshold {
    config = config.with_motion_threshold(threshold);
  }
  if let Some(threshold) = args.presence_threshold {
    config = config.with_presence_threshold(threshold);
  }
  config.validate().context("检测配置无效")?;
  Ok(config)
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();
  let config = load_config(&args)?;

  info!("输入来源: {}", args.input);
  for output in &args.output {
    info!("输出路径: {}", output);
  }
  info!(
    "分箱数: {}, 遮挡阈值: {}, 信件阈值: {}",
    config.hbins, config.motion_threshold, config.presence_threshold
  );

  let input = InputWrapper::from_url(&args.input)
    .with_context(|| format!("无法打开输入 {}", args.input))?;
  let outputs = args
    .output
    .iter()
    .map(|url| {
      OutputWrapper::from_url(url)
        .map(|output| output.with_layout(&config.layout))
        .with_context(|| format!("无法创建输出 {}", url))
    })
    .collect::<Result<Vec<_>>>()?;
  let model = PostboxClassifier::new(config);

  let results = PostboxRun::default()
    .with_max_frames(args.max_frames)
    .with_delay(Duration::from_millis(args.delay_ms))
    .with_interrupt(true)
    .run_task(input, model, outputs)?;

  for (index, row) in results.iter().enumerate() {
    info!("帧 {:>5}: {}", index, row);
  }

  if let Some(path) = &args.results {
    results
      .save_json(path)
      .with_context(|| format!("无法保存分类结果 {}", path.display()))?;
    info!("分类结果已保存: {}", path.display());
  }

  if let Some(path) = &args.ground_truth {
    let truth = ground_truth::load(path)
      .with_context(|| format!("无法读取标注文件 {}", path.display()))?;
    match evaluate(&results, &truth) {
      Ok(evaluation) => println!("{}", evaluation),
      Err(e) => warn!("无法计算准确率: {}", e),
    }
  }

  Ok(())
}
