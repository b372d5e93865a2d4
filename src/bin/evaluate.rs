// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/bin/evaluate.rs - 离线评估分类结果
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use postwatch::{evaluate::evaluate, ground_truth, model::RunResults};

/// 用标注文件评估一次运行保存的分类结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类结果（postwatch --results 保存的 JSON）
  #[arg(long, value_name = "FILE")]
  pub results: PathBuf,
  /// 标注文件
  #[arg(long, value_name = "FILE")]
  pub ground_truth: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("分类结果: {}", args.results.display());
  info!("标注文件: {}", args.ground_truth.display());

  let results = RunResults::load_json(&args.results)
    .with_context(|| format!("无法读取分类结果 {}", args.results.display()))?;
  let truth = ground_truth::load(&args.ground_truth)
    .with_context(|| format!("无法读取标注文件 {}", args.ground_truth.display()))?;

  let evaluation = evaluate(&results, &truth).context("无法比较分类结果与标注")?;
  print!("{}", evaluation);

  Ok(())
}
