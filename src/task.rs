// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/task.rs - 逐帧检测任务
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
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  frame::Frame,
  model::{FrameReport, Model, RunResults},
  output::Render,
};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("没有输入帧")]
  NoFrames,
  #[error("第 {index} 帧推理失败: {source}")]
  Model {
    index: u64,
    #[source]
    source: BoxedError,
  },
  #[error("第 {index} 帧输出失败: {source}")]
  Output {
    index: u64,
    #[source]
    source: BoxedError,
  },
}

/// 逐帧运行信箱检测
///
/// 第一帧作为基准，之后每一帧分类、记录、输出，直到输入结束、达到帧数上限或收到中断信号。
#[derive(Default, Debug)]
pub struct PostboxRun {
  max_frames: Option<usize>,
  delay: Duration,
  interruptible: bool,
}

impl PostboxRun {
  /// 最多处理的帧数（含基准帧）
  pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
    self.max_frames = max_frames;
    self
  }

  /// 两帧之间的固定等待，用于近实时回放
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// 安装 Ctrl-C 处理，收到信号后在当前帧结束时退出
  pub fn with_interrupt(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }

  fn interrupt_channel(&self) -> Option<Receiver<()>> {
    if !self.interruptible {
      return None;
    }

    let (tx, rx) = mpsc::channel();
    match ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
    }) {
      Ok(()) => Some(rx),
      Err(e) => {
        warn!("无法设置 Ctrl-C 处理: {}", e);
        None
      }
    }
  }

  fn reached_limit(&self, processed: usize) -> bool {
    self.max_frames.map(|n| processed >= n).unwrap_or(false)
  }
}

impl<I, M, O, ME, RE> Task<I, M, O> for PostboxRun
where
  I: Iterator<Item = Frame>,
  M: Model<Input = Frame, Output = FrameReport, Error = ME>,
  O: Render<Frame, FrameReport, Error = RE>,
  ME: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
{
  type Output = RunResults;
  type Error = TaskError;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<RunResults, TaskError> {
    info!("开始任务...");
    let interrupt = self.interrupt_channel();

    let mut results = RunResults::new();
    let mut frame = input.next().ok_or(TaskError::NoFrames)?;
    let started = Instant::now();

    loop {
      let index = frame.index();
      let now = Instant::now();
      let report = model.infer(&frame).map_err(|e| TaskError::Model {
        index,
        source: Box::new(e),
      })?;
      let elapsed_a = now.elapsed();
      output
        .render_result(&frame, &report)
        .map_err(|e| TaskError::Output {
          index,
          source: Box::new(e),
        })?;
      let elapsed_b = now.elapsed();

      debug!(
        "第 {} 帧: {} 耗时: {:.2?} / {:.2?}",
        index, report.row, elapsed_a, elapsed_b
      );
      results.push(report.row);

      if self.reached_limit(results.len()) {
        info!("达到指定帧数 {}, 退出任务循环", results.len());
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
      if !self.delay.is_zero() {
        thread::sleep(self.delay);
      }

      match input.next() {
        Some(next) => frame = next,
        None => break,
      }
    }

    info!(
      "任务完成: {} 帧, {} 帧遮挡, {} 次检测到信件, 耗时 {:.2?}",
      results.len(),
      results.obscured_frames(),
      results.present_count(),
      started.elapsed()
    );

    Ok(results)
  }
}
