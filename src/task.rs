// 该文件是 Qingfeng （清风） 项目的一部分。
// src/task.rs - 推理任务驱动
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
  sync::mpsc::{Receiver, channel},
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

const WARMUP_FRAMES: usize = 2;

/// 一次任务运行的统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSummary {
  pub frames: usize,
  pub skipped: usize,
  pub detections: usize,
  pub average_latency: Option<Duration>,
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = crate::model::DetectResult, Error = ME>,
  O: Render<F, crate::model::DetectResult, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，检测到 {} 个物体，耗时: {:.2?}", result.len(), elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(TaskSummary {
      frames: 1,
      skipped: 0,
      detections: result.len(),
      average_latency: Some(elapsed),
    })
  }
}

/// 对同一帧重复推理，用于测量延迟
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times.max(1);
    self
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = crate::model::DetectResult, Error = ME>,
  O: Render<F, crate::model::DetectResult, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat_times);
    let mut detections = 0;
    for i in 0..self.repeat_times {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
      detections = result.len();
    }

    // 跳过预热帧
    let measured = if times.len() > WARMUP_FRAMES {
      &times[WARMUP_FRAMES..]
    } else {
      &times[..]
    };
    let average = measured.iter().sum::<Duration>() / measured.len() as u32;
    warn!("平均推理时间: {:.2?}", average);

    Ok(TaskSummary {
      frames: self.repeat_times,
      skipped: 0,
      detections,
      average_latency: Some(average),
    })
  }
}

/// 逐帧处理视频流
///
/// 某一帧检测失败时记录警告并跳过，继续处理后续帧。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理，收到信号后在当前帧结束时退出
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }

  fn install_interrupt(&self) -> Result<Option<Receiver<()>>, ctrlc::Error> {
    if !self.handle_interrupt {
      return Ok(None);
    }
    let (tx, rx) = channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(Some(rx))
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = crate::model::DetectResult, Error = ME>,
  O: Render<F, crate::model::DetectResult, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let interrupt = self.install_interrupt()?;

    let mut summary = TaskSummary::default();
    let mut total = Duration::ZERO;
    for frame in input {
      let index = summary.frames + summary.skipped + 1;
      info!("处理第 {} 帧图像", index);

      let now = Instant::now();
      match model.infer(&frame) {
        Ok(result) => {
          let latency = now.elapsed();
          output.render_result(&frame, &result)?;
          let fps = 1.0 / latency.as_secs_f64().max(f64::EPSILON);
          info!(
            "推理完成，检测到 {} 个物体，延迟 = {:.2?}，FPS = {:.1}，渲染后 {:.2?}",
            result.len(),
            latency,
            fps,
            now.elapsed()
          );
          summary.frames += 1;
          summary.detections += result.len();
          total += latency;
        }
        Err(e) => {
          warn!("第 {} 帧检测失败，跳过: {}", index, e);
          summary.skipped += 1;
        }
      }

      if self.frame_number.map(|n| index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", index);
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    if summary.frames > 0 {
      summary.average_latency = Some(total / summary.frames as u32);
    }
    info!("任务完成，退出");
    Ok(summary)
  }
}
