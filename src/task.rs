// 该文件是 Binggui （冰柜） 项目的一部分。
// src/task.rs - 检测任务
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

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::{detector::Detector, frame::ImageBuffer, model::ModelRuntime, output::Render};

pub trait Task<I, R, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: &Detector<R>, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一张照片
pub struct OneShotTask;

impl<IE, RE, I, R, O> Task<I, R, O> for OneShotTask
where
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageBuffer, IE>>,
  R: ModelRuntime,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: &Detector<R>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let image = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))??;
    info!("输入图像获取成功，开始检测...");
    let now = Instant::now();
    let result = detector.detect(&image)?;
    info!("检测完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&image, &result)?;

    Ok(())
  }
}

/// 对同一张照片重复检测，统计平均耗时
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

impl<IE, RE, I, R, O> Task<I, R, O> for RepeatShotTask
where
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageBuffer, IE>>,
  R: ModelRuntime,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: &Detector<R>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let image = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))??;
    info!("输入图像获取成功，开始检测...");
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let now = Instant::now();
      let result = detector.detect(&image)?;
      let elapsed = now.elapsed();
      info!("({})检测完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&image, &result)?;
      times.push(elapsed);
    }

    warn!("平均检测时间: {:.2?}", average_warm(&times));

    Ok(())
  }
}

/// 跳过前两次预热后的平均耗时
fn average_warm(times: &[Duration]) -> Duration {
  let warm = if times.len() > 2 { &times[2..] } else { times };
  if warm.is_empty() {
    return Duration::ZERO;
  }
  warm.iter().sum::<Duration>() / warm.len() as u32
}

/// 依次处理全部输入照片
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<IE, RE, I, R, O> Task<I, R, O> for ContinuousTask
where
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageBuffer, IE>>,
  R: ModelRuntime,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, detector: &Detector<R>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let mut frame_index = 0;
    for image in input {
      let image = image?;
      frame_index += 1;
      info!("处理第 {} 张图像", frame_index);
      let now = Instant::now();
      let result = detector.detect(&image)?;
      let elapsed_a = now.elapsed();
      output.render_result(&image, &result)?;
      let elapsed_b = now.elapsed();
      info!("检测完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定图像数 {}, 退出任务循环", frame_index);
        break;
      }
    }

    info!("任务完成，共处理 {} 张图像", frame_index);
    Ok(())
  }
}
