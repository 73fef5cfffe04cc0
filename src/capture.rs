// 该文件是 Shanbao （山豹） 项目的一部分。
// src/capture.rs - 前台捕获与展示循环
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use crate::input::InputSource;
use crate::output::FrameSink;
use crate::scale::scale_to_max_width;
use crate::worker::WorkerHandle;

/// 显示帧率的报告间隔
const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(2);
/// 等待推理线程退出的上界
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 捕获循环配置。
#[derive(Clone, Debug)]
pub struct CaptureConfig {
  /// 推理与展示的最大帧宽度，超出按比例缩小
  pub max_width: u32,
  /// 每 N 帧向推理线程转发一帧（1 = 每帧），吞吐与时延的调节旋钮
  pub skip_frames: u64,
  /// 最大处理帧数，0 表示无限制
  pub max_frames: u64,
  /// 输出帧率等诊断信息
  pub verbose: bool,
}

/// 一次运行的统计。
#[derive(Clone, Copy, Debug, Default)]
pub struct CaptureStats {
  /// 读取的帧数
  pub frames_read: u64,
  /// 转发给推理线程的帧数
  pub frames_forwarded: u64,
}

/// 第 `frame_count` 帧（从 1 计）是否转发给推理线程。
pub fn should_forward(frame_count: u64, skip_frames: u64) -> bool {
  frame_count % skip_frames.max(1) == 0
}

/// 运行捕获循环直到流结束或收到退出请求，并保证无论以何种方式退出，
/// 推理线程都被停止并在有界时间内等待、捕获源被释放、显示面被关闭。
pub fn run(
  mut source: Box<dyn InputSource>,
  mut sink: Box<dyn FrameSink>,
  mut worker: WorkerHandle,
  config: &CaptureConfig,
  quit: &AtomicBool,
) -> Result<CaptureStats> {
  let result = capture_loop(source.as_mut(), sink.as_mut(), &worker, config, quit);

  // 所有退出路径共用的收尾
  worker.stop();
  worker.join(WORKER_JOIN_TIMEOUT);
  drop(source);
  if let Err(e) = sink.finish() {
    warn!("关闭显示面失败: {:#}", e);
  }

  result
}

fn capture_loop(
  source: &mut dyn InputSource,
  sink: &mut dyn FrameSink,
  worker: &WorkerHandle,
  config: &CaptureConfig,
  quit: &AtomicBool,
) -> Result<CaptureStats> {
  let mut stats = CaptureStats::default();
  let mut displayed_frames = 0u64;
  let mut last_report = Instant::now();

  loop {
    if quit.load(Ordering::Relaxed) {
      info!("收到退出请求");
      break;
    }
    if config.max_frames > 0 && stats.frames_read >= config.max_frames {
      info!("已达到最大帧数限制: {}", config.max_frames);
      break;
    }

    // 流结束与读取失败都是正常终止，不是错误
    let frame = match source.next() {
      Some(Ok(frame)) => frame,
      Some(Err(e)) => {
        warn!("读取帧失败，按流结束处理: {:#}", e);
        break;
      }
      None => {
        if config.verbose {
          info!("输入流结束");
        }
        break;
      }
    };
    stats.frames_read += 1;

    let scaled = scale_to_max_width(frame.image, config.max_width);

    if should_forward(stats.frames_read, config.skip_frames) {
      stats.frames_forwarded += 1;
      worker.publish_frame(scaled.clone());
    }

    // 首个推理结果出来之前展示当前帧，绝不阻塞等待
    let to_show = worker.latest_annotated().unwrap_or_else(|| scaled.clone());
    sink.show(&to_show)?;
    displayed_frames += 1;

    if config.verbose && last_report.elapsed() > FPS_REPORT_INTERVAL {
      let elapsed = last_report.elapsed().as_secs_f64();
      info!(
        "显示帧率约 {:.1} fps，已读取 {} 帧",
        displayed_frames as f64 / elapsed,
        stats.frames_read
      );
      displayed_frames = 0;
      last_report = Instant::now();
    }
  }

  Ok(stats)
}
