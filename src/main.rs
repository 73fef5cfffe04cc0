// 该文件是 Shanbao （山豹） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::{Context, Result};
use clap::Parser;

use shanbao::alarm;

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  // 一次性写入测试模式：验证记录文件可写后直接退出
  if args.test_write {
    alarm::test_write(&args.out, args.lat, args.lon)
      .with_context(|| format!("无法写入记录文件: {}", args.out.display()))?;
    return Ok(());
  }

  run(args)
}

#[cfg(feature = "model_onnx")]
fn run(args: args::Args) -> Result<()> {
  use std::sync::Arc;
  use std::sync::atomic::{AtomicBool, Ordering};

  use tracing::{info, warn};

  use shanbao::alarm::{AlarmConfig, DetectionAlarm};
  use shanbao::capture::{self, CaptureConfig};
  use shanbao::detector::OnnxDetector;
  use shanbao::input::create_input_source;
  use shanbao::output::create_frame_sink;
  use shanbao::worker::{WorkerConfig, spawn_worker};

  info!("模型文件路径: {}", args.model);
  info!("视频来源: {}", args.source);
  info!("记录文件: {}", args.out.display());
  info!(
    "最大帧宽: {} 跳帧: {} 置信度阈值: {} 绘制: {}",
    args.max_width, args.skip_frames, args.conf, !args.no_plot
  );

  // 启动失败（模型或输入源打不开）是致命错误，在进入循环前中止
  let detector = OnnxDetector::new(&args.model, args.conf)?;
  let source = create_input_source(&args.source)
    .with_context(|| format!("无法打开视频来源: {}", args.source))?;
  info!("输入源已打开: {}x{}", source.width(), source.height());

  let sink = create_frame_sink(!args.no_show, &args.preview_dir)?;

  let alarm = DetectionAlarm::new(AlarmConfig {
    out_file: args.out.clone(),
    last_file: args.last_file.clone(),
    latitude: args.lat,
    longitude: args.lon,
    cooldown_secs: args.cooldown_mins * 60.0,
    force_log: args.force_log,
    verbose: args.verbose,
  });

  let worker = spawn_worker(
    detector,
    alarm,
    WorkerConfig {
      plot: !args.no_plot,
    },
  );

  // Ctrl-C 置位退出标志，捕获循环在下一帧边界退出
  let quit = Arc::new(AtomicBool::new(false));
  {
    let quit = Arc::clone(&quit);
    ctrlc::set_handler(move || {
      warn!("收到中断信号，准备退出...");
      quit.store(true, Ordering::Relaxed);
    })
    .expect("Error setting Ctrl-C handler");
  }

  let config = CaptureConfig {
    max_width: args.max_width,
    skip_frames: args.skip_frames,
    max_frames: args.max_frames,
    verbose: args.verbose,
  };
  let stats = capture::run(source, sink, worker, &config, &quit)?;

  info!(
    "处理完成: 共读取 {} 帧，转发 {} 帧用于推理",
    stats.frames_read, stats.frames_forwarded
  );

  Ok(())
}

#[cfg(not(feature = "model_onnx"))]
fn run(_args: args::Args) -> Result<()> {
  anyhow::bail!("未启用任何模型后端，实时检测不可用（需要 model_onnx 特性）")
}
