// 该文件是 Shanbao （山豹） 项目的一部分。
// tests/pipeline.rs - 捕获循环与推理线程的端到端测试
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Result;
use image::RgbImage;

use shanbao::alarm::{AlarmConfig, DetectionAlarm};
use shanbao::capture::{self, CaptureConfig};
use shanbao::detector::{DetectBox, DetectOutput, Detector};
use shanbao::input::{Frame, InputSource, InputSourceType};
use shanbao::output::NullSink;
use shanbao::worker::{WorkerConfig, WorkerHandle, spawn_worker};

/// 以接近真实帧率的节奏产生空白帧的输入源。
struct PacedSource {
  remaining: u64,
  index: u64,
  pace: Duration,
}

impl PacedSource {
  fn new(frames: u64, pace: Duration) -> Self {
    Self {
      remaining: frames,
      index: 0,
      pace,
    }
  }
}

impl Iterator for PacedSource {
  type Item = Result<Frame>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    std::thread::sleep(self.pace);
    self.remaining -= 1;
    let index = self.index;
    self.index += 1;
    Some(Ok(Frame {
      image: RgbImage::new(800, 600),
      index,
      timestamp_ms: index * 40,
    }))
  }
}

impl InputSource for PacedSource {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::Sequence
  }
  fn width(&self) -> u32 {
    800
  }
  fn height(&self) -> u32 {
    600
  }
  fn fps(&self) -> Option<f64> {
    Some(25.0)
  }
}

/// 每帧都检测到一只豹的测试检测器。
struct AlwaysDetect;

impl Detector for AlwaysDetect {
  fn detect(&mut self, _image: &RgbImage) -> Result<DetectOutput> {
    Ok(DetectOutput::from_boxes(vec![DetectBox {
      x: 10.0,
      y: 10.0,
      width: 100.0,
      height: 80.0,
      confidence: 0.92,
      class_id: 0,
      class_name: "leopard".to_string(),
    }]))
  }
}

fn make_worker(dir: &Path, cooldown_secs: f64, force_log: bool) -> WorkerHandle {
  let alarm = DetectionAlarm::new(AlarmConfig {
    out_file: dir.join("detections.txt"),
    last_file: dir.join(".last_logged_ts"),
    latitude: 18.5204,
    longitude: 73.8567,
    cooldown_secs,
    force_log,
    verbose: false,
  });
  spawn_worker(AlwaysDetect, alarm, WorkerConfig { plot: false })
}

fn log_line_count(dir: &Path) -> usize {
  std::fs::read_to_string(dir.join("detections.txt"))
    .unwrap_or_default()
    .lines()
    .count()
}

fn run_pipeline(dir: &Path, cooldown_secs: f64, force_log: bool, frames: u64) {
  let config = CaptureConfig {
    max_width: 640,
    skip_frames: 1,
    max_frames: 0,
    verbose: false,
  };
  let quit = AtomicBool::new(false);
  let stats = capture::run(
    Box::new(PacedSource::new(frames, Duration::from_millis(15))),
    Box::new(NullSink),
    make_worker(dir, cooldown_secs, force_log),
    &config,
    &quit,
  )
  .unwrap();
  assert_eq!(stats.frames_read, frames);
}

#[test]
fn forced_logging_records_processed_detections() {
  let dir = tempfile::tempdir().unwrap();
  run_pipeline(dir.path(), 600.0, true, 30);

  // 强制模式下每次完成的推理都会写一行；至少有一帧被推理过
  assert!(log_line_count(dir.path()) >= 1);
  // 状态文件随最后一次写入推进
  let ts: f64 = std::fs::read_to_string(dir.path().join(".last_logged_ts"))
    .unwrap()
    .trim()
    .parse()
    .unwrap();
  assert!(ts > 0.0);
}

#[test]
fn cooldown_survives_process_restart() {
  let dir = tempfile::tempdir().unwrap();

  // 第一次运行：冷却窗口远长于运行时长，恰好记录一行
  run_pipeline(dir.path(), 600.0, false, 20);
  assert_eq!(log_line_count(dir.path()), 1);

  // 重启后仍处于冷却窗口内，不再追加
  run_pipeline(dir.path(), 600.0, false, 20);
  assert_eq!(log_line_count(dir.path()), 1);
}

#[test]
fn display_frame_appears_without_detections_logged() {
  let dir = tempfile::tempdir().unwrap();

  struct SilentDetector;
  impl Detector for SilentDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<DetectOutput> {
      Ok(DetectOutput::default())
    }
  }

  let alarm = DetectionAlarm::new(AlarmConfig {
    out_file: dir.path().join("detections.txt"),
    last_file: dir.path().join(".last_logged_ts"),
    latitude: 0.0,
    longitude: 0.0,
    cooldown_secs: 600.0,
    force_log: true,
    verbose: false,
  });
  let handle = spawn_worker(SilentDetector, alarm, WorkerConfig { plot: true });

  handle.publish_frame(RgbImage::new(64, 64));
  let deadline = std::time::Instant::now() + Duration::from_secs(2);
  while handle.latest_annotated().is_none() && std::time::Instant::now() < deadline {
    std::thread::sleep(Duration::from_millis(5));
  }

  assert!(handle.latest_annotated().is_some());
  assert!(!dir.path().join("detections.txt").exists());
}
