// 该文件是 Shanbao （山豹） 项目的一部分。
// src/worker.rs - 后台推理线程
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use image::RgbImage;
use tracing::{error, info, warn};

use crate::alarm::DetectionAlarm;
use crate::detector::{DetectOutput, Detector, detection_count};
use crate::slot::LatestSlot;

/// 信箱为空时的等待间隔，抑制空转又不至于忙等
const IDLE_WAIT: Duration = Duration::from_millis(10);
/// 推理失败后的退避时长
const ERROR_BACKOFF: Duration = Duration::from_millis(200);

/// 推理线程配置。
#[derive(Clone, Debug)]
pub struct WorkerConfig {
  /// 在展示帧上绘制检测框（关闭时直接透传原始帧，更快）
  pub plot: bool,
}

/// 捕获循环与推理线程之间的共享状态：
/// 两个容量为一的信箱加一个停止标志。
pub struct WorkerShared {
  /// 待推理帧（捕获循环写入，推理线程取走）
  pending: LatestSlot<RgbImage>,
  /// 最新展示帧（推理线程写入，捕获循环读取）
  annotated: LatestSlot<RgbImage>,
  /// 协作式停止标志
  stop: AtomicBool,
}

impl WorkerShared {
  fn new() -> Self {
    Self {
      pending: LatestSlot::new(),
      annotated: LatestSlot::new(),
      stop: AtomicBool::new(false),
    }
  }
}

/// 推理线程的持有者句柄。
///
/// 停止是协作式的：线程每轮迭代检查停止标志，正在进行的推理不会被打断，
/// 因此 `join` 的等待有上界，超时后线程被分离、自行退出。
pub struct WorkerHandle {
  shared: Arc<WorkerShared>,
  thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
  /// 把一帧交给推理线程；未被消费的旧帧会被覆盖丢弃。
  /// 返回是否覆盖了旧帧，调用方永不阻塞。
  pub fn publish_frame(&self, image: RgbImage) -> bool {
    self.shared.pending.publish(image)
  }

  /// 最新展示帧的防御性拷贝；推理线程可能随时覆盖原值。
  pub fn latest_annotated(&self) -> Option<RgbImage> {
    self.shared.annotated.latest()
  }

  /// 请求推理线程停止。
  pub fn stop(&self) {
    self.shared.stop.store(true, Ordering::Relaxed);
  }

  /// 等待推理线程退出，最多等待 `timeout`。
  ///
  /// 超时返回 false 并分离线程，调用方不会无限期阻塞。
  pub fn join(&mut self, timeout: Duration) -> bool {
    let Some(handle) = self.thread.take() else {
      return true;
    };

    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
      if Instant::now() >= deadline {
        warn!("推理线程未在 {:?} 内退出，转为分离运行", timeout);
        return false;
      }
      std::thread::sleep(IDLE_WAIT);
    }
    handle.join().is_ok()
  }
}

impl Drop for WorkerHandle {
  fn drop(&mut self) {
    self.stop();
    self.join(Duration::from_secs(1));
  }
}

/// 启动推理线程。
///
/// 进程生命周期内只有这一个推理单元，推理严格串行，
/// 任一时刻至多一次检测调用在途。
pub fn spawn_worker<D>(detector: D, alarm: DetectionAlarm, config: WorkerConfig) -> WorkerHandle
where
  D: Detector + Send + 'static,
{
  let shared = Arc::new(WorkerShared::new());
  let thread = {
    let shared = Arc::clone(&shared);
    std::thread::Builder::new()
      .name("shanbao-infer".to_string())
      .spawn(move || run_worker(detector, alarm, config, &shared))
      .expect("无法创建推理线程")
  };

  WorkerHandle {
    shared,
    thread: Some(thread),
  }
}

fn run_worker<D: Detector>(
  mut detector: D,
  mut alarm: DetectionAlarm,
  config: WorkerConfig,
  shared: &WorkerShared,
) {
  info!("推理线程启动");

  while !shared.stop.load(Ordering::Relaxed) {
    // 原子地取走最新待推理帧；旧帧已在发布时被覆盖丢弃
    let Some(frame) = shared.pending.take() else {
      std::thread::sleep(IDLE_WAIT);
      continue;
    };

    let output = match detector.detect(&frame) {
      Ok(output) => output,
      Err(e) => {
        // 推理失败从不致命：记录、退避、继续下一帧
        error!("推理失败: {:#}", e);
        std::thread::sleep(ERROR_BACKOFF);
        continue;
      }
    };

    let count = detection_count(&output);
    if count > 0
      && let Err(e) = alarm.on_detection(count, unix_now())
    {
      error!("写入检测记录失败: {}", e);
    }

    let display = render_display(frame, &output, &config);
    shared.annotated.publish(display);
  }

  info!("推理线程退出");
}

/// 产生展示帧：绘制检测框，或在关闭绘制时透传原始帧。
#[cfg_attr(not(feature = "annotate"), allow(unused_variables))]
fn render_display(frame: RgbImage, output: &DetectOutput, config: &WorkerConfig) -> RgbImage {
  #[cfg(feature = "annotate")]
  {
    let mut frame = frame;
    if config.plot
      && let Some(boxes) = &output.boxes
      && !boxes.is_empty()
    {
      crate::output::Visualizer::new().draw_boxes(&mut frame, boxes);
    }
    frame
  }
  #[cfg(not(feature = "annotate"))]
  {
    frame
  }
}

/// 当前 Unix 时间（秒）。
fn unix_now() -> f64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs_f64())
    .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::alarm::AlarmConfig;
  use crate::detector::DetectBox;
  use anyhow::Result;

  /// 每次调用返回固定数量检测框的测试检测器。
  struct FixedDetector {
    boxes_per_frame: usize,
  }

  impl Detector for FixedDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<DetectOutput> {
      let boxes = (0..self.boxes_per_frame)
        .map(|i| DetectBox {
          x: i as f32 * 10.0,
          y: 0.0,
          width: (image.width() / 4) as f32,
          height: (image.height() / 4) as f32,
          confidence: 0.9,
          class_id: 0,
          class_name: "leopard".to_string(),
        })
        .collect();
      Ok(DetectOutput::from_boxes(boxes))
    }
  }

  /// 永远失败的检测器，验证失败不致命。
  struct FailingDetector;

  impl Detector for FailingDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<DetectOutput> {
      anyhow::bail!("后端崩溃")
    }
  }

  fn test_alarm(dir: &std::path::Path, force_log: bool) -> DetectionAlarm {
    DetectionAlarm::new(AlarmConfig {
      out_file: dir.join("detections.txt"),
      last_file: dir.join(".last_logged_ts"),
      latitude: 18.5204,
      longitude: 73.8567,
      cooldown_secs: 600.0,
      force_log,
      verbose: false,
    })
  }

  fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
      if condition() {
        return true;
      }
      std::thread::sleep(Duration::from_millis(5));
    }
    false
  }

  #[test]
  fn worker_publishes_annotated_frames_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = spawn_worker(
      FixedDetector {
        boxes_per_frame: 2,
      },
      test_alarm(dir.path(), true),
      WorkerConfig { plot: true },
    );

    handle.publish_frame(RgbImage::new(64, 64));
    assert!(wait_for(
      || handle.latest_annotated().is_some(),
      Duration::from_secs(2)
    ));

    handle.stop();
    assert!(handle.join(Duration::from_secs(1)));

    let log = std::fs::read_to_string(dir.path().join("detections.txt")).unwrap();
    assert!(log.lines().count() >= 1);
  }

  #[test]
  fn worker_stops_promptly_when_idle() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = spawn_worker(
      FixedDetector {
        boxes_per_frame: 0,
      },
      test_alarm(dir.path(), false),
      WorkerConfig { plot: false },
    );

    let started = Instant::now();
    handle.stop();
    assert!(handle.join(Duration::from_secs(1)));
    assert!(started.elapsed() < Duration::from_secs(1));
  }

  #[test]
  fn inference_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = spawn_worker(
      FailingDetector,
      test_alarm(dir.path(), true),
      WorkerConfig { plot: false },
    );

    handle.publish_frame(RgbImage::new(32, 32));
    std::thread::sleep(Duration::from_millis(50));
    handle.publish_frame(RgbImage::new(32, 32));

    handle.stop();
    assert!(handle.join(Duration::from_secs(2)));

    // 失败的推理不产生检测事件
    assert!(!dir.path().join("detections.txt").exists());
  }

  #[test]
  fn no_detection_keeps_log_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = spawn_worker(
      FixedDetector {
        boxes_per_frame: 0,
      },
      test_alarm(dir.path(), true),
      WorkerConfig { plot: true },
    );

    handle.publish_frame(RgbImage::new(64, 64));
    assert!(wait_for(
      || handle.latest_annotated().is_some(),
      Duration::from_secs(2)
    ));

    handle.stop();
    assert!(handle.join(Duration::from_secs(1)));
    assert!(!dir.path().join("detections.txt").exists());
  }
}
