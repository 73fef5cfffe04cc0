// 该文件是 Shanbao （山豹） 项目的一部分。
// src/alarm.rs - 冷却门控的检测记录
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::state;

#[derive(Error, Debug)]
pub enum AlarmError {
  #[error("无法写入检测记录: {0}")]
  Io(#[from] std::io::Error),
}

/// 检测记录与冷却配置。
///
/// 坐标与路径不走进程级默认值，全部由调用方显式传入。
#[derive(Clone, Debug)]
pub struct AlarmConfig {
  /// 检测记录文件（逐行追加）
  pub out_file: PathBuf,
  /// 最近记录时间戳的状态文件
  pub last_file: PathBuf,
  /// 纬度
  pub latitude: f64,
  /// 经度
  pub longitude: f64,
  /// 冷却时长（秒）
  pub cooldown_secs: f64,
  /// 跳过冷却，每次检测都记录
  pub force_log: bool,
  /// 输出冷却抑制的诊断信息
  pub verbose: bool,
}

/// 冷却门控的判定结果。
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GateDecision {
  /// 允许写入
  Open,
  /// 处于冷却窗口内，抑制写入（非错误）
  Suppressed { remaining_secs: f64 },
}

/// 带冷却与崩溃恢复的检测告警。
///
/// `last_logged` 在构造时从状态文件载入一次，此后仅在记录成功写入时前进，
/// 并在每次前进后持久化，保证进程重启不会立即重复记录。
/// 持久化值 0.0 表示从未记录过，此时门控无条件放行。
pub struct DetectionAlarm {
  config: AlarmConfig,
  last_logged: Option<f64>,
}

impl DetectionAlarm {
  pub fn new(config: AlarmConfig) -> Self {
    let loaded = state::load_last_logged_or_zero(&config.last_file);
    let last_logged = if loaded > 0.0 {
      info!("载入最近记录时间戳: {}", loaded);
      Some(loaded)
    } else {
      None
    };
    Self {
      config,
      last_logged,
    }
  }

  pub fn last_logged(&self) -> f64 {
    self.last_logged.unwrap_or(0.0)
  }

  /// 判定给定时刻是否允许写入记录。
  pub fn gate(&self, now: f64) -> GateDecision {
    let Some(last_logged) = self.last_logged else {
      return GateDecision::Open;
    };
    if self.config.force_log || now - last_logged >= self.config.cooldown_secs {
      GateDecision::Open
    } else {
      GateDecision::Suppressed {
        remaining_secs: self.config.cooldown_secs - (now - last_logged),
      }
    }
  }

  /// 处理一次检测（`box_count` > 0），返回是否实际写入了记录。
  ///
  /// 抑制不是错误；只有追加记录失败才返回错误，此时 `last_logged` 不前进，
  /// 不会产生虚假的检测事件。
  pub fn on_detection(&mut self, box_count: usize, now: f64) -> Result<bool, AlarmError> {
    match self.gate(now) {
      GateDecision::Suppressed { remaining_secs } => {
        if self.config.verbose {
          debug!("冷却窗口内（剩余 {:.0} 秒），跳过写入", remaining_secs);
        }
        Ok(false)
      }
      GateDecision::Open => {
        let ts_str = format_timestamp(now);
        append_log_line(
          &self.config.out_file,
          &ts_str,
          self.config.latitude,
          self.config.longitude,
        )?;
        // 唯一推进 last_logged 的路径
        self.last_logged = Some(now);
        if let Err(e) = state::save_last_logged(&self.config.last_file, now) {
          warn!(
            "无法写入状态文件 {}: {}，内存中的时间戳仍然有效",
            self.config.last_file.display(),
            e
          );
        }
        info!(
          "[{}] 检测到 {} 处目标，已记录到 {}",
          ts_str,
          box_count,
          self.config.out_file.display()
        );
        Ok(true)
      }
    }
  }
}

/// 把 Unix 秒时间戳格式化为记录行使用的本地时间。
fn format_timestamp(now: f64) -> String {
  DateTime::from_timestamp(now as i64, 0)
    .map(|ts| {
      ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
    })
    .unwrap_or_else(|| "1970-01-01 00:00:00".to_string())
}

/// 追加一行 `时间戳,纬度,经度`，父目录不存在时创建，落盘后返回。
fn append_log_line(out_file: &Path, ts_str: &str, lat: f64, lon: f64) -> Result<(), AlarmError> {
  if let Some(parent) = out_file.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  let mut file = OpenOptions::new().append(true).create(true).open(out_file)?;
  writeln!(file, "{},{},{}", ts_str, lat, lon)?;
  file.flush()?;
  file.sync_all()?;
  Ok(())
}

/// 一次性写入测试：无条件追加一行并报告结果（`--test-write`）。
pub fn test_write(out_file: &Path, lat: f64, lon: f64) -> Result<(), AlarmError> {
  let ts_str = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
  append_log_line(out_file, &ts_str, lat, lon)?;
  info!("测试行已写入: {}", out_file.display());
  Ok(())
}
