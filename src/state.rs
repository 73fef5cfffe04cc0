// 该文件是 Shanbao （山豹） 项目的一部分。
// src/state.rs - 最近记录时间戳的持久化
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

use std::fs::File;
use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::warn;

/// 状态文件读写错误。
///
/// 调用方可以据此区分“使用了回退值”与“读取成功”，
/// 但所有读取失败最终都折叠为 0.0（表示从未记录过）。
#[derive(Error, Debug)]
pub enum StateFileError {
  #[error("状态文件不存在")]
  Missing,
  #[error("状态文件为空")]
  Empty,
  #[error("状态文件内容无法解析: {0:?}")]
  Malformed(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 读取最近一次记录的 Unix 时间戳（秒）。
pub fn load_last_logged(path: &Path) -> Result<f64, StateFileError> {
  if !path.exists() {
    return Err(StateFileError::Missing);
  }
  let text = std::fs::read_to_string(path)?;
  let text = text.trim();
  if text.is_empty() {
    return Err(StateFileError::Empty);
  }
  text
    .parse::<f64>()
    .map_err(|_| StateFileError::Malformed(text.to_string()))
}

/// 读取时间戳，任何失败都回退为 0.0 并记录诊断信息。
pub fn load_last_logged_or_zero(path: &Path) -> f64 {
  match load_last_logged(path) {
    Ok(ts) => ts,
    Err(StateFileError::Missing) => 0.0,
    Err(e) => {
      warn!("无法读取状态文件 {}: {}，按从未记录处理", path.display(), e);
      0.0
    }
  }
}

/// 覆盖写入时间戳，返回前刷新并强制落盘。
///
/// 失败由调用方以警告处理，内存中的时间戳仍然是权威值。
pub fn save_last_logged(path: &Path, ts: f64) -> Result<(), StateFileError> {
  let mut file = File::create(path)?;
  write!(file, "{}", ts)?;
  file.flush()?;
  file.sync_all()?;
  Ok(())
}
