// 该文件是 Shanbao （山豹） 项目的一部分。
// src/slot.rs - 容量为一的最新值信箱
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

use std::sync::Mutex;

/// 容量为一的覆盖式信箱。
///
/// 发布永不阻塞：新值无条件替换尚未被消费的旧值（丢弃最旧策略）。
/// 捕获循环与推理线程各持有一个实例，分别传递待推理帧与最新标注帧，
/// 因此积压深度至多为一，内存与帧的陈旧程度都有上界。
pub struct LatestSlot<T> {
  inner: Mutex<Option<T>>,
}

impl<T> Default for LatestSlot<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> LatestSlot<T> {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(None),
    }
  }

  /// 发布新值，返回是否覆盖了未被消费的旧值。
  pub fn publish(&self, value: T) -> bool {
    let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    slot.replace(value).is_some()
  }

  /// 原子地取走并清空信箱中的值。
  pub fn take(&self) -> Option<T> {
    let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    slot.take()
  }
}

impl<T: Clone> LatestSlot<T> {
  /// 返回最新值的防御性拷贝，不消费信箱内容。
  pub fn latest(&self) -> Option<T> {
    let slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    slot.clone()
  }
}
