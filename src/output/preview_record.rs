// 该文件是 Shanbao （山豹） 项目的一部分。
// src/output/preview_record.rs - 预览目录记录
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::info;

use super::FrameSink;

/// 把展示帧按序号写入目录的显示面。
///
/// 无头环境下代替 GUI 窗口：预览目录可以被任意图片查看器轮询。
pub struct PreviewRecord {
  dir: PathBuf,
  frame_index: u64,
}

impl PreviewRecord {
  pub fn new(dir: &std::path::Path) -> Result<Self> {
    std::fs::create_dir_all(dir).with_context(|| format!("无法创建预览目录: {}", dir.display()))?;
    Ok(Self {
      dir: dir.to_path_buf(),
      frame_index: 0,
    })
  }
}

impl FrameSink for PreviewRecord {
  fn show(&mut self, image: &RgbImage) -> Result<()> {
    let path = self.dir.join(format!("frame-{:08}.jpg", self.frame_index));
    image
      .save(&path)
      .with_context(|| format!("无法写入预览帧: {}", path.display()))?;
    self.frame_index += 1;
    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    info!("预览结束，共写入 {} 帧到 {}", self.frame_index, self.dir.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frames_are_numbered_sequentially() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = PreviewRecord::new(dir.path()).unwrap();
    let image = RgbImage::new(8, 8);

    sink.show(&image).unwrap();
    sink.show(&image).unwrap();
    sink.finish().unwrap();

    assert!(dir.path().join("frame-00000000.jpg").exists());
    assert!(dir.path().join("frame-00000001.jpg").exists());
  }
}
