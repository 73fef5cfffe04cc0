// 该文件是 Shanbao （山豹） 项目的一部分。
// src/output/mod.rs - 输出模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod preview_record;
#[cfg(feature = "annotate")]
mod visualizer;

pub use preview_record::PreviewRecord;
#[cfg(feature = "annotate")]
pub use visualizer::Visualizer;

use std::path::Path;

use anyhow::Result;
use image::RgbImage;

/// 显示面。捕获循环把要展示的帧交给它，绝不因显示而阻塞推理。
pub trait FrameSink {
  /// 展示一帧
  fn show(&mut self, image: &RgbImage) -> Result<()>;

  /// 结束展示，释放资源
  fn finish(&mut self) -> Result<()>;
}

/// 关闭显示时使用的空显示面。
pub struct NullSink;

impl FrameSink for NullSink {
  fn show(&mut self, _image: &RgbImage) -> Result<()> {
    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    Ok(())
  }
}

/// 创建显示面：启用显示时把帧记录到预览目录，否则丢弃。
pub fn create_frame_sink(show: bool, preview_dir: &Path) -> Result<Box<dyn FrameSink>> {
  if show {
    Ok(Box::new(PreviewRecord::new(preview_dir)?))
  } else {
    Ok(Box::new(NullSink))
  }
}
