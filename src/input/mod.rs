// 该文件是 Shanbao （山豹） 项目的一部分。
// src/input/mod.rs - 输入源模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod image_source;
mod sequence_source;
mod v4l2_source;
#[cfg(feature = "video_file")]
mod video_source;

use anyhow::Result;
use image::RgbImage;

pub use image_source::ImageSource;
pub use sequence_source::SequenceSource;
pub use v4l2_source::V4l2Source;
#[cfg(feature = "video_file")]
pub use video_source::VideoSource;

/// 帧数据
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

/// 输入源类型
pub enum InputSourceType {
  /// 图片文件
  Image,
  /// 图片序列目录
  Sequence,
  /// 视频文件
  Video,
  /// V4L2 摄像头
  V4l2,
}

/// 输入源 trait
///
/// 迭代结束（返回 `None`）表示流正常终止，不是错误。
pub trait InputSource: Iterator<Item = Result<Frame>> {
  /// 获取输入源类型
  fn source_type(&self) -> InputSourceType;

  /// 获取帧宽度
  fn width(&self) -> u32;

  /// 获取帧高度
  fn height(&self) -> u32;

  /// 获取帧率（如果适用）
  fn fps(&self) -> Option<f64>;
}

const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".bmp", ".gif", ".webp"];

/// 从命令行参数创建输入源。
///
/// - 纯数字视为 V4L2 设备索引（`0` → `/dev/video0`）
/// - `/dev/video*` 或 `v4l2://` 前缀视为 V4L2 设备路径
/// - 图片扩展名视为单张图片
/// - 目录视为按文件名排序回放的图片序列
/// - 其余视为视频文件（需要 `video_file` 特性）
pub fn create_input_source(source: &str) -> Result<Box<dyn InputSource>> {
  if let Ok(index) = source.parse::<u32>() {
    let device_path = format!("/dev/video{}", index);
    return Ok(Box::new(V4l2Source::new(&device_path)?));
  }

  if source.starts_with("/dev/video") || source.starts_with("v4l2://") {
    let device_path = source.trim_start_matches("v4l2://");
    return Ok(Box::new(V4l2Source::new(device_path)?));
  }

  if std::path::Path::new(source).is_dir() {
    return Ok(Box::new(SequenceSource::new(source)?));
  }

  let lower = source.to_lowercase();
  if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
    return Ok(Box::new(ImageSource::new(source)?));
  }

  #[cfg(feature = "video_file")]
  {
    Ok(Box::new(VideoSource::new(source)?))
  }
  #[cfg(not(feature = "video_file"))]
  {
    anyhow::bail!(
      "无法打开输入源 {}: 视频文件支持未编译（需要 video_file 特性）",
      source
    )
  }
}
