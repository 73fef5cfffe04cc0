// 该文件是 Shanbao （山豹） 项目的一部分。
// src/input/sequence_source.rs - 图片序列输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Context, Result};
use image::ImageReader;

use super::{Frame, InputSource, InputSourceType};

/// 目录中的图片序列，按文件名排序后当作视频流回放。
///
/// 每帧以固定的名义帧率推进时间戳；尺寸以第一张图片为准，
/// 后续尺寸不一致的图片按原样传递，由下游缩放兜底。
pub struct SequenceSource {
  files: Vec<PathBuf>,
  cursor: usize,
  width: u32,
  height: u32,
  nominal_fps: f64,
}

impl SequenceSource {
  pub fn new(dir: &str) -> Result<Self> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
      .with_context(|| format!("无法读取目录: {}", dir))?
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|path| {
        path
          .extension()
          .and_then(|ext| ext.to_str())
          .map(|ext| {
            matches!(
              ext.to_lowercase().as_str(),
              "jpg" | "jpeg" | "png" | "bmp" | "gif" | "webp"
            )
          })
          .unwrap_or(false)
      })
      .collect();
    files.sort();

    anyhow::ensure!(!files.is_empty(), "目录中没有可用的图片: {}", dir);

    // 第一张图片决定流的标称尺寸
    let first = ImageReader::open(&files[0])
      .with_context(|| format!("无法打开图片: {}", files[0].display()))?
      .decode()
      .with_context(|| format!("无法解码图片: {}", files[0].display()))?
      .to_rgb8();

    Ok(Self {
      width: first.width(),
      height: first.height(),
      files,
      cursor: 0,
      nominal_fps: 25.0,
    })
  }
}

impl Iterator for SequenceSource {
  type Item = Result<Frame>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.get(self.cursor)?.clone();
    let index = self.cursor as u64;
    self.cursor += 1;

    let result = ImageReader::open(&path)
      .with_context(|| format!("无法打开图片: {}", path.display()))
      .and_then(|reader| {
        reader
          .decode()
          .with_context(|| format!("无法解码图片: {}", path.display()))
      })
      .map(|decoded| Frame {
        image: decoded.to_rgb8(),
        index,
        timestamp_ms: (index as f64 * 1000.0 / self.nominal_fps) as u64,
      });

    Some(result)
  }
}

impl InputSource for SequenceSource {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::Sequence
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    Some(self.nominal_fps)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  #[test]
  fn frames_follow_file_name_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["c.png", "a.png", "b.png"] {
      RgbImage::new(8, 6).save(dir.path().join(name)).unwrap();
    }
    // 非图片文件被忽略
    std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

    let mut source = SequenceSource::new(dir.path().to_str().unwrap()).unwrap();
    assert_eq!(source.width(), 8);
    assert_eq!(source.height(), 6);

    let indices: Vec<u64> = (&mut source).map(|frame| frame.unwrap().index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(source.next().is_none());
  }

  #[test]
  fn empty_directory_is_a_startup_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SequenceSource::new(dir.path().to_str().unwrap()).is_err());
  }
}
