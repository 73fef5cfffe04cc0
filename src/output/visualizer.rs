// 该文件是 Shanbao （山豹） 项目的一部分。
// src/output/visualizer.rs - 检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detector::DetectBox;

/// 检测框绘制工具。
pub struct Visualizer {
  /// 按类别取色的颜色表
  colors: Vec<Rgb<u8>>,
}

impl Default for Visualizer {
  fn default() -> Self {
    Self::new()
  }
}

impl Visualizer {
  pub fn new() -> Self {
    // 均匀分布的色相，类别数多于颜色数时循环使用
    let colors = (0..16)
      .map(|i| hsv_to_rgb((i as f32 / 16.0) * 360.0, 0.8, 0.9))
      .collect();
    Self { colors }
  }

  /// 在图像上绘制检测框（双层空心矩形以增加可见度）。
  pub fn draw_boxes(&self, image: &mut RgbImage, boxes: &[DetectBox]) {
    for detection in boxes {
      let color = self.colors[detection.class_id % self.colors.len()];

      let x = detection.x.max(0.0) as i32;
      let y = detection.y.max(0.0) as i32;
      let width = detection.width.min(image.width() as f32 - detection.x) as u32;
      let height = detection.height.min(image.height() as f32 - detection.y) as u32;

      if width == 0 || height == 0 {
        continue;
      }

      draw_hollow_rect_mut(image, Rect::at(x, y).of_size(width, height), color);
      if width > 2 && height > 2 {
        let inner = Rect::at(x + 1, y + 1).of_size(width - 2, height - 2);
        draw_hollow_rect_mut(image, inner, color);
      }
    }
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_box() -> DetectBox {
    DetectBox {
      x: 10.0,
      y: 10.0,
      width: 40.0,
      height: 30.0,
      confidence: 0.9,
      class_id: 0,
      class_name: "leopard".to_string(),
    }
  }

  #[test]
  fn drawing_modifies_pixels_inside_the_frame() {
    let visualizer = Visualizer::new();
    let mut image = RgbImage::new(100, 100);
    visualizer.draw_boxes(&mut image, &[sample_box()]);
    assert!(image.pixels().any(|p| p.0 != [0, 0, 0]));
  }

  #[test]
  fn out_of_frame_box_is_skipped() {
    let visualizer = Visualizer::new();
    let mut image = RgbImage::new(100, 100);
    let mut outside = sample_box();
    outside.x = 150.0;
    visualizer.draw_boxes(&mut image, &[outside]);
    assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
  }
}
