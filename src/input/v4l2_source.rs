// 该文件是 Shanbao （山豹） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::pin::Pin;
use std::time::Instant;

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::info;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use super::{Frame, InputSource, InputSourceType};

/// 摄像头像素格式
enum PixelLayout {
  Rgb3,
  Yuyv,
}

/// V4L2 摄像头输入源。
///
/// v4l 的 Stream 借用 Device，因此 Device 放入 Pin<Box> 固定内存地址，
/// Stream 的生命周期由本结构体的 Drop 顺序保证（先 stream 后 device）。
pub struct V4l2Source {
  device: Pin<Box<Device>>,
  stream: Option<Stream<'static>>,
  layout: PixelLayout,
  frame_index: u64,
  width: u32,
  height: u32,
  start_time: Instant,
}

impl V4l2Source {
  pub fn new(device_path: &str) -> Result<Self> {
    let device = Box::pin(
      Device::with_path(device_path)
        .with_context(|| format!("无法打开摄像头设备: {}", device_path))?,
    );

    // 优先协商 RGB3，失败则回退到 YUYV 做软件转换
    let mut format = device.format()?;
    format.width = 640;
    format.height = 480;
    format.fourcc = FourCC::new(b"RGB3");
    let mut negotiated = device.set_format(&format)?;
    let layout = if negotiated.fourcc == FourCC::new(b"RGB3") {
      PixelLayout::Rgb3
    } else {
      format.fourcc = FourCC::new(b"YUYV");
      negotiated = device.set_format(&format)?;
      anyhow::ensure!(
        negotiated.fourcc == FourCC::new(b"YUYV"),
        "设备不支持 RGB3 或 YUYV 格式: {}",
        negotiated.fourcc
      );
      PixelLayout::Yuyv
    };

    info!(
      "摄像头已打开: {} {}x{} {}",
      device_path, negotiated.width, negotiated.height, negotiated.fourcc
    );

    let mut source = Self {
      device,
      stream: None,
      layout,
      frame_index: 0,
      width: negotiated.width,
      height: negotiated.height,
      start_time: Instant::now(),
    };

    // SAFETY: device 被 Pin<Box> 固定在堆上不会移动；stream 与 device
    // 存放在同一结构体中，Drop 时先取走 stream 再释放 device，
    // 因此把设备引用延长到 'static 不会悬垂。
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, 4).context("无法创建捕获流")?
    };
    source.stream = Some(stream);

    Ok(source)
  }
}

impl Drop for V4l2Source {
  fn drop(&mut self) {
    // stream 必须先于 device 释放
    self.stream.take();
  }
}

impl Iterator for V4l2Source {
  type Item = Result<Frame>;

  fn next(&mut self) -> Option<Self::Item> {
    let stream = self.stream.as_mut()?;

    let (buffer, _meta) = match stream.next() {
      Ok(captured) => captured,
      Err(e) => return Some(Err(anyhow::anyhow!("无法捕获帧: {}", e))),
    };

    let rgb_data = match self.layout {
      PixelLayout::Rgb3 => buffer[..(self.width * self.height * 3) as usize].to_vec(),
      PixelLayout::Yuyv => yuyv_to_rgb(buffer),
    };

    let Some(image) = RgbImage::from_raw(self.width, self.height, rgb_data) else {
      return Some(Err(anyhow::anyhow!("无法从捕获缓冲区创建 RGB 图像")));
    };

    let frame = Frame {
      image,
      index: self.frame_index,
      timestamp_ms: self.start_time.elapsed().as_millis() as u64,
    };
    self.frame_index += 1;
    Some(Ok(frame))
  }
}

impl InputSource for V4l2Source {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::V4l2
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    Some(30.0)
  }
}

/// YUYV 4:2:2 转 RGB24。每 4 字节编码两个像素，共享一对色度分量。
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
  let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

  for chunk in yuyv.chunks_exact(4) {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;

    for &y in &[chunk[0], chunk[2]] {
      let y = y as f32;
      rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
      rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
      rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
    }
  }

  rgb
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yuyv_gray_maps_to_gray() {
    // 色度为中性值时输出等于亮度
    let yuyv = [128u8, 128, 128, 128];
    let rgb = yuyv_to_rgb(&yuyv);
    assert_eq!(rgb, vec![128, 128, 128, 128, 128, 128]);
  }

  #[test]
  fn yuyv_pair_produces_two_pixels() {
    let yuyv = [0u8, 128, 255, 128];
    let rgb = yuyv_to_rgb(&yuyv);
    assert_eq!(rgb.len(), 6);
    assert_eq!(&rgb[0..3], &[0, 0, 0]);
    assert_eq!(&rgb[3..6], &[255, 255, 255]);
  }

  #[test]
  fn trailing_partial_chunk_is_ignored() {
    let yuyv = [128u8, 128, 128, 128, 7, 7];
    let rgb = yuyv_to_rgb(&yuyv);
    assert_eq!(rgb.len(), 6);
  }
}
