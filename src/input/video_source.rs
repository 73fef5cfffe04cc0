// 该文件是 Shanbao （山豹） 项目的一部分。
// src/input/video_source.rs - 视频文件输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::{Pixel, input};
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling::{context::Context as ScalingContext, flag::Flags};
use ffmpeg_next::util::frame::video::Video;
use image::RgbImage;

use super::{Frame, InputSource, InputSourceType};

/// 基于 FFmpeg 解码的视频文件输入源。
pub struct VideoSource {
  input_context: ffmpeg::format::context::Input,
  video_stream_index: usize,
  decoder: ffmpeg::decoder::Video,
  to_rgb: ScalingContext,
  frame_index: u64,
  width: u32,
  height: u32,
  fps: f64,
  time_base: f64,
  /// 已送出 EOF，流不再产生帧
  drained: bool,
}

impl VideoSource {
  pub fn new(path: &str) -> Result<Self> {
    ffmpeg::init().context("无法初始化 FFmpeg")?;

    let input_context = input(&path).with_context(|| format!("无法打开视频文件: {}", path))?;
    let stream = input_context
      .streams()
      .best(Type::Video)
      .with_context(|| format!("找不到视频流: {}", path))?;
    let video_stream_index = stream.index();

    let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?
      .decoder()
      .video()?;
    let (width, height) = (decoder.width(), decoder.height());

    let rate = stream.avg_frame_rate();
    let fps = rate.numerator() as f64 / rate.denominator().max(1) as f64;
    let tb = stream.time_base();
    let time_base = tb.numerator() as f64 / tb.denominator().max(1) as f64;

    // 统一转成 RGB24，分辨率保持不变
    let to_rgb = ScalingContext::get(
      decoder.format(),
      width,
      height,
      Pixel::RGB24,
      width,
      height,
      Flags::BILINEAR,
    )?;

    Ok(Self {
      input_context,
      video_stream_index,
      decoder,
      to_rgb,
      frame_index: 0,
      width,
      height,
      fps,
      time_base,
      drained: false,
    })
  }

  /// 解码下一帧；返回 `None` 表示视频结束。
  fn decode_next(&mut self) -> Result<Option<Video>> {
    let mut decoded = Video::empty();
    loop {
      if self.decoder.receive_frame(&mut decoded).is_ok() {
        return Ok(Some(decoded));
      }
      if self.drained {
        return Ok(None);
      }

      // 向解码器喂入属于视频流的下一个数据包
      let packet = self
        .input_context
        .packets()
        .find(|(stream, _)| stream.index() == self.video_stream_index);
      match packet {
        Some((_, packet)) => self.decoder.send_packet(&packet)?,
        None => {
          self.decoder.send_eof()?;
          self.drained = true;
        }
      }
    }
  }

  /// 去除行对齐填充，拼出紧凑的 RGB24 缓冲区。
  fn packed_rgb(&self, rgb_frame: &Video) -> Vec<u8> {
    let data = rgb_frame.data(0);
    let stride = rgb_frame.stride(0);
    let row_bytes = self.width as usize * 3;

    let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
    for row in 0..self.height as usize {
      let start = row * stride;
      packed.extend_from_slice(&data[start..start + row_bytes]);
    }
    packed
  }
}

impl Iterator for VideoSource {
  type Item = Result<Frame>;

  fn next(&mut self) -> Option<Self::Item> {
    let decoded = match self.decode_next() {
      Ok(Some(decoded)) => decoded,
      Ok(None) => return None,
      Err(e) => {
        self.drained = true;
        return Some(Err(e));
      }
    };

    let mut rgb_frame = Video::empty();
    if let Err(e) = self.to_rgb.run(&decoded, &mut rgb_frame) {
      return Some(Err(e.into()));
    }

    let Some(image) = RgbImage::from_raw(self.width, self.height, self.packed_rgb(&rgb_frame))
    else {
      return Some(Err(anyhow::anyhow!("无法从解码帧创建 RGB 图像")));
    };

    let timestamp_ms = decoded
      .timestamp()
      .map_or(0, |ts| (ts as f64 * self.time_base * 1000.0) as u64);

    let frame = Frame {
      image,
      index: self.frame_index,
      timestamp_ms,
    };
    self.frame_index += 1;
    Some(Ok(frame))
  }
}

impl InputSource for VideoSource {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::Video
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    Some(self.fps)
  }
}
