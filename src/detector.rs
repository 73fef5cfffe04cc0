// 该文件是 Shanbao （山豹） 项目的一部分。
// src/detector.rs - 检测模型边界
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use image::RgbImage;

/// 单个检测框（像素坐标，相对于送入检测器的图像）。
#[derive(Clone, Debug)]
pub struct DetectBox {
  /// 边界框左上角 x 坐标
  pub x: f32,
  /// 边界框左上角 y 坐标
  pub y: f32,
  /// 边界框宽度
  pub width: f32,
  /// 边界框高度
  pub height: f32,
  /// 置信度
  pub confidence: f32,
  /// 类别索引
  pub class_id: usize,
  /// 类别名称
  pub class_name: String,
}

/// 一次推理的结果。
///
/// 不同后端暴露的结果形态不同：多数后端给出可枚举的检测框集合，
/// 个别后端只报告检测框数量。两个字段都是可选的，互不权威。
#[derive(Clone, Debug, Default)]
pub struct DetectOutput {
  /// 检测框集合
  pub boxes: Option<Vec<DetectBox>>,
  /// 仅有数量时的检测框计数
  pub box_count: Option<usize>,
}

impl DetectOutput {
  pub fn from_boxes(boxes: Vec<DetectBox>) -> Self {
    Self {
      boxes: Some(boxes),
      box_count: None,
    }
  }
}

/// 从推理结果中提取检测框数量。
///
/// 先尝试检测框集合的长度，再尝试数量字段，两者都缺失时返回 0。
/// 该函数永不失败。
pub fn detection_count(output: &DetectOutput) -> usize {
  if let Some(boxes) = &output.boxes {
    return boxes.len();
  }
  output.box_count.unwrap_or(0)
}

/// 检测模型的不透明能力边界：输入一幅图像，输出一组带置信度的检测框。
pub trait Detector {
  fn detect(&mut self, image: &RgbImage) -> Result<DetectOutput>;
}

#[cfg(feature = "model_onnx")]
mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::OnnxDetector;
