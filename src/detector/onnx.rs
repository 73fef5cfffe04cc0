// 该文件是 Shanbao （山豹） 项目的一部分。
// src/detector/onnx.rs - 基于 ONNX Runtime 的 YOLO 检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use super::{DetectBox, DetectOutput, Detector};

/// 模型输入边长（YOLOv8 导出时的标准方形输入）
const MODEL_INPUT: u32 = 640;
/// NMS IOU 阈值
const NMS_IOU: f32 = 0.45;

/// 基于 ONNX Runtime 的 YOLOv8 系列检测器。
///
/// 输出张量布局为 [1, 4 + 类别数, 候选框数]，按行主序存储；
/// 豹检测模型通常只有一个类别。
pub struct OnnxDetector {
  session: Session,
  /// 置信度阈值
  confidence_threshold: f32,
  /// 类别名称，索引即类别 id
  class_names: Vec<String>,
}

impl OnnxDetector {
  /// 加载 ONNX 模型。类别名缺省为单类 "leopard"。
  pub fn new(model_path: &str, confidence_threshold: f32) -> Result<Self> {
    let session = Session::builder()
      .context("无法创建 ONNX Runtime 会话构建器")?
      .commit_from_file(model_path)
      .with_context(|| format!("无法加载模型: {}", model_path))?;

    Ok(Self {
      session,
      confidence_threshold,
      class_names: vec!["leopard".to_string()],
    })
  }

  /// 替换类别名称表（多类别模型使用）。
  pub fn with_class_names(mut self, names: Vec<String>) -> Self {
    if !names.is_empty() {
      self.class_names = names;
    }
    self
  }

  fn class_name(&self, id: usize) -> String {
    self
      .class_names
      .get(id)
      .cloned()
      .unwrap_or_else(|| format!("class{}", id))
  }

  /// 预处理：缩放到模型输入尺寸并转为归一化的 NCHW f32 张量。
  fn preprocess(&self, image: &RgbImage) -> Result<ort::value::DynValue> {
    let resized = image::imageops::resize(
      image,
      MODEL_INPUT,
      MODEL_INPUT,
      image::imageops::FilterType::Triangle,
    );
    let raw = resized.as_raw();

    let plane = (MODEL_INPUT * MODEL_INPUT) as usize;
    let mut data = vec![0f32; 3 * plane];
    for idx in 0..plane {
      data[idx] = raw[idx * 3] as f32 / 255.0;
      data[plane + idx] = raw[idx * 3 + 1] as f32 / 255.0;
      data[2 * plane + idx] = raw[idx * 3 + 2] as f32 / 255.0;
    }

    let shape = [1usize, 3, MODEL_INPUT as usize, MODEL_INPUT as usize];
    Ok(
      Tensor::from_array((shape, data.into_boxed_slice()))
        .context("无法创建输入张量")?
        .into_dyn(),
    )
  }

  /// 后处理：解码候选框、应用置信度阈值、缩放回原图坐标、NMS。
  fn postprocess(
    &self,
    data: &[f32],
    num_classes: usize,
    num_proposals: usize,
    original_width: f32,
    original_height: f32,
  ) -> Vec<DetectBox> {
    let scale_x = original_width / MODEL_INPUT as f32;
    let scale_y = original_height / MODEL_INPUT as f32;

    let mut candidates = Vec::new();
    for i in 0..num_proposals {
      // 布局: [cx, cy, w, h, 类别0分数, 类别1分数, ...]，按候选框列展开
      let mut best_score = 0f32;
      let mut best_class = 0usize;
      for c in 0..num_classes {
        let score = data[(4 + c) * num_proposals + i];
        if score > best_score {
          best_score = score;
          best_class = c;
        }
      }
      if best_score < self.confidence_threshold {
        continue;
      }

      let cx = data[i];
      let cy = data[num_proposals + i];
      let w = data[2 * num_proposals + i];
      let h = data[3 * num_proposals + i];

      let x = (cx - w / 2.0) * scale_x;
      let y = (cy - h / 2.0) * scale_y;

      candidates.push(DetectBox {
        x: x.max(0.0),
        y: y.max(0.0),
        width: (w * scale_x).min(original_width),
        height: (h * scale_y).min(original_height),
        confidence: best_score,
        class_id: best_class,
        class_name: self.class_name(best_class),
      });
    }

    nms(candidates, NMS_IOU)
  }
}

impl Detector for OnnxDetector {
  fn detect(&mut self, image: &RgbImage) -> Result<DetectOutput> {
    let original_width = image.width() as f32;
    let original_height = image.height() as f32;

    let input = self.preprocess(image)?;
    let outputs = self
      .session
      .run(ort::inputs!["images" => input])
      .context("推理失败")?;

    let (shape, data) = outputs["output0"]
      .try_extract_tensor::<f32>()
      .context("无法提取输出张量")?;
    anyhow::ensure!(shape.len() == 3 && shape[1] >= 5, "意外的输出形状: {:?}", shape);

    let num_classes = shape[1] as usize - 4;
    let num_proposals = shape[2] as usize;
    let data = data.to_vec();
    drop(outputs);

    let boxes = self.postprocess(
      &data,
      num_classes,
      num_proposals,
      original_width,
      original_height,
    );
    debug!("推理产生 {} 个检测框", boxes.len());

    Ok(DetectOutput::from_boxes(boxes))
  }
}

/// 非极大值抑制，按置信度降序保留互不重叠的检测框。
fn nms(mut boxes: Vec<DetectBox>, iou_threshold: f32) -> Vec<DetectBox> {
  boxes.sort_by(|a, b| {
    b.confidence
      .partial_cmp(&a.confidence)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut kept: Vec<DetectBox> = Vec::new();
  'outer: for candidate in boxes {
    for keep in &kept {
      if keep.class_id == candidate.class_id && iou(keep, &candidate) > iou_threshold {
        continue 'outer;
      }
    }
    kept.push(candidate);
  }
  kept
}

/// 两个检测框的交并比。
fn iou(a: &DetectBox, b: &DetectBox) -> f32 {
  let x1 = a.x.max(b.x);
  let y1 = a.y.max(b.y);
  let x2 = (a.x + a.width).min(b.x + b.width);
  let y2 = (a.y + a.height).min(b.y + b.height);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.width * a.height + b.width * b.height - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn boxed(x: f32, y: f32, confidence: f32) -> DetectBox {
    DetectBox {
      x,
      y,
      width: 100.0,
      height: 100.0,
      confidence,
      class_id: 0,
      class_name: "leopard".to_string(),
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = boxed(0.0, 0.0, 0.9);
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = boxed(0.0, 0.0, 0.9);
    let b = boxed(500.0, 500.0, 0.8);
    assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn nms_suppresses_overlapping_boxes() {
    let boxes = vec![
      boxed(0.0, 0.0, 0.6),
      boxed(5.0, 5.0, 0.9),
      boxed(500.0, 500.0, 0.7),
    ];
    let kept = nms(boxes, 0.45);
    assert_eq!(kept.len(), 2);
    // 重叠的两个框中保留置信度更高的
    assert!((kept[0].confidence - 0.9).abs() < 1e-6);
  }
}
