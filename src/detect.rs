// 该文件是 Yuntu （云图） 项目的一部分。
// src/detect.rs - 检测数据与坐标映射
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

use serde::{Deserialize, Serialize};

use crate::tile::ChipPlacement;

/// 轴对齐边界框，xyxy 像素坐标。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl BoundingBox {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    BoundingBox { x1, y1, x2, y2 }
  }

  pub fn area(&self) -> f32 {
    (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
  }

  /// 交并比。并集面积为零的退化框对返回 0。
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let inter_x1 = self.x1.max(other.x1);
    let inter_y1 = self.y1.max(other.y1);
    let inter_x2 = self.x2.min(other.x2);
    let inter_y2 = self.y2.min(other.y2);

    let inter = (inter_x2 - inter_x1).max(0.0) * (inter_y2 - inter_y1).max(0.0);
    let union = self.area() + other.area() - inter;

    if union > 0.0 { inter / union } else { 0.0 }
  }
}

/// 检测器对单个芯片的原始输出，坐标为芯片局部像素。
///
/// bbox 为可选: 部分检测器只给类别与置信度而不定位。
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
  pub label: String,
  pub confidence: f32,
  pub bbox: Option<BoundingBox>,
}

impl RawDetection {
  pub fn new(label: impl Into<String>, confidence: f32) -> Self {
    RawDetection {
      label: label.into(),
      confidence,
      bbox: None,
    }
  }

  pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
    self.bbox = Some(bbox);
    self
  }
}

/// 映射到原始影像坐标系后的检测，保留来源芯片编号。
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDetection {
  pub label: String,
  pub confidence: f32,
  pub bbox: Option<BoundingBox>,
  pub chip_index: usize,
}

/// 聚合后的最终检测结果。无框检测原样保留，bbox 为 None。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDetection {
  pub label: String,
  pub confidence: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bbox: Option<BoundingBox>,
}

/// 把芯片局部检测平移到原始影像坐标系。
///
/// 各坐标分量加上芯片原点后钳制到 [0, width] / [0, height]。
/// 无框检测不做钳制，原样透传。逐条独立，无跨检测状态。
pub fn to_global(
  detection: RawDetection,
  placement: &ChipPlacement,
  chip_index: usize,
  width: u32,
  height: u32,
) -> GlobalDetection {
  let bbox = detection.bbox.map(|b| BoundingBox {
    x1: (b.x1 + placement.x0 as f32).clamp(0.0, width as f32),
    y1: (b.y1 + placement.y0 as f32).clamp(0.0, height as f32),
    x2: (b.x2 + placement.x0 as f32).clamp(0.0, width as f32),
    y2: (b.y2 + placement.y0 as f32).clamp(0.0, height as f32),
  });

  GlobalDetection {
    label: detection.label,
    confidence: detection.confidence,
    bbox,
    chip_index,
  }
}
