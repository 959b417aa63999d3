// 该文件是 Yuntu （云图） 项目的一部分。
// src/nms.rs - 类别内非极大值抑制
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

use std::collections::HashMap;

use tracing::debug;

use crate::detect::{BoundingBox, FinalDetection, GlobalDetection};

struct Candidate {
  index: usize,
  bbox: BoundingBox,
  confidence: f32,
}

/// 类别内贪心非极大值抑制。
///
/// 每个类别独立: 候选按置信度降序排列（同分时面积大者优先，
/// 再同则保持输入顺序），依次选中最高者并压制与其 IoU 超过
/// iou_threshold 的其余候选。压制状态记录在独立的存活标记中，
/// 遍历过程不修改候选序列本身。
///
/// 无框检测不参与抑制，原样透传。输出合并所有类别，
/// 幸存者保持输入顺序，保证结果确定。iou_threshold 的
/// 合法区间 (0, 1) 由流水线配置校验。
pub fn class_nms(detections: Vec<GlobalDetection>, iou_threshold: f32) -> Vec<FinalDetection> {
  let mut kept = vec![false; detections.len()];

  {
    let mut by_label: HashMap<&str, Vec<Candidate>> = HashMap::new();

    for (index, detection) in detections.iter().enumerate() {
      match detection.bbox {
        Some(bbox) => by_label.entry(&detection.label).or_default().push(Candidate {
          index,
          bbox,
          confidence: detection.confidence,
        }),
        // 无框检测不受抑制
        None => kept[index] = true,
      }
    }

    for candidates in by_label.values_mut() {
      candidates.sort_by(|a, b| {
        b.confidence
          .total_cmp(&a.confidence)
          .then_with(|| b.bbox.area().total_cmp(&a.bbox.area()))
      });

      let mut alive = vec![true; candidates.len()];
      for i in 0..candidates.len() {
        if !alive[i] {
          continue;
        }
        kept[candidates[i].index] = true;
        for j in (i + 1)..candidates.len() {
          if alive[j] && candidates[i].bbox.iou(&candidates[j].bbox) > iou_threshold {
            alive[j] = false;
          }
        }
      }
    }
  }

  let total = detections.len();
  let survivors: Vec<FinalDetection> = detections
    .into_iter()
    .enumerate()
    .filter(|(index, _)| kept[*index])
    .map(|(_, d)| FinalDetection {
      label: d.label,
      confidence: d.confidence,
      bbox: d.bbox,
    })
    .collect();

  debug!("NMS: {} 条检测保留 {} 条", total, survivors.len());
  survivors
}
