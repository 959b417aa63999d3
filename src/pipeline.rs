// 该文件是 Yuntu （云图） 项目的一部分。
// src/pipeline.rs - 检测流水线编排
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

use std::fmt;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  Detector,
  detect::{self, FinalDetection, GlobalDetection},
  nms,
  raster::{self, RasterError, RasterImage},
  reconstruct::{self, AggregationError},
  tile::{self, TileError, TileGrid, TileOptions},
};

/// 流水线阶段，严格顺序执行，用于日志与错误定位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Normalize,
  Tile,
  Detect,
  Aggregate,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Normalize => write!(f, "归一化"),
      Stage::Tile => write!(f, "切片"),
      Stage::Detect => write!(f, "检测"),
      Stage::Aggregate => write!(f, "聚合"),
    }
  }
}

#[derive(Error, Debug)]
pub enum PipelineError<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  #[error("参数无效: {0}")]
  InvalidArgument(String),
  #[error(transparent)]
  Raster(#[from] RasterError),
  #[error(transparent)]
  Tile(#[from] TileError),
  #[error("检测阶段: 芯片 {chip_index} 推理失败")]
  Detector {
    chip_index: usize,
    #[source]
    source: E,
  },
  #[error(transparent)]
  Aggregation(#[from] AggregationError),
}

/// 流水线配置。
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
  /// 芯片边长上限
  pub max_side_size: u32,
  /// 传给检测器的置信度阈值
  pub confidence_threshold: f32,
  /// 类别内 NMS 的 IoU 阈值，合法区间 (0, 1)
  pub iou_threshold: f32,
  /// 透传给切片阶段的降采样倍率，语义未定，显式传入会被拒绝
  pub downsample_factor: Option<u32>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    PipelineConfig {
      max_side_size: 512,
      confidence_threshold: 0.0,
      iou_threshold: 0.5,
      downsample_factor: None,
    }
  }
}

impl PipelineConfig {
  fn validate<E>(&self) -> Result<(), PipelineError<E>>
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    if self.max_side_size == 0 {
      return Err(PipelineError::InvalidArgument(
        "max_side_size 必须为正数".to_string(),
      ));
    }
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(PipelineError::InvalidArgument(format!(
        "confidence_threshold 必须在 [0, 1] 内, 收到 {}",
        self.confidence_threshold
      )));
    }
    if !(self.iou_threshold > 0.0 && self.iou_threshold < 1.0) {
      return Err(PipelineError::InvalidArgument(format!(
        "iou_threshold 必须在 (0, 1) 内, 收到 {}",
        self.iou_threshold
      )));
    }
    Ok(())
  }
}

/// 完整处理结果: 最终检测与重建的全幅影像，供外部标注消费。
pub struct Processed {
  pub detections: Vec<FinalDetection>,
  pub image: RgbImage,
}

/// 检测流水线。
///
/// 阶段依次为 归一化 → 切片 → 逐芯片检测 → 坐标映射 → 类别 NMS，
/// 聚合是完整屏障: 必须收齐所有芯片的检测之后 NMS 才能运行，
/// 否则跨芯片重复无法去除。任何阶段失败即中止，不产生部分结果。
///
/// 检测器由调用方构造并移交流水线持有，作用域即流水线值本身，
/// 不存在进程级模型缓存。
pub struct Pipeline<D> {
  detector: D,
  config: PipelineConfig,
}

impl<D: Detector> Pipeline<D> {
  pub fn new(detector: D, config: PipelineConfig) -> Result<Self, PipelineError<D::Error>> {
    config.validate()?;
    Ok(Pipeline { detector, config })
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn detector(&self) -> &D {
    &self.detector
  }

  /// 归还检测器，显式结束流水线作用域。
  pub fn into_detector(self) -> D {
    self.detector
  }

  /// 运行完整流水线，返回去重后的最终检测列表。
  pub fn process(
    &self,
    raster: &RasterImage,
  ) -> Result<Vec<FinalDetection>, PipelineError<D::Error>> {
    let (detections, _) = self.run(raster)?;
    Ok(detections)
  }

  /// 同 process，并附带由芯片重建的全幅影像。
  pub fn process_full(&self, raster: &RasterImage) -> Result<Processed, PipelineError<D::Error>> {
    let (detections, grid) = self.run(raster)?;
    let image = reconstruct::reconstruct(&grid)?;
    Ok(Processed { detections, image })
  }

  fn run(
    &self,
    raster: &RasterImage,
  ) -> Result<(Vec<FinalDetection>, TileGrid), PipelineError<D::Error>> {
    debug!("进入{}阶段", Stage::Normalize);
    let image = raster::normalize(raster)?;
    let (width, height) = image.dimensions();

    debug!("进入{}阶段", Stage::Tile);
    let options = TileOptions {
      max_side_size: self.config.max_side_size,
      downsample_factor: self.config.downsample_factor,
    };
    let grid = tile::tile(&image, &options)?;
    info!(
      "影像 {}x{} 切为 {} 个 {}x{} 芯片",
      width,
      height,
      grid.chip_count(),
      grid.tile_w,
      grid.tile_h
    );

    if grid.chips.len() != grid.placements.len() {
      return Err(
        AggregationError::ChipPlacementMismatch {
          chips: grid.chips.len(),
          placements: grid.placements.len(),
        }
        .into(),
      );
    }

    debug!("进入{}阶段", Stage::Detect);
    let mut detections: Vec<GlobalDetection> = Vec::new();
    for (chip_index, (chip, placement)) in grid.chips.iter().zip(&grid.placements).enumerate() {
      let raw = self
        .detector
        .detect(chip, self.config.confidence_threshold)
        .map_err(|source| PipelineError::Detector { chip_index, source })?;
      debug!("芯片 {} 检出 {} 个目标", chip_index, raw.len());
      detections.extend(
        raw
          .into_iter()
          .map(|d| detect::to_global(d, placement, chip_index, width, height)),
      );
    }

    // 聚合屏障: 所有芯片的检测收齐之后才能做跨芯片去重
    debug!("进入{}阶段", Stage::Aggregate);
    let survivors = nms::class_nms(detections, self.config.iou_threshold);
    info!("聚合完成, 保留 {} 条检测", survivors.len());

    Ok((survivors, grid))
  }
}
