// 该文件是 Yuntu （云图） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod detect;
pub mod nms;
pub mod pipeline;
pub mod raster;
pub mod reconstruct;
pub mod tile;

pub use detect::{BoundingBox, FinalDetection, GlobalDetection, RawDetection};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, Processed};
pub use raster::{BandLayout, RasterImage};
pub use tile::{ChipPlacement, TileGrid, TileOptions};

/// 检测器接口。
///
/// 检测器由调用方构造后交由流水线持有，生命周期由调用方显式管理，
/// 不做任何进程级缓存。输入为一个 8 位 RGB 芯片与置信度阈值，
/// 输出为芯片局部像素坐标系下的检测列表。
pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn detect(
    &self,
    chip: &image::RgbImage,
    confidence_threshold: f32,
  ) -> Result<Vec<detect::RawDetection>, Self::Error>;
}
