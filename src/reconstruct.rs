// 该文件是 Yuntu （云图） 项目的一部分。
// src/reconstruct.rs - 由芯片重建全幅影像
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

use image::{RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::tile::TileGrid;

#[derive(Error, Debug)]
pub enum AggregationError {
  #[error("聚合阶段: 芯片与位置数量不一致, {chips} 对 {placements}")]
  ChipPlacementMismatch { chips: usize, placements: usize },
}

/// 把芯片按各自原点写回填充画布，再裁剪到原始尺寸。
///
/// 芯片区域互不重叠，写入顺序无关紧要。仅用于下游标注，
/// 不携带任何检测语义。
pub fn reconstruct(grid: &TileGrid) -> Result<RgbImage, AggregationError> {
  if grid.chips.len() != grid.placements.len() {
    return Err(AggregationError::ChipPlacementMismatch {
      chips: grid.chips.len(),
      placements: grid.placements.len(),
    });
  }

  let mut canvas = RgbImage::new(grid.padded_w, grid.padded_h);
  for (chip, placement) in grid.chips.iter().zip(&grid.placements) {
    imageops::replace(&mut canvas, chip, placement.x0 as i64, placement.y0 as i64);
  }

  debug!(
    "重建画布 {}x{}, 裁剪到 {}x{}",
    grid.padded_w, grid.padded_h, grid.width, grid.height
  );
  Ok(imageops::crop_imm(&canvas, 0, 0, grid.width, grid.height).to_image())
}
