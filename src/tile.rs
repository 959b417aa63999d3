// 该文件是 Yuntu （云图） 项目的一部分。
// src/tile.rs - 等尺寸切片
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

#[derive(Error, Debug)]
pub enum TileError {
  #[error("切片阶段: max_side_size 必须为正数")]
  InvalidMaxSideSize,
  #[error("切片阶段: 不支持 downsample_factor 参数, 收到 {0}")]
  DownsampleUnsupported(u32),
}

/// 芯片在原始影像像素坐标系中的覆盖范围，右/下边界已裁剪到原始尺寸。
///
/// 芯片本身始终保持完整的 tile_w × tile_h 形状，
/// 超出原始边界的部分为零填充。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipPlacement {
  pub x0: u32,
  pub y0: u32,
  pub x1: u32,
  pub y1: u32,
}

/// 切片参数。
#[derive(Debug, Clone, Copy)]
pub struct TileOptions {
  /// 芯片边长上限
  pub max_side_size: u32,
  /// 降采样倍率。该参数尚无确定语义，显式传入会被拒绝而不是静默忽略。
  pub downsample_factor: Option<u32>,
}

impl Default for TileOptions {
  fn default() -> Self {
    TileOptions {
      max_side_size: 512,
      downsample_factor: None,
    }
  }
}

/// 切片结果: 等尺寸芯片及其位置，按行优先（先行后列）顺序编号。
#[derive(Debug, Clone)]
pub struct TileGrid {
  pub chips: Vec<RgbImage>,
  pub placements: Vec<ChipPlacement>,
  pub nx: u32,
  pub ny: u32,
  pub tile_w: u32,
  pub tile_h: u32,
  pub padded_w: u32,
  pub padded_h: u32,
  pub width: u32,
  pub height: u32,
}

impl TileGrid {
  pub fn chip_count(&self) -> usize {
    self.chips.len()
  }
}

/// 把归一化影像切为等尺寸、互不重叠的芯片网格。
///
/// 网格维数按 max_side_size 向上取整得到，影像先零填充到
/// tile_w·nx × tile_h·ny（只在右侧与下侧填充），再按行优先顺序切出。
/// 行优先编号即为 chip_index，下游按该编号回溯芯片位置。
pub fn tile(image: &RgbImage, options: &TileOptions) -> Result<TileGrid, TileError> {
  if let Some(factor) = options.downsample_factor {
    return Err(TileError::DownsampleUnsupported(factor));
  }
  if options.max_side_size == 0 {
    return Err(TileError::InvalidMaxSideSize);
  }

  let (width, height) = image.dimensions();
  let max_side = options.max_side_size;

  let nx = if width <= max_side {
    1
  } else {
    width.div_ceil(max_side)
  };
  let ny = if height <= max_side {
    1
  } else {
    height.div_ceil(max_side)
  };

  let tile_w = width.div_ceil(nx).min(max_side);
  let tile_h = height.div_ceil(ny).min(max_side);

  let padded_w = tile_w * nx;
  let padded_h = tile_h * ny;

  debug!(
    "切片网格 {}x{}, 每片 {}x{}, 原始 {}x{}, 填充后 {}x{}",
    nx, ny, tile_w, tile_h, width, height, padded_w, padded_h
  );

  let mut padded = RgbImage::new(padded_w, padded_h);
  imageops::replace(&mut padded, image, 0, 0);

  let mut chips = Vec::with_capacity((nx * ny) as usize);
  let mut placements = Vec::with_capacity((nx * ny) as usize);

  for iy in 0..ny {
    for ix in 0..nx {
      let x0 = ix * tile_w;
      let y0 = iy * tile_h;
      chips.push(imageops::crop_imm(&padded, x0, y0, tile_w, tile_h).to_image());
      placements.push(ChipPlacement {
        x0,
        y0,
        x1: (x0 + tile_w).min(width),
        y1: (y0 + tile_h).min(height),
      });
    }
  }

  Ok(TileGrid {
    chips,
    placements,
    nx,
    ny,
    tile_w,
    tile_h,
    padded_w,
    padded_h,
    width,
    height,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn options(max_side_size: u32) -> TileOptions {
    TileOptions {
      max_side_size,
      downsample_factor: None,
    }
  }

  #[test]
  fn grid_1024x600_at_512() {
    let image = RgbImage::new(1024, 600);
    let grid = tile(&image, &options(512)).expect("tile");
    assert_eq!((grid.nx, grid.ny), (2, 2));
    assert_eq!((grid.tile_w, grid.tile_h), (512, 300));
    assert_eq!((grid.padded_w, grid.padded_h), (1024, 600));
    assert_eq!(grid.chip_count(), 4);
  }

  #[test]
  fn grid_covers_whole_image() {
    for (w, h, max_side) in [(1000, 700, 512), (513, 1, 512), (512, 512, 512), (5, 3, 2)] {
      let image = RgbImage::new(w, h);
      let grid = tile(&image, &options(max_side)).expect("tile");
      assert!(grid.nx >= 1 && grid.ny >= 1);
      assert!(grid.tile_w <= max_side && grid.tile_h <= max_side);
      assert!(grid.nx * grid.tile_w >= w);
      assert!(grid.ny * grid.tile_h >= h);
    }
  }

  #[test]
  fn chips_share_one_shape() {
    let image = RgbImage::new(5, 3);
    let grid = tile(&image, &options(2)).expect("tile");
    assert_eq!((grid.nx, grid.ny), (3, 2));
    for chip in &grid.chips {
      assert_eq!(chip.dimensions(), (grid.tile_w, grid.tile_h));
    }
  }

  #[test]
  fn chip_order_is_row_major() {
    let image = RgbImage::new(5, 3);
    let grid = tile(&image, &options(2)).expect("tile");
    // iy 外层、ix 内层: 第二个芯片与第一个同一行
    assert_eq!(grid.placements[0], ChipPlacement { x0: 0, y0: 0, x1: 2, y1: 2 });
    assert_eq!(grid.placements[1], ChipPlacement { x0: 2, y0: 0, x1: 4, y1: 2 });
    assert_eq!(grid.placements[2], ChipPlacement { x0: 4, y0: 0, x1: 5, y1: 2 });
    assert_eq!(grid.placements[3], ChipPlacement { x0: 0, y0: 2, x1: 2, y1: 3 });
  }

  #[test]
  fn placements_clip_to_original_bounds() {
    let image = RgbImage::new(1000, 700);
    let grid = tile(&image, &options(512)).expect("tile");
    let last = grid.placements.last().expect("non-empty grid");
    assert_eq!((last.x1, last.y1), (1000, 700));
    for p in &grid.placements {
      assert!(p.x1 <= 1000 && p.y1 <= 700);
      assert!(p.x1 - p.x0 <= grid.tile_w && p.y1 - p.y0 <= grid.tile_h);
    }
  }

  #[test]
  fn padding_region_is_zero() {
    let mut image = RgbImage::from_pixel(3, 3, Rgb([200, 200, 200]));
    image.put_pixel(2, 2, Rgb([10, 20, 30]));
    let grid = tile(&image, &options(2)).expect("tile");
    // 右下角芯片覆盖 (2..4, 2..4)，只有左上角像素来自原图
    let corner = &grid.chips[3];
    assert_eq!(corner.get_pixel(0, 0).0, [10, 20, 30]);
    assert_eq!(corner.get_pixel(1, 0).0, [0, 0, 0]);
    assert_eq!(corner.get_pixel(0, 1).0, [0, 0, 0]);
    assert_eq!(corner.get_pixel(1, 1).0, [0, 0, 0]);
  }

  #[test]
  fn zero_max_side_is_rejected() {
    let image = RgbImage::new(4, 4);
    assert!(matches!(
      tile(&image, &options(0)),
      Err(TileError::InvalidMaxSideSize)
    ));
  }

  #[test]
  fn downsample_factor_is_rejected() {
    let image = RgbImage::new(4, 4);
    let opts = TileOptions {
      max_side_size: 2,
      downsample_factor: Some(2),
    };
    assert!(matches!(
      tile(&image, &opts),
      Err(TileError::DownsampleUnsupported(2))
    ));
  }
}
