// 该文件是 Yuntu （云图） 项目的一部分。
// src/raster.rs - 栅格影像与归一化
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

use image::{Rgb, RgbImage};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RasterError {
  #[error("归一化阶段: 不支持的波段数 {0}, 仅支持 1、3、4 波段")]
  UnsupportedBandCount(usize),
  #[error("归一化阶段: 样本数量不匹配, 期望 {expected}, 实际 {actual}")]
  SampleCountMismatch { expected: usize, actual: usize },
}

/// 波段存储顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandLayout {
  /// H × W × C，通道在最后
  ChannelLast,
  /// C × H × W，通道在最前（rasterio 风格）
  ChannelFirst,
}

/// 多波段栅格影像。
///
/// 样本统一为 f32，内部始终按 H × W × C（通道最后）存储；
/// 通道在前的输入在构造时转置。
#[derive(Debug, Clone)]
pub struct RasterImage {
  data: Box<[f32]>,
  height: usize,
  width: usize,
  bands: usize,
}

impl RasterImage {
  pub fn new(
    height: usize,
    width: usize,
    bands: usize,
    layout: BandLayout,
    data: Vec<f32>,
  ) -> Result<Self, RasterError> {
    let expected = height * width * bands;
    if data.len() != expected {
      return Err(RasterError::SampleCountMismatch {
        expected,
        actual: data.len(),
      });
    }

    let data = match layout {
      BandLayout::ChannelLast => data.into_boxed_slice(),
      BandLayout::ChannelFirst => {
        // C × H × W -> H × W × C
        let mut hwc = vec![0.0f32; expected];
        for b in 0..bands {
          for y in 0..height {
            for x in 0..width {
              hwc[(y * width + x) * bands + b] = data[b * height * width + y * width + x];
            }
          }
        }
        hwc.into_boxed_slice()
      }
    };

    Ok(RasterImage {
      data,
      height,
      width,
      bands,
    })
  }

  /// 按形状推断波段顺序后构造。
  ///
  /// 第三轴不是合法波段数而第一轴是时，按通道在前处理，
  /// 与 rasterio 风格加载器的启发式一致。
  pub fn with_inferred_layout(
    dim0: usize,
    dim1: usize,
    dim2: usize,
    data: Vec<f32>,
  ) -> Result<Self, RasterError> {
    if !matches!(dim2, 1 | 3 | 4) && matches!(dim0, 1 | 3 | 4) {
      debug!("推断为通道在前存储: {} x {} x {}", dim0, dim1, dim2);
      Self::new(dim1, dim2, dim0, BandLayout::ChannelFirst, data)
    } else {
      Self::new(dim0, dim1, dim2, BandLayout::ChannelLast, data)
    }
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn bands(&self) -> usize {
    self.bands
  }

  fn sample(&self, y: usize, x: usize, band: usize) -> f32 {
    self.data[(y * self.width + x) * self.bands + band]
  }

  /// 单个波段上有限样本的最小值与最大值，NaN 与无穷大不参与统计。
  fn band_range(&self, band: usize) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for chunk in self.data.chunks_exact(self.bands) {
      let v = chunk[band];
      if v.is_finite() {
        min = min.min(v);
        max = max.max(v);
      }
    }
    (min, max)
  }
}

/// 把任意波段栅格归一化为 8 位 RGB 影像。
///
/// 单波段: 全波段线性拉伸后复制为三个相同通道。
/// 三或四波段: 取前三个波段，各自按本波段的最小/最大值独立拉伸，
/// 第四（alpha 类）波段整体忽略。其余波段数为致命输入错误。
pub fn normalize(raster: &RasterImage) -> Result<RgbImage, RasterError> {
  let width = raster.width() as u32;
  let height = raster.height() as u32;

  let image = match raster.bands() {
    1 => {
      let (min, max) = raster.band_range(0);
      debug!("单波段拉伸范围: [{}, {}]", min, max);
      RgbImage::from_fn(width, height, |x, y| {
        let v = rescale(raster.sample(y as usize, x as usize, 0), min, max);
        Rgb([v, v, v])
      })
    }
    3 | 4 => {
      // 多波段卫星影像各波段动态范围不同，逐通道独立拉伸
      let ranges = [
        raster.band_range(0),
        raster.band_range(1),
        raster.band_range(2),
      ];
      debug!("逐通道拉伸范围: {:?}", ranges);
      RgbImage::from_fn(width, height, |x, y| {
        let mut pixel = [0u8; 3];
        for (c, &(min, max)) in ranges.iter().enumerate() {
          pixel[c] = rescale(raster.sample(y as usize, x as usize, c), min, max);
        }
        Rgb(pixel)
      })
    }
    n => return Err(RasterError::UnsupportedBandCount(n)),
  };

  Ok(image)
}

/// 线性拉伸到 [0, 255]。常量波段（max == min）整体归零，非有限样本归零。
fn rescale(value: f32, min: f32, max: f32) -> u8 {
  if !value.is_finite() || max <= min {
    return 0;
  }
  // f32 -> u8 的 as 转换自带饱和截断
  ((value - min) / (max - min) * 255.0).round() as u8
}
