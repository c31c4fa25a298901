// 该文件是 Shanying （山影） 项目的一部分。
// src/mask.rs - 实例分割掩码
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

use image::{ImageBuffer, Luma, Rgb, Rgba, RgbaImage};
use thiserror::Error;

/// 每像素的实例归属概率
pub type ProbabilityMap = ImageBuffer<Luma<f32>, Vec<f32>>;

const DEFAULT_TINT: Rgb<u8> = Rgb([255, 0, 0]);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
  #[error("掩码数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("掩码尺寸为零: {width}x{height}")]
  Empty { width: u32, height: u32 },
}

/// 单个实例的掩码，分辨率为模型输入分辨率或其下采样
#[derive(Debug, Clone, PartialEq)]
pub struct MaskRecord {
  map: ProbabilityMap,
  tint: Option<Rgb<u8>>,
}

impl MaskRecord {
  pub fn new(map: ProbabilityMap) -> Result<Self, MaskError> {
    let (width, height) = map.dimensions();
    if width == 0 || height == 0 {
      return Err(MaskError::Empty { width, height });
    }
    Ok(Self { map, tint: None })
  }

  /// 行优先的概率数据
  pub fn from_raw(width: u32, height: u32, data: Vec<f32>) -> Result<Self, MaskError> {
    let expected = width as usize * height as usize;
    let actual = data.len();
    let map = ProbabilityMap::from_raw(width, height, data)
      .filter(|_| actual == expected)
      .ok_or(MaskError::LengthMismatch { expected, actual })?;
    Self::new(map)
  }

  pub fn with_tint(mut self, tint: Rgb<u8>) -> Self {
    self.tint = Some(tint);
    self
  }

  /// 未指定颜色时为 `None`，由所属批次按类别补齐
  pub fn explicit_tint(&self) -> Option<Rgb<u8>> {
    self.tint
  }

  pub fn tint(&self) -> Rgb<u8> {
    self.tint.unwrap_or(DEFAULT_TINT)
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.map.dimensions()
  }

  pub fn probabilities(&self) -> &ProbabilityMap {
    &self.map
  }

  /// 概率严格大于 `threshold` 的像素填充为不透明的实例颜色，其余全透明。
  /// 每次调用都重新计算。
  pub fn to_image(&self, threshold: f32) -> RgbaImage {
    let Rgb([r, g, b]) = self.tint();
    let (width, height) = self.map.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
      if self.map.get_pixel(x, y).0[0] > threshold {
        Rgba([r, g, b, 255])
      } else {
        Rgba([0, 0, 0, 0])
      }
    })
  }

  /// 归属像素数
  pub fn area(&self, threshold: f32) -> usize {
    self.map.pixels().filter(|p| p.0[0] > threshold).count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_raw_checks_length() {
    assert_eq!(
      MaskRecord::from_raw(2, 2, vec![0.0; 3]).unwrap_err(),
      MaskError::LengthMismatch {
        expected: 4,
        actual: 3
      }
    );
    assert_eq!(
      MaskRecord::from_raw(0, 4, vec![]).unwrap_err(),
      MaskError::Empty {
        width: 0,
        height: 4
      }
    );
  }

  #[test]
  fn test_to_image_thresholds_strictly() {
    let mask = MaskRecord::from_raw(3, 1, vec![0.2, 0.5, 0.9])
      .unwrap()
      .with_tint(Rgb([0, 128, 255]));
    let image = mask.to_image(0.5);
    assert_eq!(image.dimensions(), (3, 1));
    assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 0]));
    assert_eq!(image.get_pixel(2, 0), &Rgba([0, 128, 255, 255]));
    assert_eq!(mask.area(0.5), 1);
    assert_eq!(mask.area(0.1), 3);
  }

  #[test]
  fn test_to_image_is_repeatable() {
    let mask = MaskRecord::from_raw(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
    assert_eq!(mask.to_image(0.5), mask.to_image(0.5));
  }
}
