// 该文件是 Shanying （山影） 项目的一部分。
// src/detection.rs - 检测结果、检测批次与类别名表
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

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{geometry::Size, mask::MaskRecord, palette::class_color, settings::InferenceParams};

const COCO_LABELS: &str = include_str!("../labels/coco.txt");

/// 模型输入空间中的检测框 [x1, y1, x2, y2]，原点在左下角
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl BoundingBox {
  pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }
}

impl From<[f32; 4]> for BoundingBox {
  fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
    Self::new(x1, y1, x2, y2)
  }
}

impl From<BoundingBox> for [f32; 4] {
  fn from(b: BoundingBox) -> Self {
    [b.x1, b.y1, b.x2, b.y2]
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
  pub class_index: usize,
  pub score: f32,
  pub bbox: BoundingBox,
  /// 模型固定输入分辨率
  pub input_size: Size,
}

impl DetectionRecord {
  pub fn new(class_index: usize, score: f32, bbox: BoundingBox, input_size: Size) -> Self {
    Self {
      class_index,
      score,
      bbox,
      input_size,
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
  #[error("同一批次的模型输入尺寸不一致: 期望 {expected:?}, 第 {index} 个为 {found:?}")]
  InputSizeMismatch {
    index: usize,
    expected: Size,
    found: Size,
  },
  #[error("掩码数量 {masks} 与检测数量 {detections} 不一致")]
  MaskCountMismatch { detections: usize, masks: usize },
}

/// 一次推理产生的全部检测与掩码，整体替换，不做增量修改。
///
/// `masks` 要么为空（仅检测模型），要么与 `detections` 按下标一一对应。
#[derive(Debug, Clone, Default)]
pub struct DetectionBatch {
  detections: Box<[DetectionRecord]>,
  masks: Box<[MaskRecord]>,
}

impl DetectionBatch {
  pub fn new(
    detections: Vec<DetectionRecord>,
    masks: Vec<MaskRecord>,
  ) -> Result<Self, BatchError> {
    if !masks.is_empty() && masks.len() != detections.len() {
      return Err(BatchError::MaskCountMismatch {
        detections: detections.len(),
        masks: masks.len(),
      });
    }

    if let Some(first) = detections.first() {
      let expected = first.input_size;
      if let Some((index, det)) = detections
        .iter()
        .enumerate()
        .find(|(_, d)| d.input_size != expected)
      {
        return Err(BatchError::InputSizeMismatch {
          index,
          expected,
          found: det.input_size,
        });
      }
    }

    // 未指定颜色的掩码使用所属检测的类别颜色，与检测框一致
    let masks = masks
      .into_iter()
      .zip(&detections)
      .map(|(mask, det)| match mask.explicit_tint() {
        Some(_) => mask,
        None => mask.with_tint(class_color(det.class_index)),
      })
      .collect::<Vec<_>>();

    Ok(Self {
      detections: detections.into_boxed_slice(),
      masks: masks.into_boxed_slice(),
    })
  }

  pub fn empty() -> Self {
    Self::default()
  }

  pub fn detections(&self) -> &[DetectionRecord] {
    &self.detections
  }

  pub fn masks(&self) -> &[MaskRecord] {
    &self.masks
  }

  pub fn input_size(&self) -> Option<Size> {
    self.detections.first().map(|d| d.input_size)
  }

  pub fn len(&self) -> usize {
    self.detections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  /// 置信度不低于阈值的检测及其对应掩码，保持原始顺序
  pub fn surviving(&self, confidence_threshold: f32) -> Survivors<'_> {
    let mut survivors = Survivors::default();
    for (index, det) in self.detections.iter().enumerate() {
      if det.score < confidence_threshold {
        continue;
      }
      survivors.detections.push(det);
      if let Some(mask) = self.masks.get(index) {
        survivors.masks.push(mask);
      }
    }
    survivors
  }
}

#[derive(Debug, Default)]
pub struct Survivors<'a> {
  pub detections: Vec<&'a DetectionRecord>,
  pub masks: Vec<&'a MaskRecord>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassNameError {
  #[error("类别下标越界: {index} (类别数 {len})")]
  IndexOutOfRange { index: usize, len: usize },
}

/// 类别下标 -> 类别名
#[derive(Debug, Clone, PartialEq)]
pub struct ClassNames {
  names: Box<[String]>,
}

impl ClassNames {
  pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  /// 每行一个类别名，忽略空行
  pub fn from_lines(text: &str) -> Self {
    Self::new(
      text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty()),
    )
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
    Ok(Self::from_lines(&std::fs::read_to_string(path)?))
  }

  /// 内置 COCO 80 类
  pub fn coco() -> Self {
    Self::from_lines(COCO_LABELS)
  }

  pub fn name(&self, index: usize) -> Result<&str, ClassNameError> {
    self
      .names
      .get(index)
      .map(String::as_str)
      .ok_or(ClassNameError::IndexOutOfRange {
        index,
        len: self.names.len(),
      })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

/// 外部推理方：对一张图像产生一个完整批次
pub trait DetectionSource {
  type Error;

  fn detect(&self, image: &RgbImage, params: &InferenceParams) -> Result<DetectionBatch, Self::Error>;
}
