// 该文件是 Shanying （山影） 项目的一部分。
// src/input.rs - 底图与检测批次输入
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

use image::{ImageReader, RgbImage};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::{BatchError, BoundingBox, DetectionBatch, DetectionRecord, DetectionSource},
  geometry::Size,
  mask::{MaskError, MaskRecord},
  settings::InferenceParams,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("检测批次解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("检测批次无效: {0}")]
  Batch(#[from] BatchError),
  #[error("第 {index} 个掩码无效: {source}")]
  Mask { index: usize, source: MaskError },
}

fn check_scheme<T: FromUrlWithScheme>(url: &Url) -> Result<(), InputError> {
  if url.scheme() != T::SCHEME {
    error!(
      "URI scheme mismatch: expected '{}', found '{}'",
      T::SCHEME,
      url.scheme()
    );
    return Err(InputError::SchemeMismatch {
      expected: T::SCHEME,
      found: url.scheme().to_string(),
    });
  }
  Ok(())
}

/// 待叠加检测结果的底图，`image:///path/to/file.jpg`
pub struct ImageFileInput {
  image: RgbImage,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;
    Self::open(url.path())
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, InputError> {
    let path = path.as_ref();
    info!("读取图像文件: {}", path.display());
    let image = ImageReader::open(path)?
      .with_guessed_format()?
      .decode()?
      .into_rgb8();
    debug!("图像尺寸: {}x{}", image.width(), image.height());
    Ok(Self { image })
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn size(&self) -> Size {
    Size::from_dimensions(self.image.dimensions())
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }
}

#[derive(Debug, Deserialize)]
struct BatchDocument {
  input_size: [f32; 2],
  #[serde(default)]
  detections: Vec<DetectionDocument>,
  #[serde(default)]
  masks: Vec<MaskDocument>,
}

#[derive(Debug, Deserialize)]
struct DetectionDocument {
  class_index: usize,
  score: f32,
  #[serde(rename = "box")]
  bbox: BoundingBox,
}

#[derive(Debug, Deserialize)]
struct MaskDocument {
  width: u32,
  height: u32,
  data: Vec<f32>,
}

impl TryFrom<BatchDocument> for DetectionBatch {
  type Error = InputError;

  fn try_from(doc: BatchDocument) -> Result<Self, Self::Error> {
    let input_size = Size::new(doc.input_size[0], doc.input_size[1]);
    let masks = doc
      .masks
      .into_iter()
      .enumerate()
      .map(|(index, mask)| {
        MaskRecord::from_raw(mask.width, mask.height, mask.data)
          .map_err(|source| InputError::Mask { index, source })
      })
      .collect::<Result<Vec<_>, InputError>>()?;
    let detections = doc
      .detections
      .into_iter()
      .map(|d| DetectionRecord::new(d.class_index, d.score, d.bbox, input_size))
      .collect();
    Ok(DetectionBatch::new(detections, masks)?)
  }
}

/// 事先记录好的一次推理结果，`batch:///path/to/result.json`。
/// 作为外部推理方重放，整批交付。
pub struct BatchFileInput {
  batch: DetectionBatch,
}

impl FromUrlWithScheme for BatchFileInput {
  const SCHEME: &'static str = "batch";
}

impl FromUrl for BatchFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;
    Self::open(url.path())
  }
}

impl BatchFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, InputError> {
    let path = path.as_ref();
    info!("读取检测批次: {}", path.display());
    Self::from_json(&std::fs::read_to_string(path)?)
  }

  pub fn from_json(text: &str) -> Result<Self, InputError> {
    let doc: BatchDocument = serde_json::from_str(text)?;
    let batch = DetectionBatch::try_from(doc)?;
    debug!("检测批次: {} 个检测, {} 个掩码", batch.len(), batch.masks().len());
    Ok(Self { batch })
  }

  pub fn batch(&self) -> &DetectionBatch {
    &self.batch
  }
}

impl DetectionSource for BatchFileInput {
  type Error = InputError;

  fn detect(&self, image: &RgbImage, params: &InferenceParams) -> Result<DetectionBatch, Self::Error> {
    debug!(
      "重放检测批次, 图像 {}x{}, 参数 {:?}",
      image.width(),
      image.height(),
      params
    );
    Ok(self.batch.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::palette::class_color;

  const SAMPLE: &str = r#"{
    "input_size": [640, 640],
    "detections": [
      { "class_index": 0, "score": 0.91, "box": [10, 20, 110, 220] },
      { "class_index": 16, "score": 0.42, "box": [300, 300, 400, 380] }
    ],
    "masks": [
      { "width": 2, "height": 2, "data": [0.9, 0.1, 0.8, 0.0] },
      { "width": 2, "height": 2, "data": [0.0, 0.7, 0.0, 0.6] }
    ]
  }"#;

  #[test]
  fn test_decode_batch() {
    let input = BatchFileInput::from_json(SAMPLE).unwrap();
    let batch = input.batch();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.input_size(), Some(Size::new(640.0, 640.0)));
    let det = &batch.detections()[1];
    assert_eq!(det.class_index, 16);
    assert_eq!(det.bbox, BoundingBox::new(300.0, 300.0, 400.0, 380.0));
    assert_eq!(batch.masks()[1].tint(), class_color(16));
  }

  #[test]
  fn test_negative_class_index_rejected() {
    let text = r#"{ "input_size": [10, 10],
      "detections": [{ "class_index": -1, "score": 0.9, "box": [0, 0, 1, 1] }] }"#;
    assert!(matches!(
      BatchFileInput::from_json(text),
      Err(InputError::Json(_))
    ));
  }

  #[test]
  fn test_bad_mask_reports_index() {
    let text = r#"{ "input_size": [10, 10],
      "detections": [{ "class_index": 0, "score": 0.9, "box": [0, 0, 1, 1] }],
      "masks": [{ "width": 3, "height": 3, "data": [1.0] }] }"#;
    assert!(matches!(
      BatchFileInput::from_json(text),
      Err(InputError::Mask { index: 0, .. })
    ));
  }

  #[test]
  fn test_unpaired_masks_rejected() {
    let text = r#"{ "input_size": [10, 10],
      "detections": [],
      "masks": [{ "width": 1, "height": 1, "data": [1.0] }] }"#;
    assert!(matches!(
      BatchFileInput::from_json(text),
      Err(InputError::Batch(BatchError::MaskCountMismatch { .. }))
    ));
  }

  #[test]
  fn test_scheme_mismatch() {
    let url = Url::parse("file:///tmp/a.json").unwrap();
    assert!(matches!(
      BatchFileInput::from_url(&url),
      Err(InputError::SchemeMismatch { expected: "batch", .. })
    ));
  }
}
