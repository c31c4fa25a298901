// 该文件是 Shanying （山影） 项目的一部分。
// src/transform.rs - 模型空间到视口空间的坐标变换
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

//! 模型空间原点在左下角、y 轴向上；视口空间原点在左上角、y 轴向下。
//! 变换为非等比缩放后再做上下翻转，不保持宽高比，也不裁剪到视口范围内。

use thiserror::Error;

use crate::{
  detection::BoundingBox,
  geometry::{Affine, Rect, Size},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
  #[error("模型输入尺寸无效: {0:?}")]
  DegenerateInputSize(Size),
  #[error("视口尺寸无效: {0:?}")]
  DegenerateViewport(Size),
}

/// 由 (视口尺寸, 模型输入尺寸) 唯一确定的变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
  affine: Affine,
  viewport: Size,
}

impl CoordinateTransform {
  pub fn new(input_size: Size, viewport: Size) -> Result<Self, TransformError> {
    if input_size.is_degenerate() {
      return Err(TransformError::DegenerateInputSize(input_size));
    }
    if viewport.is_degenerate() {
      return Err(TransformError::DegenerateViewport(viewport));
    }

    let scale = Affine::scale(
      viewport.width / input_size.width,
      viewport.height / input_size.height,
    );
    let affine = scale.then(&Affine::flip_vertical(viewport.height));
    Ok(Self { affine, viewport })
  }

  pub fn affine(&self) -> &Affine {
    &self.affine
  }

  pub fn viewport(&self) -> Size {
    self.viewport
  }

  /// 模型空间检测框 -> 视口空间矩形
  pub fn apply(&self, bbox: &BoundingBox) -> Rect {
    // 模型空间中 y2 是上边沿，高度 y1 - y2 为负，applying 之后恢复为正
    Rect::new(bbox.x1, bbox.y2, bbox.x2 - bbox.x1, bbox.y1 - bbox.y2).applying(&self.affine)
  }
}

pub fn transform(
  bbox: &BoundingBox,
  input_size: Size,
  viewport: Size,
) -> Result<Rect, TransformError> {
  CoordinateTransform::new(input_size, viewport).map(|t| t.apply(bbox))
}
