// 该文件是 Shanying （山影） 项目的一部分。
// src/viewport.rs - 视口宿主
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

use image::{
  DynamicImage, RgbImage, RgbaImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::debug;

use crate::{draw::Painter, geometry::Size, overlay::OverlayLayer};

/// 合成掩码叠加到底图上的不透明度
pub const MASK_OVERLAY_OPACITY: f32 = 0.7;

/// 视口单边像素上限
pub const MAX_VIEWPORT_SIDE: f32 = 16384.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewportError {
  #[error("视口尚未完成布局")]
  NotLaidOut,
  #[error("视口尺寸无效: {0:?}")]
  Degenerate(Size),
  #[error("视口尺寸超出上限 {MAX_VIEWPORT_SIDE}: {0:?}")]
  TooLarge(Size),
}

/// 屏幕上显示图像的区域。
///
/// 叠加层的尺寸始终与宿主边界一致，只在 [`ViewportHost::layout`] 中同步修改。
#[derive(Debug)]
pub struct ViewportHost {
  bounds: Option<Size>,
  overlay: OverlayLayer,
  mask_image: Option<RgbaImage>,
  masks_visible: bool,
}

impl Default for ViewportHost {
  fn default() -> Self {
    Self {
      bounds: None,
      overlay: OverlayLayer::new(),
      mask_image: None,
      masks_visible: true,
    }
  }
}

impl ViewportHost {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn bounds(&self) -> Option<Size> {
    self.bounds
  }

  /// 布局一次。尺寸有变化时返回 `true`，调用方随后需要重新渲染。
  /// 尺寸无效时不做任何修改。
  pub fn layout(&mut self, bounds: Size) -> Result<bool, ViewportError> {
    if bounds.is_degenerate() {
      return Err(ViewportError::Degenerate(bounds));
    }
    if bounds.width > MAX_VIEWPORT_SIDE || bounds.height > MAX_VIEWPORT_SIDE {
      return Err(ViewportError::TooLarge(bounds));
    }
    if self.bounds == Some(bounds) {
      return Ok(false);
    }
    debug!("视口尺寸变化: {:?} -> {:?}", self.bounds, bounds);
    self.set_bounds(Some(bounds));
    Ok(true)
  }

  /// 重绘失败时恢复之前的边界
  pub(crate) fn restore_bounds(&mut self, bounds: Option<Size>) {
    self.set_bounds(bounds);
  }

  fn set_bounds(&mut self, bounds: Option<Size>) {
    self.bounds = bounds;
    self.overlay.set_frame(bounds.unwrap_or_default());
  }

  pub fn overlay(&self) -> &OverlayLayer {
    &self.overlay
  }

  pub fn overlay_mut(&mut self) -> &mut OverlayLayer {
    &mut self.overlay
  }

  pub fn mask_image(&self) -> Option<&RgbaImage> {
    self.mask_image.as_ref()
  }

  pub fn set_mask_image(&mut self, mask_image: Option<RgbaImage>) {
    self.mask_image = mask_image;
  }

  pub fn set_masks_visible(&mut self, visible: bool) {
    self.masks_visible = visible;
  }

  pub fn mask_opacity(&self) -> f32 {
    if self.masks_visible {
      MASK_OVERLAY_OPACITY
    } else {
      0.0
    }
  }

  /// 底图缩放到视口，叠加合成掩码与检测图元，得到一帧画面
  pub fn present(&self, base: &RgbImage, painter: &Painter) -> Result<RgbaImage, ViewportError> {
    let bounds = self.bounds.ok_or(ViewportError::NotLaidOut)?;
    let (width, height) = bounds.to_pixels();

    let resized = imageops::resize(base, width, height, FilterType::Triangle);
    let mut frame = DynamicImage::ImageRgb8(resized).into_rgba8();

    let opacity = self.mask_opacity();
    if let Some(mask) = &self.mask_image
      && opacity > 0.0
    {
      // 掩码不做插值
      let mask = imageops::resize(mask, width, height, FilterType::Nearest);
      blend_with_opacity(&mut frame, &mask, opacity);
    }

    painter.paint(&mut frame, self.overlay.visuals());
    Ok(frame)
  }
}

fn blend_with_opacity(frame: &mut RgbaImage, mask: &RgbaImage, opacity: f32) {
  for (dst, src) in frame.pixels_mut().zip(mask.pixels()) {
    let alpha = src.0[3] as f32 / 255.0 * opacity;
    if alpha <= 0.0 {
      continue;
    }
    for c in 0..3 {
      let blended = dst.0[c] as f32 * (1.0 - alpha) + src.0[c] as f32 * alpha;
      dst.0[c] = blended.round().clamp(0.0, 255.0) as u8;
    }
  }
}
