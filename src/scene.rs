// 该文件是 Shanying （山影） 项目的一部分。
// src/scene.rs - 检测结果与视口的渲染协调
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

//! 批次替换、清除、视口尺寸变化和设置变化都会立即触发一次重绘。
//! 所有修改都经由 `&mut self`，重绘不会与自身并发。

use image::{RgbImage, RgbaImage};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  composite::MaskCompositor,
  detection::{ClassNames, DetectionBatch},
  draw::Painter,
  geometry::Size,
  overlay::{OverlayError, RenderOptions, check_detection},
  settings::{DisplaySettings, SettingsError},
  viewport::{ViewportError, ViewportHost},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
  #[error("叠加层渲染错误: {0}")]
  Overlay(#[from] OverlayError),
  #[error("设置错误: {0}")]
  Settings(#[from] SettingsError),
  #[error("视口错误: {0}")]
  Viewport(#[from] ViewportError),
}

pub struct Scene {
  host: ViewportHost,
  settings: DisplaySettings,
  class_names: ClassNames,
  batch: DetectionBatch,
}

impl Scene {
  pub fn new(class_names: ClassNames, settings: DisplaySettings) -> Result<Self, SceneError> {
    settings.validate()?;
    let mut host = ViewportHost::new();
    host.set_masks_visible(settings.show_masks);
    Ok(Self {
      host,
      settings,
      class_names,
      batch: DetectionBatch::empty(),
    })
  }

  pub fn host(&self) -> &ViewportHost {
    &self.host
  }

  pub fn settings(&self) -> &DisplaySettings {
    &self.settings
  }

  pub fn class_names(&self) -> &ClassNames {
    &self.class_names
  }

  pub fn batch(&self) -> &DetectionBatch {
    &self.batch
  }

  /// 整体替换检测批次。重绘失败时保留原批次与原画面。
  ///
  /// 批次中每个检测都要通过检查，与置信度过滤和视口是否已布局无关。
  pub fn replace_batch(&mut self, batch: DetectionBatch) -> Result<(), SceneError> {
    info!("替换检测批次: {} 个检测, {} 个掩码", batch.len(), batch.masks().len());
    for det in batch.detections() {
      check_detection(det, &self.class_names).inspect_err(|e| {
        warn!("拒绝检测批次: {}", e);
      })?;
    }
    redraw(&mut self.host, &batch, &self.settings, &self.class_names)?;
    self.batch = batch;
    Ok(())
  }

  pub fn clear(&mut self) -> Result<(), SceneError> {
    info!("清除检测结果");
    self.replace_batch(DetectionBatch::empty())
  }

  pub fn update_settings(&mut self, settings: DisplaySettings) -> Result<(), SceneError> {
    settings.validate()?;
    redraw(&mut self.host, &self.batch, &settings, &self.class_names)?;
    self.settings = settings;
    Ok(())
  }

  /// 容器尺寸变化：先同步调整叠加层，再重绘。
  /// 尺寸无效或重绘失败时保持原尺寸与原画面。
  pub fn resize(&mut self, bounds: Size) -> Result<(), SceneError> {
    let previous = self.host.bounds();
    if self.host.layout(bounds)?
      && let Err(e) = redraw(&mut self.host, &self.batch, &self.settings, &self.class_names)
    {
      self.host.restore_bounds(previous);
      return Err(e);
    }
    Ok(())
  }

  pub fn present(&self, base: &RgbImage, painter: &Painter) -> Result<RgbaImage, SceneError> {
    Ok(self.host.present(base, painter)?)
  }
}

fn redraw(
  host: &mut ViewportHost,
  batch: &DetectionBatch,
  settings: &DisplaySettings,
  class_names: &ClassNames,
) -> Result<(), SceneError> {
  if host.bounds().is_none() {
    warn!("视口尚未布局，跳过渲染");
    return Ok(());
  }

  let survivors = batch.surviving(settings.confidence_threshold);
  let mask_image = MaskCompositor::new(settings.mask_threshold).composite(survivors.masks);

  host.overlay_mut().render(
    survivors.detections,
    class_names,
    RenderOptions {
      show_boxes: settings.show_boxes,
      show_labels: settings.show_labels,
    },
  )?;
  host.set_mask_image(mask_image);
  host.set_masks_visible(settings.show_masks);
  Ok(())
}
