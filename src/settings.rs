// 该文件是 Shanying （山影） 项目的一部分。
// src/settings.rs - 阈值与显示开关
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

use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
  #[error("{name} 阈值超出 [0, 1] 范围: {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
}

/// 交给外部推理方的阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub mask_threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySettings {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub mask_threshold: f32,
  pub show_boxes: bool,
  pub show_masks: bool,
  pub show_labels: bool,
}

impl Default for DisplaySettings {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      mask_threshold: DEFAULT_MASK_THRESHOLD,
      show_boxes: true,
      show_masks: true,
      show_labels: true,
    }
  }
}

impl DisplaySettings {
  pub fn validate(&self) -> Result<(), SettingsError> {
    for (name, value) in [
      ("confidence", self.confidence_threshold),
      ("iou", self.iou_threshold),
      ("mask", self.mask_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(SettingsError::ThresholdOutOfRange { name, value });
      }
    }
    Ok(())
  }

  pub fn inference_params(&self) -> InferenceParams {
    InferenceParams {
      confidence_threshold: self.confidence_threshold,
      iou_threshold: self.iou_threshold,
      mask_threshold: self.mask_threshold,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_are_valid() {
    let settings = DisplaySettings::default();
    assert!(settings.validate().is_ok());
    assert!(settings.show_boxes && settings.show_masks && settings.show_labels);
  }

  #[test]
  fn test_rejects_out_of_range() {
    let settings = DisplaySettings {
      iou_threshold: 1.5,
      ..Default::default()
    };
    assert_eq!(
      settings.validate(),
      Err(SettingsError::ThresholdOutOfRange {
        name: "iou",
        value: 1.5
      })
    );

    let settings = DisplaySettings {
      mask_threshold: f32::NAN,
      ..Default::default()
    };
    assert!(settings.validate().is_err());
  }
}
