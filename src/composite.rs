// 该文件是 Shanying （山影） 项目的一部分。
// src/composite.rs - 多实例掩码合成
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

//! 所有掩码都放到一张公共画布上：画布宽高取各掩码宽高的最大值，
//! 每个掩码锚定在左上角原点，按列表顺序以 source-over 叠加，后者覆盖前者。

use image::{RgbaImage, imageops};
use tracing::debug;

use crate::mask::MaskRecord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskCompositor {
  threshold: f32,
}

impl MaskCompositor {
  pub fn new(threshold: f32) -> Self {
    Self { threshold }
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  /// 没有掩码时返回 `None`
  pub fn composite<'a>(&self, masks: impl IntoIterator<Item = &'a MaskRecord>) -> Option<RgbaImage> {
    let masks: Vec<&MaskRecord> = masks.into_iter().collect();
    let (width, height) = masks.iter().fold((0, 0), |(w, h), mask| {
      let (mw, mh) = mask.dimensions();
      (w.max(mw), h.max(mh))
    });

    if masks.is_empty() {
      return None;
    }

    debug!("合成 {} 个掩码，画布 {}x{}", masks.len(), width, height);
    let mut canvas = RgbaImage::new(width, height);
    for mask in masks {
      imageops::overlay(&mut canvas, &mask.to_image(self.threshold), 0, 0);
    }
    Some(canvas)
  }
}
