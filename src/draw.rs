// 该文件是 Shanying （山影） 项目的一部分。
// src/draw.rs - 叠加图元光栅化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, Rgba, RgbaImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect as PixelRect,
};
use thiserror::Error;

use crate::{
  geometry::Rect,
  overlay::{DetectionVisual, LabelText, Outline},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_PADDING: i32 = 2;
const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]); // 白色文本

#[derive(Error, Debug)]
pub enum PainterError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 把叠加层图元绘制到像素画布上
pub struct Painter {
  font: FontArc,
  font_size: f32,
  label_padding: i32,
}

impl Default for Painter {
  fn default() -> Self {
    let font_data = include_bytes!("../assets/DejaVuSans.ttf"); // default font
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");
    Self::with_font(font)
  }
}

impl Painter {
  pub fn with_font(font: FontArc) -> Self {
    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      label_padding: LABEL_PADDING,
    }
  }

  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, PainterError> {
    let data = std::fs::read(path)?;
    Ok(Self::with_font(FontArc::try_from_vec(data)?))
  }

  pub fn font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  /// 按列表顺序绘制，后面的覆盖前面的
  pub fn paint(&self, canvas: &mut RgbaImage, visuals: &[DetectionVisual]) {
    for visual in visuals {
      if let Some(outline) = &visual.outline {
        paint_outline(canvas, &visual.frame, outline);
      }
      self.paint_label(canvas, &visual.label);
    }
  }

  /// 标签底板：有空间时位于锚点上方，否则贴在锚点下方
  pub(crate) fn plate_rect(&self, label: &LabelText) -> PixelRect {
    let scale = PxScale::from(self.font_size);
    let (text_w, text_h) = text_size(scale, &self.font, &label.text);
    let plate_w = text_w + 2 * self.label_padding as u32;
    let plate_h = text_h + 2 * self.label_padding as u32;

    let x = to_pixel(label.anchor.x);
    let anchor_y = to_pixel(label.anchor.y);
    let y = if anchor_y - plate_h as i32 >= 0 {
      anchor_y - plate_h as i32
    } else {
      anchor_y
    };
    PixelRect::at(x, y).of_size(plate_w, plate_h)
  }

  fn paint_label(&self, canvas: &mut RgbaImage, label: &LabelText) {
    let plate = self.plate_rect(label);
    draw_filled_rect_mut(canvas, plate, opaque(label.plate));
    draw_text_mut(
      canvas,
      LABEL_TEXT_COLOR,
      plate.left() + self.label_padding,
      plate.top() + self.label_padding,
      PxScale::from(self.font_size),
      &self.font,
      &label.text,
    );
  }
}

// 画布外的坐标收拢到画布附近，可见结果不变
const OFFSCREEN_LIMIT: f32 = 1.0e6;

fn to_pixel(v: f32) -> i32 {
  v.round().clamp(-OFFSCREEN_LIMIT, OFFSCREEN_LIMIT) as i32
}

fn opaque(Rgb([r, g, b]): Rgb<u8>) -> Rgba<u8> {
  Rgba([r, g, b, 255])
}

fn paint_outline(canvas: &mut RgbaImage, frame: &Rect, outline: &Outline) {
  let (w, h) = (canvas.width() as f32, canvas.height() as f32);
  let margin = outline.line_width as f32 + 1.0;

  let x_min = frame.min_x().floor().clamp(-margin, w + margin) as i32;
  let y_min = frame.min_y().floor().clamp(-margin, h + margin) as i32;
  let x_max = frame.max_x().ceil().clamp(-margin, w + margin) as i32;
  let y_max = frame.max_y().ceil().clamp(-margin, h + margin) as i32;

  // 向内加粗
  for t in 0..outline.line_width as i32 {
    let width = x_max - x_min - 2 * t;
    let height = y_max - y_min - 2 * t;
    if width <= 0 || height <= 0 {
      break;
    }
    let rect = PixelRect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
    draw_hollow_rect_mut(canvas, rect, opaque(outline.color));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Point;

  fn visual(frame: Rect, outline: bool) -> DetectionVisual {
    DetectionVisual {
      class_index: 0,
      frame,
      outline: outline.then_some(Outline {
        color: Rgb([0, 255, 0]),
        line_width: 2,
      }),
      label: LabelText {
        text: "cat 0.90".into(),
        anchor: frame.origin(),
        plate: Rgb([0, 0, 255]),
      },
    }
  }

  #[test]
  fn test_outline_is_two_pixels_and_hollow() {
    let painter = Painter::default();
    let mut canvas = RgbaImage::new(100, 100);
    painter.paint(&mut canvas, &[visual(Rect::new(10.0, 60.0, 30.0, 30.0), true)]);

    let green = Rgba([0, 255, 0, 255]);
    assert_eq!(canvas.get_pixel(39, 89), &green);
    assert_eq!(canvas.get_pixel(38, 88), &green);
    assert_eq!(canvas.get_pixel(10, 75), &green);
    assert_eq!(canvas.get_pixel(25, 75), &Rgba([0, 0, 0, 0]));
    assert_eq!(canvas.get_pixel(37, 87), &Rgba([0, 0, 0, 0]));
  }

  #[test]
  fn test_label_plate_sits_above_box() {
    let painter = Painter::default();
    let v = visual(Rect::new(10.0, 60.0, 30.0, 30.0), false);
    let plate = painter.plate_rect(&v.label);
    assert_eq!(plate.left(), 10);
    assert_eq!(plate.bottom() + 1, 60);

    let mut canvas = RgbaImage::new(100, 100);
    painter.paint(&mut canvas, &[v]);
    assert_eq!(
      canvas.get_pixel(plate.left() as u32, plate.top() as u32),
      &Rgba([0, 0, 255, 255])
    );
    // 未开启描边
    assert_eq!(canvas.get_pixel(39, 89), &Rgba([0, 0, 0, 0]));
  }

  #[test]
  fn test_label_moves_inside_near_top_edge() {
    let painter = Painter::default();
    let label = LabelText {
      text: "0.50".into(),
      anchor: Point::new(5.0, 1.0),
      plate: Rgb([1, 2, 3]),
    };
    assert_eq!(painter.plate_rect(&label).top(), 1);
  }

  #[test]
  fn test_off_screen_visual_does_not_panic() {
    let painter = Painter::default();
    let mut canvas = RgbaImage::new(32, 32);
    painter.paint(
      &mut canvas,
      &[
        visual(Rect::new(-1.0e9, -1.0e9, 10.0, 10.0), true),
        visual(Rect::new(20.0, 20.0, 1.0e9, 1.0e9), true),
        visual(Rect::new(-50.0, -50.0, 200.0, 200.0), true),
      ],
    );
    assert_eq!(canvas.dimensions(), (32, 32));
  }
}
