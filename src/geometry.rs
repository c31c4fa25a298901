// 该文件是 Shanying （山影） 项目的一部分。
// src/geometry.rs - 视口几何基础类型
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

use std::str::FromStr;

use thiserror::Error;

/// 宽高尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
  pub width: f32,
  pub height: f32,
}

#[derive(Error, Debug, PartialEq)]
pub enum SizeParseError {
  #[error("尺寸格式应为 WxH: {0}")]
  Format(String),
  #[error("尺寸数值无效: {0}")]
  Number(String),
}

impl Size {
  pub const fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }

  pub fn from_dimensions((width, height): (u32, u32)) -> Self {
    Self::new(width as f32, height as f32)
  }

  /// 宽或高不是正的有限数
  pub fn is_degenerate(&self) -> bool {
    !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
  }

  /// 按比例缩放到 `container` 内能容纳的最大尺寸（scaled-to-fit）
  pub fn fit_within(&self, container: Size) -> Size {
    if self.is_degenerate() || container.is_degenerate() {
      return Size::default();
    }
    let scale = (container.width / self.width).min(container.height / self.height);
    Size::new(self.width * scale, self.height * scale)
  }

  /// 像素网格尺寸，四舍五入，至少为 1
  pub fn to_pixels(&self) -> (u32, u32) {
    (
      self.width.round().max(1.0) as u32,
      self.height.round().max(1.0) as u32,
    )
  }
}

impl FromStr for Size {
  type Err = SizeParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (w, h) = s
      .split_once(['x', 'X'])
      .ok_or_else(|| SizeParseError::Format(s.to_string()))?;
    let width = w
      .trim()
      .parse::<f32>()
      .map_err(|_| SizeParseError::Number(w.to_string()))?;
    let height = h
      .trim()
      .parse::<f32>()
      .map_err(|_| SizeParseError::Number(h.to_string()))?;
    Ok(Size::new(width, height))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 轴对齐矩形。宽高允许为负，`standardized` 之后总是非负。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Rect {
  pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn origin(&self) -> Point {
    Point::new(self.x, self.y)
  }

  pub fn size(&self) -> Size {
    Size::new(self.width, self.height)
  }

  pub fn min_x(&self) -> f32 {
    self.x.min(self.x + self.width)
  }

  pub fn min_y(&self) -> f32 {
    self.y.min(self.y + self.height)
  }

  pub fn max_x(&self) -> f32 {
    self.x.max(self.x + self.width)
  }

  pub fn max_y(&self) -> f32 {
    self.y.max(self.y + self.height)
  }

  /// 等价的非负宽高矩形
  pub fn standardized(&self) -> Rect {
    Rect::new(
      self.min_x(),
      self.min_y(),
      self.width.abs(),
      self.height.abs(),
    )
  }

  fn corners(&self) -> [Point; 4] {
    [
      Point::new(self.x, self.y),
      Point::new(self.x + self.width, self.y),
      Point::new(self.x, self.y + self.height),
      Point::new(self.x + self.width, self.y + self.height),
    ]
  }

  /// 变换四个角点，返回包围它们的最小标准矩形
  pub fn applying(&self, affine: &Affine) -> Rect {
    let corners = self.corners().map(|p| affine.apply(p));
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in corners {
      min_x = min_x.min(p.x);
      min_y = min_y.min(p.y);
      max_x = max_x.max(p.x);
      max_y = max_y.max(p.y);
    }
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
  }
}

/// 二维仿射变换 `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
  pub a: f32,
  pub b: f32,
  pub c: f32,
  pub d: f32,
  pub tx: f32,
  pub ty: f32,
}

impl Default for Affine {
  fn default() -> Self {
    Self::IDENTITY
  }
}

impl Affine {
  pub const IDENTITY: Affine = Affine::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

  pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
    Self {
      a,
      b,
      c,
      d,
      tx,
      ty,
    }
  }

  pub const fn scale(sx: f32, sy: f32) -> Self {
    Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
  }

  /// 关于高度为 `height` 的画面做上下翻转：`y' = height - y`
  pub const fn flip_vertical(height: f32) -> Self {
    Self::new(1.0, 0.0, 0.0, -1.0, 0.0, height)
  }

  pub fn apply(&self, p: Point) -> Point {
    Point::new(
      self.a * p.x + self.c * p.y + self.tx,
      self.b * p.x + self.d * p.y + self.ty,
    )
  }

  /// 先应用 `self`，再应用 `next`
  pub fn then(&self, next: &Affine) -> Affine {
    Affine::new(
      next.a * self.a + next.c * self.b,
      next.b * self.a + next.d * self.b,
      next.a * self.c + next.c * self.d,
      next.b * self.c + next.d * self.d,
      next.a * self.tx + next.c * self.ty + next.tx,
      next.b * self.tx + next.d * self.ty + next.ty,
    )
  }
}
