// 该文件是 Shanying （山影） 项目的一部分。
// src/overlay.rs - 检测叠加层
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

use image::Rgb;
use thiserror::Error;
use tracing::{debug, error};

use crate::{
  detection::{ClassNameError, ClassNames, DetectionRecord},
  geometry::{Point, Rect, Size},
  palette::class_color,
  transform::{CoordinateTransform, TransformError},
};

/// 检测框描边宽度（像素）
pub const OUTLINE_WIDTH: u32 = 2;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
  #[error("坐标变换失败: {0}")]
  Transform(#[from] TransformError),
  #[error("类别名查找失败: {0}")]
  ClassName(#[from] ClassNameError),
}

/// 不填充的矩形描边
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
  pub color: Rgb<u8>,
  pub line_width: u32,
}

/// 类别名与置信度文本，锚定在检测框左上角，底板使用类别颜色
#[derive(Debug, Clone, PartialEq)]
pub struct LabelText {
  pub text: String,
  pub anchor: Point,
  pub plate: Rgb<u8>,
}

/// 一个检测对应的一组图元
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionVisual {
  pub class_index: usize,
  pub frame: Rect,
  pub outline: Option<Outline>,
  pub label: LabelText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
  pub show_boxes: bool,
  pub show_labels: bool,
}

impl Default for RenderOptions {
  fn default() -> Self {
    Self {
      show_boxes: true,
      show_labels: true,
    }
  }
}

/// 叠加在底图之上的图元层。
///
/// 每次 `render` 都整体替换图元集合：新图元先在 [`Transaction`] 中暂存，
/// 全部成功后一次性提交；中途出错时已显示的图元保持不变。
#[derive(Debug, Default)]
pub struct OverlayLayer {
  frame: Size,
  visuals: Vec<DetectionVisual>,
  generation: u64,
}

impl OverlayLayer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn frame(&self) -> Size {
    self.frame
  }

  pub(crate) fn set_frame(&mut self, frame: Size) {
    self.frame = frame;
  }

  pub fn visuals(&self) -> &[DetectionVisual] {
    &self.visuals
  }

  pub fn len(&self) -> usize {
    self.visuals.len()
  }

  pub fn is_empty(&self) -> bool {
    self.visuals.is_empty()
  }

  /// 已提交的次数
  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn begin(&mut self) -> Transaction<'_> {
    Transaction {
      layer: self,
      staged: Vec::new(),
      committed: false,
    }
  }

  pub fn clear(&mut self) {
    self.begin().commit();
  }

  /// 清除已有图元，按输入顺序为每个检测绘制一组图元
  pub fn render<'a>(
    &mut self,
    detections: impl IntoIterator<Item = &'a DetectionRecord>,
    class_names: &ClassNames,
    options: RenderOptions,
  ) -> Result<usize, OverlayError> {
    let viewport = self.frame;
    let mut transaction = self.begin();

    for det in detections {
      let visual = build_visual(det, class_names, options, viewport).inspect_err(|e| {
        error!("渲染检测结果失败: {}", e);
      })?;
      transaction.push(visual);
    }

    let count = transaction.commit();
    debug!(
      "叠加层已更新: {} 个检测, 视口 {}x{}",
      count, viewport.width, viewport.height
    );
    Ok(count)
  }
}

/// 检查检测结果能否绘制：类别下标在类别表内，模型输入尺寸有效。
/// 与标签、描边开关以及置信度过滤无关。
pub fn check_detection(det: &DetectionRecord, class_names: &ClassNames) -> Result<(), OverlayError> {
  class_names.name(det.class_index)?;
  if det.input_size.is_degenerate() {
    return Err(TransformError::DegenerateInputSize(det.input_size).into());
  }
  Ok(())
}

fn build_visual(
  det: &DetectionRecord,
  class_names: &ClassNames,
  options: RenderOptions,
  viewport: Size,
) -> Result<DetectionVisual, OverlayError> {
  let transform = CoordinateTransform::new(det.input_size, viewport)?;
  let frame = transform.apply(&det.bbox);
  let color = class_color(det.class_index);

  let name = class_names.name(det.class_index)?;
  let text = if options.show_labels {
    format!("{} {:.2}", name, det.score)
  } else {
    format!("{:.2}", det.score)
  };

  Ok(DetectionVisual {
    class_index: det.class_index,
    frame,
    outline: options.show_boxes.then_some(Outline {
      color,
      line_width: OUTLINE_WIDTH,
    }),
    label: LabelText {
      text,
      anchor: frame.origin(),
      plate: color,
    },
  })
}

/// 一批图元修改。提交前对外不可见，未提交即丢弃。
pub struct Transaction<'a> {
  layer: &'a mut OverlayLayer,
  staged: Vec<DetectionVisual>,
  committed: bool,
}

impl Transaction<'_> {
  pub fn push(&mut self, visual: DetectionVisual) {
    self.staged.push(visual);
  }

  pub fn len(&self) -> usize {
    self.staged.len()
  }

  pub fn is_empty(&self) -> bool {
    self.staged.is_empty()
  }

  /// 用暂存的图元替换整个图元集合，返回图元数量
  pub fn commit(mut self) -> usize {
    self.layer.visuals = std::mem::take(&mut self.staged);
    self.layer.generation += 1;
    self.committed = true;
    self.layer.visuals.len()
  }
}

impl Drop for Transaction<'_> {
  fn drop(&mut self) {
    if !self.committed {
      debug!("丢弃未提交的 {} 个图元", self.staged.len());
    }
  }
}
