// 该文件是 Shanying （山影） 项目的一部分。
// src/bin/overlay_preview.rs - 检测叠加预览
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

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use image::RgbaImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use shanying::{
  FromUrl, FromUrlWithScheme,
  detection::ClassNames,
  draw::Painter,
  geometry::Size,
  input::{BatchFileInput, ImageFileInput},
  output::Present,
  scene::Scene,
  settings::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, DEFAULT_MASK_THRESHOLD, DisplaySettings},
  task::{OneShotTask, ResizeSweepTask, Task},
  viewport::MAX_VIEWPORT_SIDE,
};

/// 没有指定视口时，底图按比例缩放进这个区域
const DEFAULT_VIEWPORT: Size = Size::new(640.0, 640.0);

/// Shanying 检测叠加预览参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 底图，例如 image:///data/bus.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 检测批次，例如 batch:///data/bus.json
  #[arg(long, value_name = "BATCH")]
  pub batch: Url,
  /// 输出图像，例如 image:///tmp/bus-overlay.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 视口尺寸 WxH，可重复指定以依次布局
  #[arg(long, value_name = "WxH")]
  pub viewport: Vec<Size>,
  /// 类别名文件，每行一个（默认 COCO 80 类）
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,
  /// 标签字体文件
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub iou: f32,
  /// 掩码阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_MASK_THRESHOLD, value_name = "THRESHOLD")]
  pub mask_threshold: f32,
  #[arg(long)]
  pub hide_boxes: bool,
  #[arg(long)]
  pub hide_labels: bool,
  #[arg(long)]
  pub hide_masks: bool,
}

impl Args {
  fn settings(&self) -> DisplaySettings {
    DisplaySettings {
      confidence_threshold: self.confidence,
      iou_threshold: self.iou,
      mask_threshold: self.mask_threshold,
      show_boxes: !self.hide_boxes,
      show_masks: !self.hide_masks,
      show_labels: !self.hide_labels,
    }
  }
}

#[derive(Error, Debug)]
enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把画面保存为图像文件；多视口时文件名追加 `-WxH`
struct SaveImageFileOutput {
  path: PathBuf,
  suffix_with_size: bool,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(Self {
      path: PathBuf::from(url.path()),
      suffix_with_size: false,
    })
  }
}

impl SaveImageFileOutput {
  fn frame_path(&self, frame: &RgbaImage) -> PathBuf {
    if !self.suffix_with_size {
      return self.path.clone();
    }
    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    let ext = self
      .path
      .extension()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "png".to_string());
    self
      .path
      .with_file_name(format!("{}-{}x{}.{}", stem, frame.width(), frame.height(), ext))
  }
}

impl Present for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn present_frame(&self, frame: &RgbaImage) -> Result<(), Self::Error> {
    let path = self.frame_path(frame);
    if let Some(parent) = Path::new(&path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    frame.save(&path)?;
    info!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("底图: {}", args.input);
  info!("检测批次: {}", args.batch);
  info!("输出路径: {}", args.output);

  let class_names = match &args.labels {
    Some(path) => ClassNames::load(path)
      .with_context(|| format!("无法读取类别名文件: {}", path.display()))?,
    None => ClassNames::coco(),
  };
  let painter = match &args.font {
    Some(path) => Painter::with_font_file(path)
      .with_context(|| format!("无法加载字体: {}", path.display()))?,
    None => Painter::default(),
  };

  let input = ImageFileInput::from_url(&args.input)?;
  let source = BatchFileInput::from_url(&args.batch)?;
  let mut output = SaveImageFileOutput::from_url(&args.output)?;

  let mut viewports = args.viewport.clone();
  if viewports.is_empty() {
    viewports.push(input.size().fit_within(DEFAULT_VIEWPORT));
  }
  if let Some(bad) = viewports.iter().find(|v| v.is_degenerate()) {
    warn!("视口尺寸无效: {:?}", bad);
    anyhow::bail!("视口尺寸必须为正: {:?}", bad);
  }
  if let Some(bad) = viewports
    .iter()
    .find(|v| v.width > MAX_VIEWPORT_SIDE || v.height > MAX_VIEWPORT_SIDE)
  {
    warn!("视口尺寸过大: {:?}", bad);
    anyhow::bail!("视口单边不能超过 {} 像素: {:?}", MAX_VIEWPORT_SIDE, bad);
  }

  let mut scene = Scene::new(class_names, args.settings())?;
  let image = input.into_image();

  if viewports.len() == 1 {
    OneShotTask::new(viewports[0])
      .with_painter(painter)
      .run_task(&mut scene, &image, &source, &output)?;
  } else {
    output.suffix_with_size = true;
    ResizeSweepTask::new(viewports)
      .with_painter(painter)
      .run_task(&mut scene, &image, &source, &output)?;
  }

  Ok(())
}
