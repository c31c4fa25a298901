// 该文件是 Shanying （山影） 项目的一部分。
// src/task.rs - 渲染任务
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

use image::RgbImage;
use tracing::info;

use crate::{
  detection::DetectionSource, draw::Painter, geometry::Size, output::Present, scene::Scene,
};

pub trait Task<S, O>: Sized {
  type Error;
  fn run_task(self, scene: &mut Scene, image: &RgbImage, source: &S, output: &O)
  -> Result<(), Self::Error>;
}

/// 一次推理、一次布局、一帧画面
pub struct OneShotTask {
  viewport: Size,
  painter: Painter,
}

impl OneShotTask {
  pub fn new(viewport: Size) -> Self {
    Self {
      viewport,
      painter: Painter::default(),
    }
  }

  pub fn with_painter(mut self, painter: Painter) -> Self {
    self.painter = painter;
    self
  }
}

impl<
  SE: std::error::Error + Sync + Send + 'static,
  OE: std::error::Error + Sync + Send + 'static,
  S: DetectionSource<Error = SE>,
  O: Present<Error = OE>,
> Task<S, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, scene: &mut Scene, image: &RgbImage, source: &S, output: &O) -> Result<(), Self::Error> {
    info!("开始任务...");
    scene.resize(self.viewport)?;

    let now = std::time::Instant::now();
    let batch = source.detect(image, &scene.settings().inference_params())?;
    info!("获取检测批次，耗时: {:.2?}", now.elapsed());

    scene.replace_batch(batch)?;
    let frame = scene.present(image, &self.painter)?;
    output.present_frame(&frame)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 同一批次在多个视口尺寸下依次布局并输出，每次尺寸变化都重新渲染
pub struct ResizeSweepTask {
  viewports: Vec<Size>,
  painter: Painter,
}

impl ResizeSweepTask {
  pub fn new(viewports: Vec<Size>) -> Self {
    Self {
      viewports,
      painter: Painter::default(),
    }
  }

  pub fn with_painter(mut self, painter: Painter) -> Self {
    self.painter = painter;
    self
  }
}

impl<
  SE: std::error::Error + Sync + Send + 'static,
  OE: std::error::Error + Sync + Send + 'static,
  S: DetectionSource<Error = SE>,
  O: Present<Error = OE>,
> Task<S, O> for ResizeSweepTask
{
  type Error = anyhow::Error;

  fn run_task(self, scene: &mut Scene, image: &RgbImage, source: &S, output: &O) -> Result<(), Self::Error> {
    info!("开始任务, 共 {} 个视口尺寸...", self.viewports.len());
    let first = self
      .viewports
      .first()
      .copied()
      .ok_or_else(|| anyhow::anyhow!("没有视口尺寸"))?;
    scene.resize(first)?;

    let batch = source.detect(image, &scene.settings().inference_params())?;
    scene.replace_batch(batch)?;

    for (i, viewport) in self.viewports.iter().enumerate() {
      scene.resize(*viewport)?;
      let frame = scene.present(image, &self.painter)?;
      output.present_frame(&frame)?;
      info!(
        "({}) 视口 {}x{} 渲染完成, {} 个检测",
        i,
        viewport.width,
        viewport.height,
        scene.host().overlay().len()
      );
    }

    info!("任务完成，退出");
    Ok(())
  }
}
