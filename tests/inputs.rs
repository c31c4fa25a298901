use std::cell::RefCell;
use std::convert::Infallible;

use image::{Rgb, RgbImage, RgbaImage};
use shanying::{
  FromUrl,
  detection::ClassNames,
  geometry::Size,
  input::{BatchFileInput, ImageFileInput, InputError},
  output::Present,
  scene::{Scene, SceneError},
  settings::DisplaySettings,
  task::{OneShotTask, ResizeSweepTask, Task},
  viewport::ViewportError,
};
use url::Url;

const BATCH: &str = r#"{
  "input_size": [64, 64],
  "detections": [
    { "class_index": 2, "score": 0.8, "box": [8, 8, 40, 56] },
    { "class_index": 0, "score": 0.1, "box": [0, 0, 4, 4] }
  ],
  "masks": [
    { "width": 16, "height": 16, "data": [] },
    { "width": 1, "height": 1, "data": [1.0] }
  ]
}"#;

#[derive(Default)]
struct Collect {
  frames: RefCell<Vec<RgbaImage>>,
}

impl Present for Collect {
  type Error = Infallible;

  fn present_frame(&self, frame: &RgbaImage) -> Result<(), Self::Error> {
    self.frames.borrow_mut().push(frame.clone());
    Ok(())
  }
}

fn write_fixtures(dir: &tempfile::TempDir) -> (Url, Url) {
  let image_path = dir.path().join("base.png");
  RgbImage::from_pixel(32, 16, Rgb([40, 40, 40]))
    .save(&image_path)
    .unwrap();

  let batch_path = dir.path().join("batch.json");
  let first_mask: Vec<String> = (0..256).map(|i| if i < 128 { "0.9" } else { "0.0" }.to_string()).collect();
  let text = BATCH.replacen("\"data\": []", &format!("\"data\": [{}]", first_mask.join(",")), 1);
  std::fs::write(&batch_path, text).unwrap();

  (
    Url::parse(&format!("image://{}", image_path.display())).unwrap(),
    Url::parse(&format!("batch://{}", batch_path.display())).unwrap(),
  )
}

#[test]
fn loads_inputs_from_urls() {
  let dir = tempfile::tempdir().unwrap();
  let (image_url, batch_url) = write_fixtures(&dir);

  let input = ImageFileInput::from_url(&image_url).unwrap();
  assert_eq!(input.size(), Size::new(32.0, 16.0));

  let source = BatchFileInput::from_url(&batch_url).unwrap();
  assert_eq!(source.batch().len(), 2);
  assert_eq!(source.batch().masks()[0].dimensions(), (16, 16));
}

#[test]
fn wrong_scheme_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let (image_url, _) = write_fixtures(&dir);
  let as_batch = Url::parse(&image_url.as_str().replacen("image://", "batch://", 1)).unwrap();
  assert!(matches!(
    ImageFileInput::from_url(&as_batch),
    Err(InputError::SchemeMismatch { expected: "image", .. })
  ));
}

#[test]
fn missing_file_is_io_error() {
  let url = Url::parse("batch:///definitely/not/here.json").unwrap();
  assert!(matches!(
    BatchFileInput::from_url(&url),
    Err(InputError::Io(_))
  ));
}

#[test]
fn one_shot_task_presents_a_frame() {
  let dir = tempfile::tempdir().unwrap();
  let (image_url, batch_url) = write_fixtures(&dir);
  let image = ImageFileInput::from_url(&image_url).unwrap().into_image();
  let source = BatchFileInput::from_url(&batch_url).unwrap();
  let output = Collect::default();

  let mut scene = Scene::new(ClassNames::coco(), DisplaySettings::default()).unwrap();
  OneShotTask::new(Size::new(128.0, 64.0))
    .run_task(&mut scene, &image, &source, &output)
    .unwrap();

  let frames = output.frames.borrow();
  assert_eq!(frames.len(), 1);
  assert_eq!(frames[0].dimensions(), (128, 64));
  assert_eq!(scene.host().overlay().len(), 1);
  assert_eq!(scene.host().overlay().visuals()[0].label.text, "car 0.80");
}

#[test]
fn resize_sweep_presents_each_viewport() {
  let dir = tempfile::tempdir().unwrap();
  let (image_url, batch_url) = write_fixtures(&dir);
  let image = ImageFileInput::from_url(&image_url).unwrap().into_image();
  let source = BatchFileInput::from_url(&batch_url).unwrap();
  let output = Collect::default();

  let mut scene = Scene::new(ClassNames::coco(), DisplaySettings::default()).unwrap();
  ResizeSweepTask::new(vec![Size::new(64.0, 32.0), Size::new(96.0, 48.0), Size::new(32.0, 16.0)])
    .run_task(&mut scene, &image, &source, &output)
    .unwrap();

  let sizes: Vec<(u32, u32)> = output.frames.borrow().iter().map(|f| f.dimensions()).collect();
  assert_eq!(sizes, vec![(64, 32), (96, 48), (32, 16)]);
  assert_eq!(scene.host().overlay().frame(), Size::new(32.0, 16.0));
}

#[test]
fn oversized_viewport_fails_before_presenting() {
  let dir = tempfile::tempdir().unwrap();
  let (image_url, batch_url) = write_fixtures(&dir);
  let image = ImageFileInput::from_url(&image_url).unwrap().into_image();
  let source = BatchFileInput::from_url(&batch_url).unwrap();
  let output = Collect::default();

  let mut scene = Scene::new(ClassNames::coco(), DisplaySettings::default()).unwrap();
  let err = OneShotTask::new(Size::new(1.0e9, 1.0e9))
    .run_task(&mut scene, &image, &source, &output)
    .unwrap_err();
  assert!(matches!(
    err.downcast_ref::<SceneError>(),
    Some(SceneError::Viewport(ViewportError::TooLarge(_)))
  ));
  assert!(output.frames.borrow().is_empty());
  assert_eq!(scene.host().bounds(), None);
}
