// 该文件是 Qingfeng （清风） 项目的一部分。
// tests/pipeline.rs - 端到端流水线测试
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

use std::{cell::Cell, io::Write};

use approx::assert_relative_eq;
use image::{Rgb, RgbImage};
use thiserror::Error;
use url::Url;

use qingfeng::{
  FromUrl, PipelineError,
  decode::OutputTensor,
  detector::{Detector, DetectorError},
  frame::RgbNchwTensor,
  input::InputWrapper,
  label::Labels,
  letterbox::LetterboxConfig,
  model::{DetectItem, DetectResult, Inference, Model, ReplayModel},
  output::{OutputWrapper, Render},
  postprocess::PostprocessorConfig,
  task::{ContinuousTask, OneShotTask, Task},
};

#[derive(Error, Debug)]
#[error("推理失败: {0}")]
struct FakeError(String);

/// 在网络输入空间固定输出一个 (100, 50, 200, 150) 的框
struct FixedInference {
  expected_side: usize,
}

impl Inference for FixedInference {
  type Error = FakeError;

  fn run(&self, input: &RgbNchwTensor) -> Result<OutputTensor, Self::Error> {
    let side = self.expected_side;
    if input.shape() != [1, 3, side, side] {
      return Err(FakeError(format!("输入形状 {:?}", input.shape())));
    }
    let data = vec![
      150.0, 100.0, 100.0, 100.0, 1.0, 0.1, 0.9, //
      400.0, 400.0, 50.0, 50.0, 0.1, 0.5, 0.5,
    ];
    OutputTensor::new(data, vec![1, 2, 7]).map_err(|e| FakeError(e.to_string()))
  }
}

fn detector(side: usize) -> Detector<FixedInference> {
  Detector::new(
    FixedInference {
      expected_side: side,
    },
    LetterboxConfig::default(),
    PostprocessorConfig::builder().build().unwrap(),
  )
}

#[test]
fn box_is_unchanged_when_ratio_is_one() {
  let image = RgbImage::new(640, 480);
  let result = detector(640).detect(&image).unwrap();

  assert_eq!(result.len(), 1);
  let item = &result.items[0];
  assert_eq!(item.class_id, 1);
  assert_relative_eq!(item.score, 0.9);
  assert_eq!(item.bbox, [100.0, 50.0, 200.0, 150.0]);
}

#[test]
fn box_is_scaled_back_to_larger_image() {
  let image = RgbImage::new(1280, 720);
  let result = detector(640).detect(&image).unwrap();

  assert_eq!(result.len(), 1);
  assert_eq!(result.items[0].bbox, [200.0, 100.0, 400.0, 300.0]);
}

#[test]
fn degenerate_image_is_rejected() {
  let image = RgbImage::new(0, 10);
  assert!(matches!(
    detector(640).detect(&image),
    Err(DetectorError::Pipeline(PipelineError::InvalidInput(_)))
  ));
}

#[test]
fn inference_error_is_propagated() {
  let image = RgbImage::new(100, 100);
  assert!(matches!(
    detector(320).detect(&image),
    Err(DetectorError::Inference(_))
  ));
}

#[test]
fn oneshot_from_files_writes_records() {
  let dir = tempfile::tempdir().unwrap();

  let image_path = dir.path().join("input.png");
  RgbImage::from_pixel(1280, 720, Rgb([30, 60, 90]))
    .save(&image_path)
    .unwrap();

  let replay_path = dir.path().join("output.bin");
  let values: [f32; 7] = [150.0, 100.0, 100.0, 100.0, 1.0, 0.8, 0.1];
  let mut file = std::fs::File::create(&replay_path).unwrap();
  for v in values {
    file.write_all(&v.to_le_bytes()).unwrap();
  }
  drop(file);

  let output_path = dir.path().join("out").join("result.png");
  let input = InputWrapper::from_url(
    &Url::parse(&format!("image://{}", image_path.display())).unwrap(),
  )
  .unwrap();
  let model = ReplayModel::from_url(
    &Url::parse(&format!("replay://{}?shape=1,1,7", replay_path.display())).unwrap(),
  )
  .unwrap();
  let output = OutputWrapper::from_url(
    &Url::parse(&format!("image://{}?record", output_path.display())).unwrap(),
  )
  .unwrap()
  .with_labels(Labels::parse("cat\ndog\n"));

  let detector = Detector::new(
    model,
    LetterboxConfig::default(),
    PostprocessorConfig::builder().build().unwrap(),
  );
  let summary = OneShotTask.run_task(input, detector, output).unwrap();

  assert_eq!(summary.frames, 1);
  assert_eq!(summary.detections, 1);
  assert!(output_path.exists());
  let text = std::fs::read_to_string(output_path.with_extension("txt")).unwrap();
  assert_eq!(text, "cat, 0.8000, 200.0000, 100.0000, 400.0000, 300.0000");
}

/// 偶数帧失败的模型
struct FlakyModel;

impl Model for FlakyModel {
  type Input = u32;
  type Output = DetectResult;
  type Error = FakeError;

  fn infer(&self, input: &u32) -> Result<DetectResult, FakeError> {
    if input % 2 == 0 {
      return Err(FakeError(format!("帧 {}", input)));
    }
    Ok(
      vec![DetectItem {
        class_id: 0,
        score: 0.5,
        bbox: [0.0, 0.0, 1.0, 1.0],
      }]
      .into(),
    )
  }
}

#[derive(Default)]
struct CountingRender {
  rendered: Cell<usize>,
}

impl Render<u32, DetectResult> for &CountingRender {
  type Error = std::convert::Infallible;

  fn render_result(&self, _frame: &u32, _result: &DetectResult) -> Result<(), Self::Error> {
    self.rendered.set(self.rendered.get() + 1);
    Ok(())
  }
}

#[test]
fn continuous_task_skips_failed_frames() {
  let render = CountingRender::default();
  let summary = ContinuousTask::default()
    .run_task(1..=5u32, FlakyModel, &render)
    .unwrap();

  assert_eq!(summary.frames, 3);
  assert_eq!(summary.skipped, 2);
  assert_eq!(summary.detections, 3);
  assert!(summary.average_latency.is_some());
  assert_eq!(render.rendered.get(), 3);
}

#[test]
fn continuous_task_stops_at_frame_number() {
  let render = CountingRender::default();
  let summary = ContinuousTask::default()
    .with_frame_number(Some(3))
    .run_task(1..=100u32, FlakyModel, &render)
    .unwrap();

  assert_eq!(summary.frames + summary.skipped, 3);
  assert_eq!(render.rendered.get(), 2);
}
