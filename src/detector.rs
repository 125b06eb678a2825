// 该文件是 Binggui （冰柜） 项目的一部分。
// src/detector.rs - 食材检测器
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

use std::{
  path::PathBuf,
  sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  error::{DetectError, DetectionFailed},
  frame::{ImageBuffer, InputTensor},
  labels::LabelTable,
  model::{ModelOutputs, ModelRuntime, RawOutput},
  postprocess::{DEFAULT_CONFIDENCE_THRESHOLD, DetectionResult, postprocess},
  preprocess::preprocess,
};

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_INPUT_NAME: &str = "images";
pub const DEFAULT_LABELS_FILE: &str = "classes.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  /// 模型要求的正方形输入边长
  pub input_size: u32,
  pub confidence_threshold: f32,
  /// 模型输入绑定名
  pub input_name: String,
  /// 读取的输出名，为空时取第一个输出
  pub output_name: Option<String>,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      input_size: DEFAULT_INPUT_SIZE,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      input_name: DEFAULT_INPUT_NAME.to_string(),
      output_name: None,
    }
  }
}

impl DetectorConfig {
  pub fn validate(&self) -> Result<(), DetectError> {
    if self.input_size == 0 {
      return Err(DetectError::InvalidConfig("模型输入尺寸不能为 0".to_string()));
    }
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(DetectError::InvalidConfig(format!(
        "置信度阈值必须在 0.0 - 1.0 之间, 实际为 {}",
        self.confidence_threshold
      )));
    }
    if self.input_name.is_empty() {
      return Err(DetectError::InvalidConfig("模型输入名不能为空".to_string()));
    }
    Ok(())
  }
}

/// 食材检测器
///
/// 运行时句柄放在互斥锁内，`detect` 可以从多个线程调用，推理按顺序执行。
/// 预处理与后处理在锁外完成。某次推理 panic 后锁会被毒化，之后的调用继续使用同一个运行时。
pub struct Detector<R> {
  runtime: Mutex<R>,
  labels: LabelTable,
  config: DetectorConfig,
}

impl<R: ModelRuntime> Detector<R> {
  pub fn new(runtime: R, labels: LabelTable, config: DetectorConfig) -> Result<Self, DetectError> {
    config.validate()?;
    debug!(
      "检测器配置: 输入 {}x{}, 阈值 {}, 标签数量 {}",
      config.input_size,
      config.input_size,
      config.confidence_threshold,
      labels.len()
    );
    Ok(Self {
      runtime: Mutex::new(runtime),
      labels,
      config,
    })
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn detect(&self, image: &ImageBuffer) -> Result<DetectionResult, DetectionFailed> {
    let tensor = preprocess(image, self.config.input_size)?;
    let outputs = self.infer(&tensor)?;
    let output = self.select_output(&outputs)?;
    let result = postprocess(output, &self.labels, self.config.confidence_threshold)?;
    debug!("检测结果: {:?}", result.labels());
    Ok(result)
  }

  fn infer(&self, tensor: &InputTensor) -> Result<ModelOutputs, DetectError> {
    let mut runtime = self.runtime.lock().unwrap_or_else(|poisoned| {
      warn!("上一次推理异常退出, 继续使用运行时");
      PoisonError::into_inner(poisoned)
    });
    runtime
      .run(&self.config.input_name, tensor)
      .map_err(DetectError::inference)
  }

  fn select_output<'a>(&self, outputs: &'a ModelOutputs) -> Result<&'a RawOutput, DetectError> {
    match &self.config.output_name {
      Some(name) => outputs.get(name).ok_or_else(|| {
        DetectError::MissingOutput(format!(
          "{} (可用输出: {:?})",
          name,
          outputs.names().collect::<Vec<_>>()
        ))
      }),
      None => outputs
        .first()
        .ok_or_else(|| DetectError::MissingOutput("模型没有输出".to_string())),
    }
  }
}

#[derive(Error, Debug)]
pub enum DetectorBuilderError {
  #[error("模型路径必须使用 {expected} 方案, 实际为 {actual}")]
  SchemeMismatch { expected: &'static str, actual: String },
  #[error("参数 {key} 无效: {value}")]
  InvalidParameter { key: String, value: String },
  #[error("检测器构建失败: {0}")]
  DetectError(#[from] DetectError),
}

/// 从 URL 构建检测器
///
/// `onnx:///models/best.onnx?labels=/models/classes.txt&threshold=0.45&size=640&input=images&output=output0`
///
/// 未给出 `labels` 时使用模型同目录下的 `classes.txt`。
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
  model_path: PathBuf,
  labels_path: PathBuf,
  config: DetectorConfig,
}

impl FromUrlWithScheme for DetectorBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for DetectorBuilder {
  type Error = DetectorBuilderError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorBuilderError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let model_path = PathBuf::from(url.path());
    let mut labels_path = model_path.with_file_name(DEFAULT_LABELS_FILE);
    let mut config = DetectorConfig::default();

    for (key, value) in url.query_pairs() {
      let invalid = || DetectorBuilderError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
      };
      match key.as_ref() {
        "labels" => labels_path = PathBuf::from(value.as_ref()),
        "threshold" => config.confidence_threshold = value.parse().map_err(|_| invalid())?,
        "size" => config.input_size = value.parse().map_err(|_| invalid())?,
        "input" => config.input_name = value.to_string(),
        "output" => config.output_name = Some(value.to_string()),
        _ => return Err(invalid()),
      }
    }

    config.validate()?;

    Ok(DetectorBuilder {
      model_path,
      labels_path,
      config,
    })
  }
}

impl DetectorBuilder {
  pub fn new(model_path: impl Into<PathBuf>, labels_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      labels_path: labels_path.into(),
      config: DetectorConfig::default(),
    }
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.config.confidence_threshold = threshold;
    self
  }

  pub fn input_size(mut self, size: u32) -> Self {
    self.config.input_size = size;
    self
  }

  pub fn output_name(mut self, name: impl Into<String>) -> Self {
    self.config.output_name = Some(name.into());
    self
  }

  pub fn model_path(&self) -> &std::path::Path {
    &self.model_path
  }

  pub fn labels_path(&self) -> &std::path::Path {
    &self.labels_path
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  /// 加载标签表并与给定运行时组装为检测器
  pub fn build_with<R: ModelRuntime>(self, runtime: R) -> Result<Detector<R>, DetectError> {
    let labels = LabelTable::from_path(&self.labels_path)
      .map_err(|e| DetectError::model_load(&self.labels_path, e))?;
    let detector = Detector::new(runtime, labels, self.config)?;
    info!("检测器就绪, 共 {} 个类别", detector.labels().len());
    Ok(detector)
  }

  #[cfg(feature = "onnx")]
  pub fn build(self) -> Result<Detector<crate::model::OnnxRuntime>, DetectError> {
    let runtime = crate::model::OnnxRuntime::from_file(&self.model_path)
      .map_err(|e| DetectError::model_load(&self.model_path, e))?;
    self.build_with(runtime)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::pack_argb;

  #[derive(Debug, Error)]
  #[error("stub failure")]
  struct StubError;

  struct StubRuntime {
    outputs: ModelOutputs,
    seen_input: Option<(String, [usize; 4])>,
    fail: bool,
    panic_once: bool,
  }

  impl StubRuntime {
    fn new(outputs: ModelOutputs) -> Self {
      Self {
        outputs,
        seen_input: None,
        fail: false,
        panic_once: false,
      }
    }
  }

  impl ModelRuntime for StubRuntime {
    type Error = StubError;

    fn run(&mut self, input_name: &str, input: &InputTensor) -> Result<ModelOutputs, Self::Error> {
      if self.fail {
        return Err(StubError);
      }
      if self.panic_once {
        self.panic_once = false;
        panic!("runtime crashed");
      }
      self.seen_input = Some((input_name.to_string(), input.shape()));
      Ok(self.outputs.clone())
    }
  }

  fn labels() -> LabelTable {
    LabelTable::new(["milk", "egg"]).unwrap()
  }

  fn config() -> DetectorConfig {
    DetectorConfig {
      input_size: 8,
      ..DetectorConfig::default()
    }
  }

  /// 单个候选框，类别分数为 scores
  fn single(scores: [f32; 2]) -> RawOutput {
    RawOutput::new(6, 1, vec![0.0, 0.0, 0.0, 0.0, scores[0], scores[1]]).unwrap()
  }

  #[test]
  fn feeds_named_input_and_reads_first_output() {
    let runtime = StubRuntime::new(
      ModelOutputs::new()
        .with("output0", single([0.9, 0.1]))
        .with("output1", single([0.1, 0.9])),
    );
    let detector = Detector::new(runtime, labels(), config()).unwrap();

    let result = detector.detect(&ImageBuffer::filled(3, 3, pack_argb(1, 2, 3, 255))).unwrap();
    assert_eq!(result.labels(), &["milk".to_string()]);

    let runtime = detector.runtime.lock().unwrap();
    assert_eq!(
      runtime.seen_input,
      Some(("images".to_string(), [1, 3, 8, 8]))
    );
  }

  #[test]
  fn reads_configured_output() {
    let runtime = StubRuntime::new(
      ModelOutputs::new()
        .with("output0", single([0.9, 0.1]))
        .with("output1", single([0.1, 0.9])),
    );
    let config = DetectorConfig {
      output_name: Some("output1".to_string()),
      ..config()
    };
    let detector = Detector::new(runtime, labels(), config).unwrap();

    let result = detector.detect(&ImageBuffer::filled(2, 2, 0)).unwrap();
    assert_eq!(result.labels(), &["egg".to_string()]);
  }

  #[test]
  fn missing_output_is_reported() {
    let runtime = StubRuntime::new(ModelOutputs::new().with("output0", single([0.9, 0.1])));
    let config = DetectorConfig {
      output_name: Some("boxes".to_string()),
      ..config()
    };
    let detector = Detector::new(runtime, labels(), config).unwrap();

    let err = detector.detect(&ImageBuffer::filled(2, 2, 0)).unwrap_err();
    assert!(matches!(err.cause(), DetectError::MissingOutput(_)));
  }

  #[test]
  fn runtime_failure_is_wrapped() {
    let mut runtime = StubRuntime::new(ModelOutputs::new());
    runtime.fail = true;
    let detector = Detector::new(runtime, labels(), config()).unwrap();

    let err = detector.detect(&ImageBuffer::filled(2, 2, 0)).unwrap_err();
    match err.cause() {
      DetectError::InferenceFailure(source) => assert_eq!(source.to_string(), "stub failure"),
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn detector_recovers_after_runtime_panic() {
    let mut runtime = StubRuntime::new(ModelOutputs::new().with("output0", single([0.9, 0.1])));
    runtime.panic_once = true;
    let detector = Detector::new(runtime, labels(), config()).unwrap();
    let image = ImageBuffer::filled(2, 2, 0);

    let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| detector.detect(&image)));
    assert!(crashed.is_err());
    assert!(detector.runtime.is_poisoned());

    let result = detector.detect(&image).unwrap();
    assert_eq!(result.labels(), &["milk".to_string()]);
  }

  #[test]
  fn invalid_image_is_wrapped() {
    let runtime = StubRuntime::new(ModelOutputs::new());
    let detector = Detector::new(runtime, labels(), config()).unwrap();

    let image = ImageBuffer {
      width: 2,
      height: 2,
      pixels: vec![0; 3],
    };
    let err = detector.detect(&image).unwrap_err();
    assert!(matches!(err.cause(), DetectError::InvalidImage { .. }));
  }

  #[test]
  fn label_mismatch_is_wrapped() {
    let runtime = StubRuntime::new(ModelOutputs::new().with("output0", single([0.9, 0.1])));
    let labels = LabelTable::new(["milk", "egg", "cheese"]).unwrap();
    let detector = Detector::new(runtime, labels, config()).unwrap();

    let err = detector.detect(&ImageBuffer::filled(2, 2, 0)).unwrap_err();
    assert!(matches!(
      err.into_cause(),
      DetectError::LabelMismatch {
        expected: 7,
        actual: 6
      }
    ));
  }

  #[test]
  fn config_is_validated() {
    let config = DetectorConfig {
      confidence_threshold: 1.5,
      ..DetectorConfig::default()
    };
    assert!(Detector::new(StubRuntime::new(ModelOutputs::new()), labels(), config).is_err());
  }

  #[test]
  fn builder_from_url_with_defaults() {
    let url = Url::parse("onnx:///models/best.onnx").unwrap();
    let builder = DetectorBuilder::from_url(&url).unwrap();

    assert_eq!(builder.model_path(), std::path::Path::new("/models/best.onnx"));
    assert_eq!(
      builder.labels_path(),
      std::path::Path::new("/models/classes.txt")
    );
    assert_eq!(builder.config(), &DetectorConfig::default());
  }

  #[test]
  fn builder_from_url_with_parameters() {
    let url = Url::parse(
      "onnx:///m/best.onnx?labels=/l/food.txt&threshold=0.3&size=320&input=x&output=y",
    )
    .unwrap();
    let builder = DetectorBuilder::from_url(&url).unwrap();

    assert_eq!(builder.labels_path(), std::path::Path::new("/l/food.txt"));
    assert_eq!(builder.config().confidence_threshold, 0.3);
    assert_eq!(builder.config().input_size, 320);
    assert_eq!(builder.config().input_name, "x");
    assert_eq!(builder.config().output_name.as_deref(), Some("y"));
  }

  #[test]
  fn builder_rejects_bad_urls() {
    let url = Url::parse("rknn:///m/best.rknn").unwrap();
    assert!(matches!(
      DetectorBuilder::from_url(&url),
      Err(DetectorBuilderError::SchemeMismatch { .. })
    ));

    let url = Url::parse("onnx:///m/best.onnx?threshold=high").unwrap();
    assert!(matches!(
      DetectorBuilder::from_url(&url),
      Err(DetectorBuilderError::InvalidParameter { .. })
    ));

    let url = Url::parse("onnx:///m/best.onnx?size=0").unwrap();
    assert!(matches!(
      DetectorBuilder::from_url(&url),
      Err(DetectorBuilderError::DetectError(DetectError::InvalidConfig(_)))
    ));
  }

  #[test]
  fn builder_loads_labels_next_to_model() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("classes.txt"), "milk\negg\n").unwrap();

    let detector = DetectorBuilder::new(dir.path().join("best.onnx"), dir.path().join("classes.txt"))
      .input_size(8)
      .build_with(StubRuntime::new(ModelOutputs::new().with("o", single([0.1, 0.8]))))
      .unwrap();

    assert_eq!(detector.labels().len(), 2);
    let result = detector.detect(&ImageBuffer::filled(4, 4, 0)).unwrap();
    assert_eq!(result.to_ingredients_text(), "egg");
  }
}
