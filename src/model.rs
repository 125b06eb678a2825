// 该文件是 Binggui （冰柜） 项目的一部分。
// src/model.rs - 模型运行时边界
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

use crate::{error::DetectError, frame::InputTensor};

/// 每个候选框前面的几何属性数量 (cx, cy, w, h)
///
/// 标签解码不读取这些值，类别分数从该偏移之后开始。
pub const GEOMETRY_PROPERTIES: usize = 4;

/// 推理运行时：输入一个命名张量，输出若干命名张量
///
/// `run` 需要 `&mut self`，同一个句柄不能并发推理。
pub trait ModelRuntime {
  type Error: std::error::Error + Send + Sync + 'static;

  fn run(&mut self, input_name: &str, input: &InputTensor) -> Result<ModelOutputs, Self::Error>;
}

/// 检测模型的原始输出，形状 [1, P, N]，按属性优先存放
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  properties: usize,
  candidates: usize,
  data: Box<[f32]>,
}

impl RawOutput {
  pub fn new(properties: usize, candidates: usize, data: Vec<f32>) -> Result<Self, DetectError> {
    let shape_err = |data: &[f32]| DetectError::InvalidOutputShape {
      shape: vec![1, properties as i64, candidates as i64],
      data_len: data.len(),
    };
    if properties < GEOMETRY_PROPERTIES {
      return Err(shape_err(data.as_slice()));
    }
    match properties.checked_mul(candidates) {
      Some(len) if len == data.len() => Ok(Self {
        properties,
        candidates,
        data: data.into_boxed_slice(),
      }),
      _ => Err(shape_err(data.as_slice())),
    }
  }

  /// 从运行时给出的动态形状构造，要求形状为 [1, P, N]
  pub fn from_shape(shape: &[i64], data: &[f32]) -> Result<Self, DetectError> {
    let invalid = || DetectError::InvalidOutputShape {
      shape: shape.to_vec(),
      data_len: data.len(),
    };
    let [batch, properties, candidates] = shape else {
      return Err(invalid());
    };
    if *batch != 1 {
      return Err(invalid());
    }
    let properties = usize::try_from(*properties).map_err(|_| invalid())?;
    let candidates = usize::try_from(*candidates).map_err(|_| invalid())?;
    Self::new(properties, candidates, data.to_vec()).map_err(|_| invalid())
  }

  /// 每个候选框的属性数 P
  pub fn properties(&self) -> usize {
    self.properties
  }

  /// 候选框数量 N
  pub fn candidates(&self) -> usize {
    self.candidates
  }

  pub fn num_classes(&self) -> usize {
    self.properties - GEOMETRY_PROPERTIES
  }

  /// 越界时返回 `None`
  pub fn value(&self, property: usize, candidate: usize) -> Option<f32> {
    if property >= self.properties || candidate >= self.candidates {
      return None;
    }
    self.data.get(property * self.candidates + candidate).copied()
  }

  /// 按步长取出某个候选框的全部类别分数
  pub fn class_scores(&self, candidate: usize) -> impl Iterator<Item = f32> + '_ {
    self
      .data
      .iter()
      .skip(GEOMETRY_PROPERTIES * self.candidates + candidate)
      .step_by(self.candidates.max(1))
      .copied()
  }
}

/// 运行时输出，保持模型声明的顺序
#[derive(Debug, Clone, Default)]
pub struct ModelOutputs {
  entries: Vec<(String, RawOutput)>,
}

impl ModelOutputs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, output: RawOutput) {
    self.entries.push((name.into(), output));
  }

  pub fn with(mut self, name: impl Into<String>, output: RawOutput) -> Self {
    self.insert(name, output);
    self
  }

  pub fn get(&self, name: &str) -> Option<&RawOutput> {
    self
      .entries
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, output)| output)
  }

  pub fn first(&self) -> Option<&RawOutput> {
    self.entries.first().map(|(_, output)| output)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(n, _)| n.as_str())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxRuntime, OnnxRuntimeError};

#[cfg(test)]
mod tests {
  use super::*;

  fn output() -> RawOutput {
    // P = 6, N = 3
    #[rustfmt::skip]
    let data = vec![
      0.0, 1.0, 2.0,
      10.0, 11.0, 12.0,
      20.0, 21.0, 22.0,
      30.0, 31.0, 32.0,
      0.4, 0.5, 0.6,
      0.7, 0.8, 0.9,
    ];
    RawOutput::new(6, 3, data).unwrap()
  }

  #[test]
  fn class_scores_are_gathered_with_stride() {
    let output = output();
    assert_eq!(output.num_classes(), 2);
    assert_eq!(output.class_scores(0).collect::<Vec<_>>(), vec![0.4, 0.7]);
    assert_eq!(output.class_scores(2).collect::<Vec<_>>(), vec![0.6, 0.9]);
    assert_eq!(output.value(3, 1), Some(31.0));
  }

  #[test]
  fn value_out_of_range_is_none() {
    let output = output();
    assert_eq!(output.value(6, 0), None);
    assert_eq!(output.value(0, 3), None);
    assert_eq!(output.value(5, 2), Some(0.9));
  }

  #[test]
  fn dynamic_shape_is_validated() {
    let data = vec![0.0f32; 12];
    assert!(RawOutput::from_shape(&[1, 6, 2], &data).is_ok());
    assert!(RawOutput::from_shape(&[6, 2], &data).is_err());
    assert!(RawOutput::from_shape(&[2, 6, 1], &data).is_err());
    assert!(RawOutput::from_shape(&[1, -6, -2], &data).is_err());
    assert!(RawOutput::from_shape(&[1, 6, 3], &data).is_err());
    assert!(RawOutput::from_shape(&[1, 3, 4], &data).is_err());
  }

  #[test]
  fn outputs_lookup_by_name_and_order() {
    let outputs = ModelOutputs::new()
      .with("output0", output())
      .with("output1", RawOutput::new(4, 0, Vec::new()).unwrap());

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs.first().map(RawOutput::properties), Some(6));
    assert_eq!(outputs.get("output1").map(RawOutput::candidates), Some(0));
    assert!(outputs.get("missing").is_none());
  }
}
