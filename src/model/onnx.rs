// 该文件是 Binggui （冰柜） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理后端
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

use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  error::DetectError,
  frame::InputTensor,
  model::{ModelOutputs, ModelRuntime, RawOutput},
};

#[derive(Error, Debug)]
pub enum OnnxRuntimeError {
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型输出无效: {0}")]
  OutputError(#[from] DetectError),
}

pub struct OnnxRuntime {
  session: Session,
}

impl OnnxRuntime {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OnnxRuntimeError> {
    let path = path.as_ref();
    info!("加载 ONNX 模型文件: {}", path.display());

    let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "nnapi")]
    let builder = {
      use ort::execution_providers::NNAPIExecutionProvider;
      info!("启用 NNAPI 加速");
      builder.with_execution_providers([NNAPIExecutionProvider::default().build()])?
    };

    let session = builder.commit_from_file(path)?;

    for input in session.inputs.iter() {
      debug!("模型输入: {}", input.name);
    }
    for output in session.outputs.iter() {
      debug!("模型输出: {}", output.name);
    }
    info!("模型加载完成");

    Ok(Self { session })
  }
}

impl ModelRuntime for OnnxRuntime {
  type Error = OnnxRuntimeError;

  fn run(&mut self, input_name: &str, input: &InputTensor) -> Result<ModelOutputs, Self::Error> {
    let tensor = Tensor::from_array((input.shape(), input.as_ref().to_vec()))?;
    let outputs = self.session.run(ort::inputs![input_name => tensor])?;

    let mut result = ModelOutputs::new();
    for (name, value) in outputs.iter() {
      let (shape, data) = value.try_extract_tensor::<f32>()?;
      debug!("输出 {}: 形状 {:?}", name, shape);
      result.insert(name, RawOutput::from_shape(shape, data)?);
    }

    Ok(result)
  }
}
