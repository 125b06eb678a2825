// 该文件是 Binggui （冰柜） 项目的一部分。
// src/error.rs - 检测流水线错误定义
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

use std::path::PathBuf;

use thiserror::Error;

/// 流水线各环节的错误
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("图像无效: {width}x{height}, 像素数量 {pixels}")]
  InvalidImage {
    width: u32,
    height: u32,
    pixels: usize,
  },
  #[error("模型加载失败: {}, 原因: {reason}", .path.display())]
  ModelLoadFailure { path: PathBuf, reason: String },
  #[error("标签文件读取失败: {0}")]
  LabelLoad(#[from] std::io::Error),
  #[error("推理失败: {0}")]
  InferenceFailure(Box<dyn std::error::Error + Send + Sync + 'static>),
  #[error("标签数量与模型输出不匹配: 期望属性数 {expected}, 实际属性数 {actual}")]
  LabelMismatch { expected: usize, actual: usize },
  #[error("模型输出形状无效: {shape:?}, 数据长度 {data_len}")]
  InvalidOutputShape { shape: Vec<i64>, data_len: usize },
  #[error("模型缺少输出: {0}")]
  MissingOutput(String),
  #[error("配置无效: {0}")]
  InvalidConfig(String),
}

impl DetectError {
  pub fn inference<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    DetectError::InferenceFailure(Box::new(err))
  }

  pub fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
    DetectError::ModelLoadFailure {
      path: path.into(),
      reason: reason.to_string(),
    }
  }
}

/// `Detector::detect` 返回的错误，保留底层原因
#[derive(Error, Debug)]
#[error("食材检测失败: {source}")]
pub struct DetectionFailed {
  #[from]
  source: DetectError,
}

impl DetectionFailed {
  pub fn cause(&self) -> &DetectError {
    &self.source
  }

  pub fn into_cause(self) -> DetectError {
    self.source
  }
}
