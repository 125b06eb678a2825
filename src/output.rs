// 该文件是 Binggui （冰柜） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::ImageBuffer, postprocess::DetectionResult};

pub trait Render: Sized {
  type Error;
  fn render_result(&self, image: &ImageBuffer, result: &DetectionResult) -> Result<(), Self::Error>;
}

mod ingredients_text;
pub use self::ingredients_text::{IngredientsTextError, IngredientsTextOutput};

#[cfg(feature = "json_record")]
mod json_record;
#[cfg(feature = "json_record")]
pub use self::json_record::{JsonRecordOutput, JsonRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("食材文本输出错误: {0}")]
  IngredientsTextError(#[from] IngredientsTextError),
  #[cfg(feature = "json_record")]
  #[error("JSON 记录输出错误: {0}")]
  JsonRecordOutputError(#[from] JsonRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  IngredientsText(IngredientsTextOutput),
  #[cfg(feature = "json_record")]
  JsonRecord(JsonRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      IngredientsTextOutput::SCHEME => {
        let output = IngredientsTextOutput::from_url(url)?;
        Ok(OutputWrapper::IngredientsText(output))
      }
      #[cfg(feature = "json_record")]
      JsonRecordOutput::SCHEME => {
        let output = JsonRecordOutput::from_url(url)?;
        Ok(OutputWrapper::JsonRecord(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, image: &ImageBuffer, result: &DetectionResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::IngredientsText(output) => output
        .render_result(image, result)
        .map_err(OutputError::from),
      #[cfg(feature = "json_record")]
      OutputWrapper::JsonRecord(output) => output
        .render_result(image, result)
        .map_err(OutputError::from),
    }
  }
}
