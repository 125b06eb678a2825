// 该文件是 Binggui （冰柜） 项目的一部分。
// src/output/ingredients_text.rs - 食材文本输出
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

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::ImageBuffer, output::Render, postprocess::DetectionResult,
};

#[derive(Error, Debug)]
pub enum IngredientsTextError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
}

/// 把检测到的食材追加到逗号分隔的食材文本中
pub fn append_ingredients(existing: &str, result: &DetectionResult) -> String {
  let existing = existing.trim();
  let detected = result.to_ingredients_text();
  match (existing.is_empty(), detected.is_empty()) {
    (_, true) => existing.to_string(),
    (true, false) => detected,
    (false, false) => format!("{existing}, {detected}"),
  }
}

/// 食材文本输出
///
/// `text:-` 打印到标准输出；`text:///path/ingredients.txt` 将食材追加到文件中。
pub struct IngredientsTextOutput {
  path: Option<PathBuf>,
}

impl FromUrlWithScheme for IngredientsTextOutput {
  const SCHEME: &'static str = "text";
}

impl FromUrl for IngredientsTextOutput {
  type Error = IngredientsTextError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(IngredientsTextError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let path = match url.path() {
      "" | "-" => None,
      path => Some(PathBuf::from(path)),
    };
    Ok(Self { path })
  }
}

impl IngredientsTextOutput {
  pub fn stdout() -> Self {
    Self { path: None }
  }

  pub fn file(path: impl Into<PathBuf>) -> Self {
    Self {
      path: Some(path.into()),
    }
  }

  fn append_to_file(&self, path: &Path, result: &DetectionResult) -> Result<(), IngredientsTextError> {
    let existing = match std::fs::read_to_string(path) {
      Ok(text) => text,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
      Err(e) => return Err(e.into()),
    };

    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let text = append_ingredients(&existing, result);
    std::fs::write(path, format!("{text}\n"))?;
    info!("食材写入文件: {}", path.display());
    Ok(())
  }
}

impl Render for IngredientsTextOutput {
  type Error = IngredientsTextError;

  fn render_result(&self, _image: &ImageBuffer, result: &DetectionResult) -> Result<(), Self::Error> {
    if result.is_empty() {
      warn!("未检测到食材");
    }
    match &self.path {
      Some(path) => self.append_to_file(path, result),
      None => {
        println!("{}", result.to_ingredients_text());
        Ok(())
      }
    }
  }
}
