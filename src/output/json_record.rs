// 该文件是 Binggui （冰柜） 项目的一部分。
// src/output/json_record.rs - JSON 目录记录输出
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

use chrono::{DateTime, Datelike, Utc};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme, frame::ImageBuffer, output::Render, postprocess::DetectionResult,
};

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按日期目录记录每次检测结果
///
/// `folder:///records` 只记录有食材的结果，`folder:///records?always` 记录全部结果。
/// 文件路径为 `records/YYYY/MM/DD/HH-MM-SS-XXXX.json`。
pub struct JsonRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(JsonRecordOutput {
      directory: PathBuf::from(uri.path()),
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl JsonRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn record_path(&self, now: &DateTime<Utc>) -> Result<PathBuf, JsonRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.json",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, image: &ImageBuffer, result: &DetectionResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let now = Utc::now();
    let path = self.record_path(&now)?;
    let record = json!({
      "timestamp": now.to_rfc3339(),
      "width": image.width,
      "height": image.height,
      "labels": result.labels(),
      "ingredients": result.to_ingredients_text(),
      "max_score": result.max_score(),
    });
    std::fs::write(&path, serde_json::to_string_pretty(&record)?)?;
    debug!("记录检测结果: {}", path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn records(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(path) = stack.pop() {
      if path.is_dir() {
        for entry in std::fs::read_dir(&path).unwrap() {
          stack.push(entry.unwrap().path());
        }
      } else {
        found.push(path);
      }
    }
    found
  }

  #[test]
  fn writes_record_for_detected_ingredients() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();

    let mut result = DetectionResult::default();
    result.insert("egg");
    output
      .render_result(&ImageBuffer::filled(4, 3, 0), &result)
      .unwrap();
    output
      .render_result(&ImageBuffer::filled(4, 3, 0), &DetectionResult::default())
      .unwrap();

    let files = records(dir.path());
    assert_eq!(files.len(), 1);
    let record: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(record["labels"], json!(["egg"]));
    assert_eq!(record["width"], json!(4));
    assert_eq!(record["ingredients"], json!("egg"));
  }

  #[test]
  fn always_records_empty_results() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?always", dir.path().display())).unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();

    output
      .render_result(&ImageBuffer::filled(1, 1, 0), &DetectionResult::default())
      .unwrap();

    assert_eq!(records(dir.path()).len(), 1);
  }
}
