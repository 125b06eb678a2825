// 该文件是 Binggui （冰柜） 项目的一部分。
// src/postprocess.rs - 模型输出后处理
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

use tracing::{debug, error, warn};

use crate::{
  error::DetectError,
  labels::LabelTable,
  model::{GEOMETRY_PROPERTIES, RawOutput},
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.45;

/// 一次检测得到的食材标签，已去重
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
  labels: Vec<String>,
  max_score: Option<f32>,
}

impl DetectionResult {
  /// 插入标签，已存在时返回 false
  pub fn insert(&mut self, label: &str) -> bool {
    if self.contains(label) {
      return false;
    }
    self.labels.push(label.to_string());
    true
  }

  pub fn contains(&self, label: &str) -> bool {
    self.labels.iter().any(|l| l == label)
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn into_labels(self) -> Vec<String> {
    self.labels
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  /// 所有候选框中最高的类别分数，仅用于诊断
  pub fn max_score(&self) -> Option<f32> {
    self.max_score
  }

  /// 以 ", " 连接的食材文本
  pub fn to_ingredients_text(&self) -> String {
    self.labels.join(", ")
  }
}

/// 对单个候选框取最大类别分数，相同分数取较小的类别 id
///
/// NaN 不参与比较，没有可比较的分数时返回 `None`。
fn best_class(scores: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  let mut best_score = f32::NEG_INFINITY;
  for (class_id, score) in scores.enumerate() {
    if score > best_score {
      best = Some((class_id, score));
      best_score = score;
    }
  }
  best
}

/// 将原始输出解码为去重后的标签集合
///
/// 类别分数严格大于 `confidence_threshold` 的候选框才会被接受。
pub fn postprocess(
  output: &RawOutput,
  labels: &LabelTable,
  confidence_threshold: f32,
) -> Result<DetectionResult, DetectError> {
  let properties = output.properties();
  if output.num_classes() != labels.len() {
    error!(
      "标签数量 {} 与模型输出属性数 {} 不匹配",
      labels.len(),
      properties
    );
    return Err(DetectError::LabelMismatch {
      expected: GEOMETRY_PROPERTIES + labels.len(),
      actual: properties,
    });
  }

  let mut result = DetectionResult::default();
  // 每个类别 id 只需查找一次标签
  let mut seen = vec![false; labels.len()];

  for candidate in 0..output.candidates() {
    let Some((class_id, score)) = best_class(output.class_scores(candidate)) else {
      continue;
    };

    if result.max_score.is_none_or(|max| score > max) {
      result.max_score = Some(score);
    }

    if score > confidence_threshold {
      let label = &labels[class_id];
      debug!("检测到: {} 置信度 {:.4}", label, score);
      if !seen[class_id] {
        seen[class_id] = true;
        result.insert(label);
      }
    }
  }

  debug!(
    "本图最高置信度: {:?}, 候选框数量: {}",
    result.max_score,
    output.candidates()
  );
  if result.is_empty() {
    warn!("没有置信度高于 {} 的食材", confidence_threshold);
  }

  Ok(result)
}
