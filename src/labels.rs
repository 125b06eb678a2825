// 该文件是 Binggui （冰柜） 项目的一部分。
// src/labels.rs - 类别标签表
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
  io::{BufRead, BufReader},
  path::Path,
  str::FromStr,
};

use tracing::{debug, info};

use crate::error::DetectError;

/// 类别名称表，行号即类别 id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  names: Box<[String]>,
}

impl LabelTable {
  pub fn new<I, S>(names: I) -> Result<Self, DetectError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let names: Box<[String]> = names.into_iter().map(Into::into).collect();
    if names.is_empty() {
      return Err(DetectError::InvalidConfig("标签表为空".to_string()));
    }
    Ok(Self { names })
  }

  pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, DetectError> {
    let mut names = Vec::new();
    for line in reader.lines() {
      let line = line?;
      names.push(line.trim_end_matches('\r').to_string());
    }
    Self::new(names)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DetectError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let file = std::fs::File::open(path)?;
    let table = Self::from_reader(BufReader::new(file))?;
    debug!("标签数量: {}", table.len());
    Ok(table)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

impl FromStr for LabelTable {
  type Err = DetectError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::from_reader(s.as_bytes())
  }
}

impl std::ops::Index<usize> for LabelTable {
  type Output = str;

  fn index(&self, class_id: usize) -> &Self::Output {
    &self.names[class_id]
  }
}
