// 该文件是 Binggui （冰柜） 项目的一部分。
// src/input.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::ImageBuffer};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {path}: {source}")]
  ImageLoadError {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("目录中没有图像文件: {0}")]
  NoImages(PathBuf),
}

/// 从单个图像文件或目录读取照片
///
/// `image:///photos/fridge.jpg` 读取单张照片，
/// `image:///photos/` 按文件名顺序读取目录下的 jpg/jpeg/png。
#[derive(Debug)]
pub struct ImageFileInput {
  paths: std::vec::IntoIter<PathBuf>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    Self::open(url.path())
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let paths = if path.is_dir() {
      let mut paths = Vec::new();
      for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.is_file() && is_image_file(&entry_path) {
          paths.push(entry_path);
        }
      }
      if paths.is_empty() {
        return Err(ImageFileInputError::NoImages(path.to_path_buf()));
      }
      paths.sort();
      info!("从目录读取 {} 张图像: {}", paths.len(), path.display());
      paths
    } else {
      if !path.exists() {
        return Err(std::io::Error::new(
          std::io::ErrorKind::NotFound,
          format!("文件不存在: {}", path.display()),
        )
        .into());
      }
      vec![path.to_path_buf()]
    };

    Ok(Self {
      paths: paths.into_iter(),
    })
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    })
    .unwrap_or(false)
}

/// 解码照片为 ARGB 图像缓冲
pub fn read_image(path: &Path) -> Result<ImageBuffer, ImageFileInputError> {
  let load_err = |source| ImageFileInputError::ImageLoadError {
    path: path.to_path_buf(),
    source,
  };
  let image = ImageReader::open(path)?
    .with_guessed_format()?
    .decode()
    .map_err(load_err)?;
  debug!(
    "读取图像 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(ImageBuffer::from(&image))
}

impl Iterator for ImageFileInput {
  type Item = Result<ImageBuffer, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.paths.next().map(|path| read_image(&path))
  }
}
