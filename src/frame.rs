// 该文件是 Binggui （冰柜） 项目的一部分。
// src/frame.rs - 图像缓冲与 NCHW 输入张量定义
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

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

use crate::error::DetectError;

pub const RGB_CHANNELS: usize = 3;

/// 将 RGBA 分量打包为 0xAARRGGBB
pub const fn pack_argb(r: u8, g: u8, b: u8, a: u8) -> u32 {
  ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// 从 0xAARRGGBB 中取出 RGB 分量
pub const fn unpack_rgb(pixel: u32) -> [u8; 3] {
  [
    ((pixel >> 16) & 0xFF) as u8,
    ((pixel >> 8) & 0xFF) as u8,
    (pixel & 0xFF) as u8,
  ]
}

/// 主机解码后的照片
///
/// 像素按行优先存放，每个像素为打包的 0xAARRGGBB。
/// 字段公开，由 `validate` 检查长度与尺寸是否一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
  pub width: u32,
  pub height: u32,
  pub pixels: Vec<u32>,
}

impl ImageBuffer {
  pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self, DetectError> {
    let image = Self {
      width,
      height,
      pixels,
    };
    image.validate()?;
    Ok(image)
  }

  /// 用单一颜色填充的图像，主要用于测试与预热
  pub fn filled(width: u32, height: u32, pixel: u32) -> Self {
    Self {
      width,
      height,
      pixels: vec![pixel; width as usize * height as usize],
    }
  }

  pub fn validate(&self) -> Result<(), DetectError> {
    let expected = (self.width as usize).checked_mul(self.height as usize);
    if self.width == 0 || self.height == 0 || expected != Some(self.pixels.len()) {
      return Err(DetectError::InvalidImage {
        width: self.width,
        height: self.height,
        pixels: self.pixels.len(),
      });
    }
    Ok(())
  }

  /// 丢弃 alpha 通道，转换为 RGB 图像
  pub fn to_rgb_image(&self) -> Result<RgbImage, DetectError> {
    self.validate()?;
    let width = self.width as usize;
    Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
      let idx = y as usize * width + x as usize;
      Rgb(unpack_rgb(self.pixels[idx]))
    }))
  }
}

impl From<&RgbImage> for ImageBuffer {
  fn from(image: &RgbImage) -> Self {
    let pixels = image
      .pixels()
      .map(|p| pack_argb(p[0], p[1], p[2], 0xFF))
      .collect();
    Self {
      width: image.width(),
      height: image.height(),
      pixels,
    }
  }
}

impl From<&RgbaImage> for ImageBuffer {
  fn from(image: &RgbaImage) -> Self {
    let pixels = image
      .pixels()
      .map(|p| pack_argb(p[0], p[1], p[2], p[3]))
      .collect();
    Self {
      width: image.width(),
      height: image.height(),
      pixels,
    }
  }
}

impl From<&DynamicImage> for ImageBuffer {
  fn from(image: &DynamicImage) -> Self {
    ImageBuffer::from(&image.to_rgba8())
  }
}

/// 模型输入张量，形状 [1, 3, S, S]，按通道平面存放
#[derive(Debug, Clone)]
pub struct InputTensor {
  size: u32,
  data: Box<[f32]>,
}

impl InputTensor {
  pub(crate) fn zeros(size: u32) -> Self {
    let len = RGB_CHANNELS * size as usize * size as usize;
    Self {
      size,
      data: vec![0.0f32; len].into_boxed_slice(),
    }
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn shape(&self) -> [usize; 4] {
    let s = self.size as usize;
    [1, RGB_CHANNELS, s, s]
  }

  /// 单个通道平面的长度 S*S
  pub fn plane_len(&self) -> usize {
    self.size as usize * self.size as usize
  }

  /// 第 `c` 个通道平面，`c` 超出 RGB 时返回 `None`
  pub fn channel(&self, c: usize) -> Option<&[f32]> {
    if c >= RGB_CHANNELS {
      return None;
    }
    let plane = self.plane_len();
    self.data.get(c * plane..(c + 1) * plane)
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }
}

impl AsRef<[f32]> for InputTensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

impl AsMut<[f32]> for InputTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}
