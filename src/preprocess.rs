// 该文件是 Binggui （冰柜） 项目的一部分。
// src/preprocess.rs - 图像预处理
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

use image::{RgbImage, imageops::FilterType};
use tracing::debug;

use crate::{
  error::DetectError,
  frame::{ImageBuffer, InputTensor},
};

/// 将图像拉伸到 `target_size` x `target_size` 并转换为归一化的 NCHW 张量
///
/// 不保持宽高比。张量中第 i 个像素的红色写入偏移 i，
/// 绿色写入 i + S²，蓝色写入 i + 2S²，数值为字节值 / 255。
pub fn preprocess(image: &ImageBuffer, target_size: u32) -> Result<InputTensor, DetectError> {
  image.validate()?;
  if target_size == 0 {
    return Err(DetectError::InvalidConfig("模型输入尺寸不能为 0".to_string()));
  }

  let source = image.to_rgb_image()?;
  let resized = resize_square(source, target_size);
  debug!(
    "预处理: {}x{} -> {}x{}",
    image.width, image.height, target_size, target_size
  );

  let mut tensor = InputTensor::zeros(target_size);
  let plane = tensor.plane_len();
  let data = tensor.as_mut();

  for (i, pixel) in resized.pixels().enumerate() {
    data[i] = f32::from(pixel[0]) / 255.0;
    data[i + plane] = f32::from(pixel[1]) / 255.0;
    data[i + 2 * plane] = f32::from(pixel[2]) / 255.0;
  }

  Ok(tensor)
}

fn resize_square(image: RgbImage, size: u32) -> RgbImage {
  if image.dimensions() == (size, size) {
    return image;
  }
  image::imageops::resize(&image, size, size, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::pack_argb;

  #[test]
  fn tensor_has_three_planes_in_unit_range() {
    let pixels = (0..7 * 5)
      .map(|i| pack_argb((i * 7) as u8, (i * 3) as u8, 255 - i as u8, 0xFF))
      .collect();
    let image = ImageBuffer::new(7, 5, pixels).unwrap();

    let tensor = preprocess(&image, 16).unwrap();

    assert_eq!(tensor.as_ref().len(), 3 * 16 * 16);
    assert!(tensor.as_ref().iter().all(|v| (0.0..=1.0).contains(v)));
  }

  #[test]
  fn planar_layout_of_two_by_two_image() {
    let image = ImageBuffer::new(
      2,
      2,
      vec![
        pack_argb(255, 0, 0, 0xFF),
        pack_argb(0, 255, 0, 0xFF),
        pack_argb(0, 0, 255, 0xFF),
        pack_argb(51, 102, 204, 0x80),
      ],
    )
    .unwrap();

    let tensor = preprocess(&image, 2).unwrap();

    assert_eq!(tensor.channel(0).unwrap(), &[1.0, 0.0, 0.0, 0.2]);
    assert_eq!(tensor.channel(1).unwrap(), &[0.0, 1.0, 0.0, 0.4]);
    assert_eq!(tensor.channel(2).unwrap(), &[0.0, 0.0, 1.0, 0.8]);
  }

  #[test]
  fn uniform_image_stays_uniform_after_resize() {
    let image = ImageBuffer::filled(3, 9, pack_argb(255, 0, 255, 0xFF));
    let tensor = preprocess(&image, 8).unwrap();

    assert!(tensor.channel(0).unwrap().iter().all(|&v| v == 1.0));
    assert!(tensor.channel(1).unwrap().iter().all(|&v| v == 0.0));
    assert!(tensor.channel(2).unwrap().iter().all(|&v| v == 1.0));
  }

  #[test]
  fn mismatched_pixel_count_is_invalid_image() {
    let image = ImageBuffer {
      width: 4,
      height: 4,
      pixels: vec![0; 15],
    };
    assert!(matches!(
      preprocess(&image, 8),
      Err(DetectError::InvalidImage { .. })
    ));
  }

  #[test]
  fn zero_target_size_is_rejected() {
    let image = ImageBuffer::filled(2, 2, 0);
    assert!(matches!(
      preprocess(&image, 0),
      Err(DetectError::InvalidConfig(_))
    ));
  }
}
