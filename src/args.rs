// 该文件是 Binggui （冰柜） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

/// Binggui 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 onnx:///models/best.onnx?labels=/models/classes.txt
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源，单张照片或照片目录，例如 image:///photos/fridge.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - text:- 打印食材文本
  /// - text:///path/ingredients.txt 追加到食材文本文件
  /// - folder:///path/records 记录 JSON 结果
  #[arg(long, value_name = "OUTPUT", default_value = "text:-")]
  pub output: Url,

  /// 置信度阈值 (0.0 - 1.0)，覆盖模型地址中的设置
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// 最大处理图像数，不指定时处理全部输入
  #[arg(long, value_name = "COUNT")]
  pub frame_number: Option<usize>,
}
