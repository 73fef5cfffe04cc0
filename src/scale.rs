// 该文件是 Shanbao （山豹） 项目的一部分。
// src/scale.rs - 帧缩放
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

use image::RgbImage;

/// 当帧宽度超过 `max_width` 时按比例缩小，否则原样返回。
///
/// 缩放比例 = max_width / width，高度按同一比例取整。
pub fn scale_to_max_width(image: RgbImage, max_width: u32) -> RgbImage {
  let width = image.width();
  if width <= max_width || max_width == 0 {
    return image;
  }

  let scale = max_width as f64 / width as f64;
  let new_width = max_width;
  let new_height = ((image.height() as f64 * scale) as u32).max(1);

  image::imageops::resize(
    &image,
    new_width,
    new_height,
    image::imageops::FilterType::Triangle,
  )
}
