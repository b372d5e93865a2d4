// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/mask.rs - 信箱区域掩码
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

//! 由四个角点生成信箱区域掩码：取凸包后填充，区域内为 255，其余为 0。
//!
//! 角点顺序任意。退化输入（共线或重合的角点）不会报错，得到一条线段、
//! 单个像素或空掩码。

use image::{GrayImage, Luma};
use imageproc::{
  drawing::{draw_line_segment_mut, draw_polygon_mut},
  geometry::convex_hull,
  point::Point as HullPoint,
};

use crate::config::{Point, PostboxLayout};

pub const MASK_FOREGROUND: Luma<u8> = Luma([255]);

/// 角点的凸包，按 imageproc 的顺序返回，首尾不重复
///
/// 所有角点共线时只返回两个端点（或重合时的一个点）。角点先截断到
/// ±[`MAX_CORNER_COORDINATE`](crate::config::MAX_CORNER_COORDINATE)，任意 `i32` 角点都不会失败。
pub fn region_hull(corners: &[Point; 4]) -> Vec<HullPoint<i32>> {
  // 截断后 imageproc 的 i32 叉积不会溢出
  let mut points: Vec<HullPoint<i32>> = corners
    .iter()
    .map(|p| {
      let p = p.clamped();
      HullPoint::new(p.x, p.y)
    })
    .collect();
  // 先排序，保证任意排列得到完全相同的凸包
  points.sort_by_key(|p| (p.x, p.y));
  points.dedup();

  if points.len() < 3 || is_collinear(&points) {
    return match (points.first(), points.last()) {
      (Some(first), Some(last)) if first != last => vec![*first, *last],
      (Some(first), _) => vec![*first],
      _ => Vec::new(),
    };
  }

  let mut hull = convex_hull(points.as_slice());
  hull.dedup();
  if hull.len() > 1 && hull.first() == hull.last() {
    hull.pop();
  }
  hull
}

fn is_collinear(points: &[HullPoint<i32>]) -> bool {
  let origin = points[0];
  let direction = points[1];
  points[2..].iter().all(|p| {
    let cross = (direction.x as i64 - origin.x as i64) * (p.y as i64 - origin.y as i64)
      - (direction.y as i64 - origin.y as i64) * (p.x as i64 - origin.x as i64);
    cross == 0
  })
}

/// 在已有画布上填充一个信箱区域
pub fn fill_region_mut(mask: &mut GrayImage, corners: &[Point; 4]) {
  let hull = region_hull(corners);
  match hull.len() {
    0 => {}
    1 => {
      let p = hull[0];
      if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
        mask.put_pixel(p.x as u32, p.y as u32, MASK_FOREGROUND);
      }
    }
    2 => draw_line_segment_mut(
      mask,
      (hull[0].x as f32, hull[0].y as f32),
      (hull[1].x as f32, hull[1].y as f32),
      MASK_FOREGROUND,
    ),
    _ => draw_polygon_mut(mask, &hull, MASK_FOREGROUND),
  }
}

/// 生成与画面同尺寸的单个信箱掩码
pub fn region_mask(width: u32, height: u32, corners: &[Point; 4]) -> GrayImage {
  let mut mask = GrayImage::new(width, height);
  fill_region_mut(&mut mask, corners);
  mask
}

/// 所有信箱掩码的并集，用于可视化
pub fn layout_mask(width: u32, height: u32, layout: &PostboxLayout) -> GrayImage {
  let mut mask = GrayImage::new(width, height);
  for region in layout.iter() {
    fill_region_mut(&mut mask, &region.corners);
  }
  mask
}
