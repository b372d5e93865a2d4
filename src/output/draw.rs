// 该文件是 Postwatch （信箱守望） 项目的一部分。
// src/output/draw.rs - 信箱检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_polygon_mut, draw_line_segment_mut, draw_text_mut},
  point::Point as DrawPoint,
};

use crate::{
  config::PostboxLayout,
  frame::Frame,
  mask::region_hull,
  model::{BoxState, FrameReport},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 11.0;
const PRESENT_TEXT: &str = "POST PRESENT";
const EMPTY_TEXT: &str = "NO POST";
const OBSCURED_TEXT: &str = "VIEW OBSCURED";
const PRESENT_COLOR: Rgb<u8> = Rgb([0, 255, 0]); // 绿色
const EMPTY_COLOR: Rgb<u8> = Rgb([255, 0, 0]); // 红色
const OBSCURED_COLOR: Rgb<u8> = Rgb([255, 255, 0]); // 黄色
const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 128, 255]);

/// 在帧上标注每个信箱的状态
pub struct Annotator {
  font: FontArc,
  font_scale: PxScale,
  layout: PostboxLayout,
  outline: bool,
}

impl Default for Annotator {
  fn default() -> Self {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      layout: PostboxLayout::default(),
      outline: false,
    }
  }
}

impl Annotator {
  pub fn with_layout(mut self, layout: PostboxLayout) -> Self {
    self.layout = layout;
    self
  }

  /// 是否同时画出信箱区域轮廓
  pub fn with_outline(mut self, outline: bool) -> Self {
    self.outline = outline;
    self
  }

  pub fn layout(&self) -> &PostboxLayout {
    &self.layout
  }

  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    // 锚点是文字基线左端
    let top = y - LABEL_FONT_SIZE as i32;
    draw_text_mut(image, color, x, top, self.font_scale, &self.font, text);
  }

  fn draw_outlines(&self, image: &mut RgbImage) {
    for region in self.layout.iter() {
      let hull: Vec<DrawPoint<f32>> = region_hull(&region.corners)
        .into_iter()
        .map(|p| DrawPoint::new(p.x as f32, p.y as f32))
        .collect();
      match hull.len() {
        0 | 1 => {}
        2 => draw_line_segment_mut(
          image,
          (hull[0].x, hull[0].y),
          (hull[1].x, hull[1].y),
          OUTLINE_COLOR,
        ),
        _ => draw_hollow_polygon_mut(image, &hull, OUTLINE_COLOR),
      }
    }
  }

  pub fn annotate_image(&self, image: &mut RgbImage, report: &FrameReport) {
    if self.outline {
      self.draw_outlines(image);
    }

    if report.row.is_obscured() {
      let anchor = self.layout.regions[0].label_anchor;
      self.draw_label(image, anchor.x, anchor.y, OBSCURED_TEXT, OBSCURED_COLOR);
      return;
    }

    for (region, state) in self.layout.iter().zip(report.row.states().iter()) {
      let (text, color) = match state {
        BoxState::PostPresent => (PRESENT_TEXT, PRESENT_COLOR),
        _ => (EMPTY_TEXT, EMPTY_COLOR),
      };
      let anchor = region.label_anchor;
      self.draw_label(image, anchor.x, anchor.y, text, color);
    }
  }

  /// 返回标注后的副本，原帧不变
  pub fn annotate(&self, frame: &Frame, report: &FrameReport) -> RgbImage {
    let mut image = frame.image().clone();
    self.annotate_image(&mut image, report);
    image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ClassificationRow;

  fn report(row: ClassificationRow) -> FrameReport {
    FrameReport {
      index: 1,
      row,
      motion_correlation: Some(1.0),
      boxes: None,
    }
  }

  // 黑底上抗锯齿文字只会留下对应颜色通道
  fn has_tint(image: &RgbImage, tint: fn(&Rgb<u8>) -> bool) -> bool {
    image.pixels().any(tint)
  }

  fn green(p: &Rgb<u8>) -> bool {
    p[0] == 0 && p[1] > 0 && p[2] == 0
  }

  fn red(p: &Rgb<u8>) -> bool {
    p[0] > 0 && p[1] == 0 && p[2] == 0
  }

  fn yellow(p: &Rgb<u8>) -> bool {
    p[0] > 0 && p[0] == p[1] && p[2] == 0
  }

  #[test]
  fn test_present_box_is_labelled_green() {
    let frame = Frame::filled(1, 240, 380, 0);
    let annotator = Annotator::default();
    let row = ClassificationRow::from_presence([true, false, false, false, false, false]);
    let image = annotator.annotate(&frame, &report(row));

    assert!(has_tint(&image, green));
    assert!(has_tint(&image, red));
    // 原帧不变
    assert!(frame.image().pixels().all(|p| p.0 == [0, 0, 0]));
  }

  #[test]
  fn test_obscured_frame_only_gets_banner() {
    let frame = Frame::filled(1, 240, 380, 0);
    let image = Annotator::default().annotate(&frame, &report(ClassificationRow::obscured()));

    assert!(has_tint(&image, yellow));
    assert!(!has_tint(&image, green));
    assert!(!has_tint(&image, red));
  }

  #[test]
  fn test_outline_follows_layout() {
    let frame = Frame::filled(1, 240, 380, 0);
    let annotator = Annotator::default().with_outline(true);
    let image = annotator.annotate(&frame, &report(ClassificationRow::empty()));

    // 第一个信箱的右下角在轮廓上
    assert_eq!(*image.get_pixel(107, 134), OUTLINE_COLOR);
    assert_eq!(*image.get_pixel(60, 124), Rgb([0, 0, 0]));
  }
}
