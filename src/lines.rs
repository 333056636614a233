// Splitting regions into text lines and lines into character cells

use crate::profile::Geometry;
use crate::segment::FontStyle;
use image::{GrayImage, Luma, imageops};
use log::warn;

/// Binary mask value of pixels without ink.
const BACKGROUND: u8 = 255;

/// Inclusive pixel box of a line in region coordinates. It may reach past
/// the region when the line was padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
}

/// One strip of text.
#[derive(Debug, Clone)]
pub struct LineImage {
    pub image: GrayImage,
    pub style: FontStyle,
    pub source: PixelBox,
    pub char_count: usize,
    pub cell_width: u32,
    /// Template distance at or above which a cell is unrecognized.
    pub distance_ceiling: f32,
}

impl LineImage {
    /// Cuts the line into `char_count` cells from left to right.
    pub fn cells(&self) -> impl Iterator<Item = GrayImage> + '_ {
        (0..self.char_count as u32).map(move |i| {
            imageops::crop_imm(
                &self.image,
                i * self.cell_width,
                0,
                self.cell_width,
                self.image.height(),
            )
            .to_image()
        })
    }
}

/// Number of center lines in a panel of `region_height` pixels.
///
/// A trailing partial line is counted when the leftover rows still hold a
/// full `line_height`.
pub fn center_line_count(region_height: u32, line_height: f32, line_spacing: f32) -> usize {
    let pitch = line_height + line_spacing;
    let height = region_height as f32;
    let mut count = ((height + 1.0) / pitch).floor() as usize;
    if height.rem_euclid(pitch) >= line_height {
        count += 1;
    }
    count
}

/// Header lines, always in the normal style with a fixed character count.
pub fn header_lines(header: &GrayImage, geometry: &Geometry) -> Vec<LineImage> {
    let pitch = geometry.line_pitch();
    let height = geometry.line_height.round() as u32;
    let width = geometry.header_char_count as u32 * geometry.char_width;

    (0..geometry.header_line_count)
        .map(|i| {
            let y = (i as f32 * pitch).round() as u32;
            let (image, source) = strip(header, 0, y, width, height, i);
            LineImage {
                image,
                style: FontStyle::Normal,
                source,
                char_count: geometry.header_char_count,
                cell_width: geometry.char_width,
                distance_ceiling: geometry.distance_ceiling(),
            }
        })
        .collect()
}

/// Center lines of the panel. The count follows [`center_line_count`].
///
/// Normal style lines lose the configured side margins, condensed lines keep
/// the full width. Every counted line is returned, padded with background
/// where it extends past the panel.
pub fn center_lines(center: &GrayImage, style: FontStyle, geometry: &Geometry) -> Vec<LineImage> {
    let pitch = geometry.line_pitch();
    let height = geometry.condensed_line_height.round() as u32;
    let count = center_line_count(center.height(), geometry.line_height, geometry.line_spacing);

    let (x_start, x_end) = match style {
        FontStyle::Normal => (
            geometry.center_margin_left,
            center.width().saturating_sub(geometry.center_margin_right),
        ),
        FontStyle::Condensed => (0, center.width()),
    };
    let width = x_end.saturating_sub(x_start);
    let cell_width = geometry.cell_width(style);

    (0..count)
        .map(|i| {
            let y = (i as f32 * pitch).round() as u32;
            let (image, source) = strip(center, x_start, y, width, height, i);
            LineImage {
                image,
                style,
                source,
                char_count: (width / cell_width) as usize,
                cell_width,
                distance_ceiling: geometry.distance_ceiling(),
            }
        })
        .collect()
}

/// Crops a `width` x `height` strip. Rows or columns outside the region are
/// filled with background, so cells there read as blank.
fn strip(
    region: &GrayImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    index: usize,
) -> (GrayImage, PixelBox) {
    let source = PixelBox {
        x_start: x,
        x_end: x + width.saturating_sub(1),
        y_start: y,
        y_end: y + height.saturating_sub(1),
    };
    let visible = imageops::crop_imm(region, x, y, width, height).to_image();
    if visible.dimensions() == (width, height) {
        return (visible, source);
    }

    warn!(
        "Line {} at y={} extends past the {}x{} region",
        index,
        y,
        region.width(),
        region.height()
    );
    let mut image = GrayImage::from_pixel(width, height, Luma([BACKGROUND]));
    imageops::replace(&mut image, &visible, 0, 0);
    (image, source)
}
