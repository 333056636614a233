// Region slicing and font style detection

use crate::capture::{binarize, grayscale};
use crate::convert::{gray_to_mat, mat_to_gray};
use crate::profile::{Geometry, StyleIcons};
use anyhow::Result;
use image::{GrayImage, imageops};
use log::{debug, warn};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Font rendering mode of the terminal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Condensed,
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontStyle::Normal => write!(f, "normal"),
            FontStyle::Condensed => write!(f, "condensed"),
        }
    }
}

/// The three horizontal bands of the content area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Header,
    Center,
    Footer,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Header => write!(f, "header"),
            Region::Center => write!(f, "center"),
            Region::Footer => write!(f, "footer"),
        }
    }
}

/// Peak correlation of each style icon against the footer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleScores {
    pub normal: f64,
    pub condensed: f64,
}

impl StyleScores {
    /// Condensed wins only with a strictly higher peak.
    pub fn style(&self) -> FontStyle {
        if self.condensed > self.normal {
            FontStyle::Condensed
        } else {
            FontStyle::Normal
        }
    }
}

/// Cropped capture split into its regions.
pub struct ContentArea {
    /// Binary mask of the whole content area, background is 255.
    pub binary: GrayImage,
    pub header: GrayImage,
    pub center: GrayImage,
    /// Grayscale, not binarized.
    pub footer: GrayImage,
    pub style: FontStyle,
    pub scores: StyleScores,
}

impl ContentArea {
    /// Binarizes a cropped BGR capture, slices the regions and detects the
    /// font style from the footer icons.
    pub fn segment(cropped: &Mat, geometry: &Geometry, icons: &StyleIcons) -> Result<Self> {
        let gray_mat = grayscale(cropped)?;
        let binary = mat_to_gray(&binarize(&gray_mat, geometry.binary_threshold)?)?;
        let gray = mat_to_gray(&gray_mat)?;
        let (width, height) = binary.dimensions();

        let header = imageops::crop_imm(
            &binary,
            geometry.header_x_start,
            geometry.header_y_start,
            (geometry.header_x_end + 1).saturating_sub(geometry.header_x_start),
            (geometry.header_y_end + 1).saturating_sub(geometry.header_y_start),
        )
        .to_image();

        let center = imageops::crop_imm(
            &binary,
            0,
            geometry.central_panel_y_start,
            width,
            geometry
                .central_panel_y_end
                .saturating_sub(geometry.central_panel_y_start),
        )
        .to_image();

        let footer_y = (geometry.central_panel_y_end + 1).min(height);
        let footer = imageops::crop_imm(&gray, 0, footer_y, width, height - footer_y).to_image();

        let scores = detect_style(&footer, icons)?;
        let style = scores.style();
        debug!(
            "Style {} (normal peak {:.0}, condensed peak {:.0})",
            style, scores.normal, scores.condensed
        );

        Ok(Self {
            binary,
            header,
            center,
            footer,
            style,
            scores,
        })
    }
}

/// Matches both style icons against a grayscale footer.
///
/// A footer too small for an icon scores negative infinity for it, so a
/// footer too small for both resolves to the normal style.
pub fn detect_style(footer: &GrayImage, icons: &StyleIcons) -> Result<StyleScores> {
    let footer = gray_to_mat(footer)?;
    let normal = icon_peak(&footer, &icons.normal)?;
    let condensed = icon_peak(&footer, &icons.condensed)?;
    if normal.is_none() || condensed.is_none() {
        warn!(
            "Footer of {}x{} is smaller than a style icon",
            footer.cols(),
            footer.rows()
        );
    }
    Ok(StyleScores {
        normal: normal.unwrap_or(f64::NEG_INFINITY),
        condensed: condensed.unwrap_or(f64::NEG_INFINITY),
    })
}

/// Highest `TM_CCOEFF` score of `icon` anywhere in `img`.
fn icon_peak(img: &Mat, icon: &Mat) -> Result<Option<f64>> {
    if icon.empty() || img.rows() < icon.rows() || img.cols() < icon.cols() {
        return Ok(None);
    }

    let mut result = Mat::default();
    imgproc::match_template(img, icon, &mut result, imgproc::TM_CCOEFF, &Mat::default())?;

    let mut max_val = 0.0;
    core::min_max_loc(&result, None, Some(&mut max_val), None, None, &Mat::default())?;
    Ok(Some(max_val))
}
