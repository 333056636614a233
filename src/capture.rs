// Capture validation and window chrome removal

use crate::convert;
use crate::error::EngineError;
use crate::profile::{Geometry, LayoutProfile, ProfileSet, SizeClass};
use anyhow::Result;
use log::debug;
use opencv::{
    core::{self, AlgorithmHint, Mat, Vec3b},
    imgproc,
    prelude::*,
};

/// Raw capture with its size classification and density measurement.
pub struct CapturedImage {
    pub image: Mat,
    pub size_class: SizeClass,
    /// Share of background pixels after binarization, `None` when the size
    /// check already failed.
    pub dark_percentage: Option<f64>,
    pub valid: bool,
}

/// Why a capture was not accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidReason {
    UnknownSize { width: u32, height: u32 },
    TooLittleBackground { percentage: f64, required: f64 },
}

/// Inclusive pixel bounds of the content area inside the raw capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }
}

/// A validated capture with the chrome removed.
pub struct CroppedCapture<'p> {
    pub image: Mat,
    pub crop: CropBox,
    pub profile: &'p LayoutProfile,
}

/// Outcome of inspecting a raw capture.
pub enum Validation<'p> {
    Valid(CroppedCapture<'p>),
    Invalid {
        size_class: SizeClass,
        reason: InvalidReason,
    },
}

/// Grayscale conversion of a BGR capture.
pub fn grayscale(bgr: &Mat) -> Result<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color(
        bgr,
        &mut gray,
        imgproc::COLOR_BGR2GRAY,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(gray)
}

/// Inverts a grayscale image and keeps pixels brighter than `threshold`.
///
/// The dark terminal background becomes 255, text and chrome become 0.
pub fn binarize(gray: &Mat, threshold: u8) -> Result<Mat> {
    let mut inverted = Mat::default();
    core::bitwise_not(gray, &mut inverted, &Mat::default())?;
    let mut binary = Mat::default();
    imgproc::threshold(
        &inverted,
        &mut binary,
        threshold as f64,
        255.0,
        imgproc::THRESH_BINARY,
    )?;
    Ok(binary)
}

/// Percentage of pixels that are background after binarization.
pub fn dark_percentage(bgr: &Mat, threshold: u8) -> Result<f64> {
    let binary = binarize(&grayscale(bgr)?, threshold)?;
    let total = binary.rows() as f64 * binary.cols() as f64;
    if total == 0.0 {
        return Ok(0.0);
    }
    Ok(core::count_non_zero(&binary)? as f64 / total * 100.0)
}

impl CapturedImage {
    /// Classifies the size of a BGR capture and applies the density gate.
    pub fn new(image: Mat, profiles: &ProfileSet) -> Result<Self> {
        let image = convert::to_bgr(image)?;
        let size_class = profiles.classify_size(image.cols() as u32, image.rows() as u32);

        let Some(variant) = size_class.variant() else {
            return Ok(Self {
                image,
                size_class,
                dark_percentage: None,
                valid: false,
            });
        };

        let geometry = &profiles.get(variant).geometry;
        let percentage = dark_percentage(&image, geometry.binary_threshold)?;
        debug!("{} capture, {:.1}% background", variant, percentage);

        Ok(Self {
            image,
            size_class,
            dark_percentage: Some(percentage),
            valid: percentage >= geometry.min_dark_percentage,
        })
    }

    fn invalid_reason(&self, profiles: &ProfileSet) -> Option<InvalidReason> {
        if self.valid {
            return None;
        }
        match (self.size_class.variant(), self.dark_percentage) {
            (Some(variant), Some(percentage)) => Some(InvalidReason::TooLittleBackground {
                percentage,
                required: profiles.get(variant).geometry.min_dark_percentage,
            }),
            _ => Some(InvalidReason::UnknownSize {
                width: self.image.cols() as u32,
                height: self.image.rows() as u32,
            }),
        }
    }
}

/// Validates a raw capture and, when it is accepted, crops the window chrome.
///
/// A rejected capture is a normal outcome; only a border scan that runs off
/// the bitmap is an error.
pub fn validate(image: Mat, profiles: &ProfileSet) -> Result<Validation<'_>> {
    let capture = CapturedImage::new(image, profiles)?;
    if let Some(reason) = capture.invalid_reason(profiles) {
        debug!("Capture rejected: {:?}", reason);
        return Ok(Validation::Invalid {
            size_class: capture.size_class,
            reason,
        });
    }

    // valid implies a known size
    let variant = capture
        .size_class
        .variant()
        .ok_or_else(|| anyhow::anyhow!("Valid capture without a size variant"))?;
    let profile = profiles.get(variant);
    let crop = find_content_box(&capture.image, &profile.geometry)?;
    debug!("Content area {:?}", crop);

    let image = convert::crop_mat(
        &capture.image,
        crop.x_min,
        crop.y_min,
        crop.width(),
        crop.height(),
    )?;
    Ok(Validation::Valid(CroppedCapture {
        image,
        crop,
        profile,
    }))
}

/// Finds the content area by scanning inward from all four edges until the
/// reference channel drops to the error margin.
///
/// Left/right scans run along `border_scan_row`, top/bottom scans along
/// `border_scan_column`.
pub fn find_content_box(bgr: &Mat, geometry: &Geometry) -> Result<CropBox> {
    let width = bgr.cols() as i64;
    let height = bgr.rows() as i64;
    let row = geometry.border_scan_row as i64;
    let col = geometry.border_scan_column as i64;
    let channel = geometry.border_channel;
    let margin = geometry.border_error_margin;
    if channel > 2 {
        anyhow::bail!("Border channel {} is not a BGR channel", channel);
    }

    let mut x_min = 0i64;
    let mut x_max = width - 1;
    let mut y_min = 0i64;
    let mut y_max = height - 1;

    let overrun = |x_min, x_max, y_min, y_max| EngineError::GeometryOverrun {
        x_min,
        x_max,
        y_min,
        y_max,
        width: width as u32,
        height: height as u32,
    };

    // Out of bounds reads end the scan with `None`.
    let is_chrome = |y: i64, x: i64| -> Result<Option<bool>> {
        if y < 0 || y >= height || x < 0 || x >= width {
            return Ok(None);
        }
        let px = bgr.at_2d::<Vec3b>(y as i32, x as i32)?;
        Ok(Some(px[channel] > margin))
    };

    loop {
        match is_chrome(row, x_min)? {
            Some(true) => x_min += 1,
            Some(false) => break,
            None => return Err(overrun(x_min, x_max, y_min, y_max).into()),
        }
    }
    loop {
        match is_chrome(row, x_max)? {
            Some(true) => x_max -= 1,
            Some(false) => break,
            None => return Err(overrun(x_min, x_max, y_min, y_max).into()),
        }
    }
    loop {
        match is_chrome(y_min, col)? {
            Some(true) => y_min += 1,
            Some(false) => break,
            None => return Err(overrun(x_min, x_max, y_min, y_max).into()),
        }
    }
    loop {
        match is_chrome(y_max, col)? {
            Some(true) => y_max -= 1,
            Some(false) => break,
            None => return Err(overrun(x_min, x_max, y_min, y_max).into()),
        }
    }

    Ok(CropBox {
        x_min: x_min as u32,
        x_max: x_max as u32,
        y_min: y_min as u32,
        y_max: y_max as u32,
    })
}
