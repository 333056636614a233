// Conversions between host image types and the engine's pixel buffers.
//
// Everything entering the engine passes through `to_bgr` or one of the
// `*_to_bgr` helpers; everything past the segmenter works on `GrayImage`.

use crate::error::EngineError;
use anyhow::{Result, anyhow};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use opencv::{
    core::{self, AlgorithmHint, Mat, Rect},
    imgproc,
    prelude::*,
};

/// Normalizes an 8-bit Mat with 1, 3 or 4 channels into BGR.
pub fn to_bgr(mat: Mat) -> Result<Mat> {
    if mat.depth() != core::CV_8U {
        return Err(EngineError::UnsupportedPixelFormat {
            channels: mat.channels(),
            depth: mat.depth(),
        }
        .into());
    }

    let code = match mat.channels() {
        3 => return Ok(mat),
        4 => imgproc::COLOR_BGRA2BGR,
        1 => imgproc::COLOR_GRAY2BGR,
        channels => {
            return Err(EngineError::UnsupportedPixelFormat {
                channels,
                depth: mat.depth(),
            }
            .into());
        }
    };

    let mut bgr = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr, code, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;
    Ok(bgr)
}

pub fn rgb_to_bgr(img: &RgbImage) -> Result<Mat> {
    let rgb = packed_to_mat(img.as_raw(), 3, img.height())?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(bgr)
}

pub fn rgba_to_bgr(img: &RgbaImage) -> Result<Mat> {
    let rgba = packed_to_mat(img.as_raw(), 4, img.height())?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgba,
        &mut bgr,
        imgproc::COLOR_RGBA2BGR,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(bgr)
}

pub fn dynamic_to_bgr(img: &DynamicImage) -> Result<Mat> {
    match img {
        DynamicImage::ImageRgba8(rgba) => rgba_to_bgr(rgba),
        other => rgb_to_bgr(&other.to_rgb8()),
    }
}

pub fn gray_to_mat(img: &GrayImage) -> Result<Mat> {
    packed_to_mat(img.as_raw(), 1, img.height())
}

/// Copies a single channel 8-bit Mat into a `GrayImage`.
pub fn mat_to_gray(mat: &Mat) -> Result<GrayImage> {
    if mat.typ() != core::CV_8UC1 {
        return Err(EngineError::UnsupportedPixelFormat {
            channels: mat.channels(),
            depth: mat.depth(),
        }
        .into());
    }
    let owned = mat.try_clone()?;
    let data = owned.data_bytes()?.to_vec();
    GrayImage::from_raw(owned.cols() as u32, owned.rows() as u32, data)
        .ok_or_else(|| anyhow!("Mat buffer does not match its dimensions"))
}

/// Deep copy of a rectangle of `mat`.
pub fn crop_mat(mat: &Mat, x: u32, y: u32, width: u32, height: u32) -> Result<Mat> {
    let roi = Mat::roi(
        mat,
        Rect::new(x as i32, y as i32, width as i32, height as i32),
    )?;
    Ok(roi.try_clone()?)
}

fn packed_to_mat(data: &[u8], channels: i32, height: u32) -> Result<Mat> {
    let mat = Mat::from_slice(data)?;
    let mat = mat.reshape(channels, height as i32)?;
    let mat = mat.try_clone()?;
    Ok(mat)
}
