// Callbacks for looking at intermediate images

use crate::lines::LineImage;
use crate::segment::Region;
use anyhow::{Context, Result};
use image::GrayImage;
use log::warn;
use std::path::PathBuf;

/// Observer of the segmentation pipeline. Every method defaults to doing
/// nothing.
pub trait InspectHook {
    /// Called once per region after segmentation.
    fn on_region(&mut self, _region: Region, _image: &GrayImage) {}

    /// Called per line. `text` is set when the line was recognized.
    fn on_line(&mut self, _region: Region, _index: usize, _line: &LineImage, _text: Option<&str>) {}
}

/// Hook that ignores everything.
pub struct NoInspect;

impl InspectHook for NoInspect {}

/// Writes every region and line into a directory as PNG files.
pub struct ImageDumpHook {
    dir: PathBuf,
    written: usize,
}

impl ImageDumpHook {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir, written: 0 })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    fn save(&mut self, name: String, image: &GrayImage) {
        // an image that fails to write must not abort recognition
        match image.save(self.dir.join(&name)) {
            Ok(()) => self.written += 1,
            Err(e) => warn!("Failed to write {}: {}", name, e),
        }
    }
}

impl InspectHook for ImageDumpHook {
    fn on_region(&mut self, region: Region, image: &GrayImage) {
        self.save(format!("{}.png", region), image);
    }

    fn on_line(&mut self, region: Region, index: usize, line: &LineImage, _text: Option<&str>) {
        self.save(format!("{}-{:02}.png", region, index), &line.image);
    }
}
