// Learned character templates and their on-disk format

use crate::error::EngineError;
use crate::segment::FontStyle;
use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

static BUNDLED_LIBRARY: &[u8] = include_bytes!("../assets/default_templates.bin");

/// A learned cell bitmap with intensities in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

impl Template {
    /// Builds a template from a cell, scaling 8-bit intensities to `[0, 1]`
    /// unless the cell already is in that range.
    pub fn from_cell(cell: &GrayImage) -> Self {
        let scale = if cell.pixels().any(|p| p[0] > 1) {
            255.0
        } else {
            1.0
        };
        Self {
            width: cell.width(),
            height: cell.height(),
            pixels: cell.pixels().map(|p| p[0] as f32 / scale).collect(),
        }
    }

    pub fn same_shape(&self, other: &Template) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Sum of absolute per-pixel differences. Shapes must match.
    pub fn distance(&self, other: &Template) -> f32 {
        self.pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| (a - b).abs())
            .sum()
    }

    /// Template as an 8-bit image.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let v = self.pixels[(y * self.width + x) as usize];
            Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// Characters in the order they were first learned.
pub type CharTemplates = IndexMap<char, Vec<Template>>;

/// Templates per font style and character.
///
/// Lists only grow, and never hold two identical templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateLibrary {
    normal: CharTemplates,
    condensed: CharTemplates,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The library compiled into the binary.
    pub fn bundled() -> Result<Self> {
        bincode::deserialize(BUNDLED_LIBRARY).context("Bundled template library is corrupt")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| EngineError::LibraryRead {
            path: path.to_path_buf(),
            source,
        })?;
        let library: TemplateLibrary = bincode::deserialize_from(BufReader::new(file))
            .map_err(|source| EngineError::LibraryDecode {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "Loaded {} normal and {} condensed templates from {}",
            library.template_count(FontStyle::Normal),
            library.template_count(FontStyle::Condensed),
            path.display()
        );
        Ok(library)
    }

    /// Loads `path`, or the bundled library when no path is given.
    pub fn load_or_bundled(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::bundled(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)
            .with_context(|| format!("Failed to write template library {}", path.display()))?;
        writer.flush()?;

        info!(
            "Saved {} normal and {} condensed templates to {}",
            self.template_count(FontStyle::Normal),
            self.template_count(FontStyle::Condensed),
            path.display()
        );
        Ok(())
    }

    pub fn templates(&self, style: FontStyle) -> &CharTemplates {
        match style {
            FontStyle::Normal => &self.normal,
            FontStyle::Condensed => &self.condensed,
        }
    }

    /// Adds `template` for `ch` unless an identical one is already stored.
    /// Returns whether it was added.
    pub fn insert(&mut self, style: FontStyle, ch: char, template: Template) -> bool {
        let map = match style {
            FontStyle::Normal => &mut self.normal,
            FontStyle::Condensed => &mut self.condensed,
        };
        let list = map.entry(ch).or_default();
        if list.contains(&template) {
            return false;
        }
        list.push(template);
        true
    }

    pub fn template_count(&self, style: FontStyle) -> usize {
        self.templates(style).values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.condensed.is_empty()
    }

    /// Writes every template as a PNG into `dir`. Returns the number written.
    ///
    /// Files are named `<style>-<char index>-u<code point>-<template index>.png`.
    pub fn dump_images(&self, dir: &Path) -> Result<usize> {
        std::fs::create_dir_all(dir)?;
        let mut written = 0;
        for style in [FontStyle::Normal, FontStyle::Condensed] {
            for (i, (ch, templates)) in self.templates(style).iter().enumerate() {
                for (j, template) in templates.iter().enumerate() {
                    let name = format!("{}-{}-u{:04x}-{}.png", style, i, *ch as u32, j);
                    template
                        .to_image()
                        .save(dir.join(&name))
                        .with_context(|| format!("Failed to write {}", name))?;
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}
