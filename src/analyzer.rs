use crate::capture::{self, CropBox, InvalidReason, Validation};
use crate::inspect::{InspectHook, NoInspect};
use crate::library::TemplateLibrary;
use crate::lines::{self, LineImage};
use crate::profile::{ProfileConfig, ProfileSet, SizeClass, SizeVariant};
use crate::recognizer::{Recognizer, TrainingReport};
use crate::segment::{ContentArea, FontStyle, Region};
use anyhow::{Context, Result};
use log::{debug, info};
use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Known text of a capture, one string per header and center line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub header: Vec<String>,
    pub center: Vec<String>,
}

impl GroundTruth {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ground truth {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid ground truth {}", path.display()))
    }
}

/// Why a capture was not processed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rejection {
    pub size_class: SizeClass,
    pub reason: InvalidReason,
}

/// A capture cut into lines, ready for recognition or training.
pub struct SegmentedCapture {
    pub variant: SizeVariant,
    pub crop: CropBox,
    pub area: ContentArea,
    pub header_lines: Vec<LineImage>,
    pub center_lines: Vec<LineImage>,
}

pub enum Segmentation {
    NotAuslab(Rejection),
    Segmented(SegmentedCapture),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedCapture {
    pub variant: SizeVariant,
    pub style: FontStyle,
    pub crop: CropBox,
    pub header: Vec<String>,
    pub center: Vec<String>,
    pub elapsed: Duration,
}

impl RecognizedCapture {
    /// Header lines followed by center lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.header.iter().chain(&self.center).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// Not a capture of the terminal; a normal outcome, not a fault.
    NotAuslab(Rejection),
    Recognized(RecognizedCapture),
}

/// Runs the whole pipeline on raw captures.
///
/// Owns the layout profiles and the recognizer with its template library.
pub struct CaptureAnalyzer {
    profiles: ProfileSet,
    recognizer: Recognizer,
}

impl CaptureAnalyzer {
    pub fn new(profiles: ProfileSet, library: TemplateLibrary) -> Self {
        Self {
            profiles,
            recognizer: Recognizer::new(library),
        }
    }

    /// Loads profiles and templates, falling back to the bundled ones for
    /// missing paths.
    pub fn from_paths(profiles: Option<&Path>, templates: Option<&Path>) -> Result<Self> {
        let config = match profiles {
            Some(path) => ProfileConfig::load(path)?,
            None => ProfileConfig::default(),
        };
        let profiles = ProfileSet::from_config(config)?;
        let library = TemplateLibrary::load_or_bundled(templates)?;
        Ok(Self::new(profiles, library))
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    pub fn recognizer(&self) -> &Recognizer {
        &self.recognizer
    }

    pub fn library(&self) -> &TemplateLibrary {
        self.recognizer.library()
    }

    pub fn into_library(self) -> TemplateLibrary {
        self.recognizer.into_library()
    }

    /// Validates, crops and splits a capture into lines.
    pub fn segment(&self, image: Mat, hook: &mut dyn InspectHook) -> Result<Segmentation> {
        let cropped = match capture::validate(image, &self.profiles)? {
            Validation::Valid(cropped) => cropped,
            Validation::Invalid { size_class, reason } => {
                return Ok(Segmentation::NotAuslab(Rejection { size_class, reason }));
            }
        };

        let profile = cropped.profile;
        let geometry = &profile.geometry;
        let area = ContentArea::segment(&cropped.image, geometry, &profile.icons)?;
        hook.on_region(Region::Header, &area.header);
        hook.on_region(Region::Center, &area.center);
        hook.on_region(Region::Footer, &area.footer);

        let header_lines = lines::header_lines(&area.header, geometry);
        let center_lines = lines::center_lines(&area.center, area.style, geometry);
        debug!(
            "{} capture, {} style, {} header and {} center lines",
            profile.variant,
            area.style,
            header_lines.len(),
            center_lines.len()
        );

        Ok(Segmentation::Segmented(SegmentedCapture {
            variant: profile.variant,
            crop: cropped.crop,
            area,
            header_lines,
            center_lines,
        }))
    }

    pub fn analyze(&self, image: Mat) -> Result<Analysis> {
        self.analyze_with(image, &mut NoInspect)
    }

    /// Recognizes every header and center line of a capture.
    pub fn analyze_with(&self, image: Mat, hook: &mut dyn InspectHook) -> Result<Analysis> {
        let now = Instant::now();
        let segmented = match self.segment(image, hook)? {
            Segmentation::Segmented(segmented) => segmented,
            Segmentation::NotAuslab(rejection) => return Ok(Analysis::NotAuslab(rejection)),
        };

        let mut recognize = |region: Region, region_lines: &[LineImage]| -> Vec<String> {
            region_lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let text = self.recognizer.recognize_line(line);
                    hook.on_line(region, i, line, Some(text.as_str()));
                    text
                })
                .collect()
        };
        let header = recognize(Region::Header, &segmented.header_lines);
        let center = recognize(Region::Center, &segmented.center_lines);

        let elapsed = now.elapsed();
        debug!("Recognized {} lines in {:?}", header.len() + center.len(), elapsed);

        Ok(Analysis::Recognized(RecognizedCapture {
            variant: segmented.variant,
            style: segmented.area.style,
            crop: segmented.crop,
            header,
            center,
            elapsed,
        }))
    }

    /// Segments a capture and learns its cells from `truth`.
    ///
    /// Training data must be a valid capture, so a rejected capture is an
    /// error here.
    pub fn train(&mut self, image: Mat, truth: &GroundTruth) -> Result<TrainingReport> {
        let segmented = match self.segment(image, &mut NoInspect)? {
            Segmentation::Segmented(segmented) => segmented,
            Segmentation::NotAuslab(rejection) => {
                anyhow::bail!("Not an AUSLAB capture: {:?}", rejection.reason)
            }
        };

        let report = self.recognizer.train(
            &segmented.header_lines,
            &truth.header,
            &segmented.center_lines,
            &truth.center,
        )?;
        info!(
            "Learned {} normal and {} condensed templates",
            report.normal_added, report.condensed_added
        );
        Ok(report)
    }
}
