// Nearest-neighbour character recognition and training

use crate::consts::{BLANK_CHAR, UNRECOGNIZED_CHAR};
use crate::error::EngineError;
use crate::library::{Template, TemplateLibrary};
use crate::lines::LineImage;
use crate::segment::{FontStyle, Region};
use anyhow::Result;
use image::GrayImage;
use log::debug;

/// Templates added by one training pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrainingReport {
    pub normal_added: usize,
    pub condensed_added: usize,
}

impl TrainingReport {
    pub fn total(&self) -> usize {
        self.normal_added + self.condensed_added
    }
}

/// Classifies character cells against a [`TemplateLibrary`] and grows it
/// from ground truth.
pub struct Recognizer {
    library: TemplateLibrary,
}

impl Recognizer {
    pub fn new(library: TemplateLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    pub fn into_library(self) -> TemplateLibrary {
        self.library
    }

    /// Best matching character for one cell.
    ///
    /// Cells without ink are spaces. Otherwise the template with the smallest
    /// sum of absolute differences wins if it is strictly below `ceiling`;
    /// on equal distance the character learned first wins. Nothing below the
    /// ceiling yields [`UNRECOGNIZED_CHAR`].
    pub fn classify(&self, cell: &GrayImage, style: FontStyle, ceiling: f32) -> char {
        let cell = Template::from_cell(cell);
        if cell.pixels.iter().all(|&v| v != 0.0) {
            return BLANK_CHAR;
        }

        let mut best = UNRECOGNIZED_CHAR;
        let mut min_distance = ceiling;
        for (&ch, templates) in self.library.templates(style) {
            for template in templates.iter().filter(|t| t.same_shape(&cell)) {
                let distance = cell.distance(template);
                if distance < min_distance {
                    best = ch;
                    min_distance = distance;
                }
            }
        }
        best
    }

    /// Text of a line, one character per cell.
    pub fn recognize_line(&self, line: &LineImage) -> String {
        line.cells()
            .map(|cell| self.classify(&cell, line.style, line.distance_ceiling))
            .collect()
    }

    /// Learns every cell of the given lines from parallel ground-truth
    /// strings. Character `j` of a truth string labels cell `j`.
    ///
    /// Header lines train normal templates, center lines train templates of
    /// their own style. Truth is checked for every line before the library
    /// is touched.
    pub fn train<S: AsRef<str>>(
        &mut self,
        header: &[LineImage],
        header_truth: &[S],
        center: &[LineImage],
        center_truth: &[S],
    ) -> Result<TrainingReport> {
        let header_truth = check_truth(Region::Header, header, header_truth)?;
        let center_truth = check_truth(Region::Center, center, center_truth)?;

        let mut report = TrainingReport::default();
        let header_pairs = header.iter().zip(header_truth).map(|(l, t)| (l, FontStyle::Normal, t));
        let center_pairs = center.iter().zip(center_truth).map(|(l, t)| (l, l.style, t));

        for (line, style, truth) in header_pairs.chain(center_pairs) {
            for (cell, ch) in line.cells().zip(truth) {
                if self.library.insert(style, ch, Template::from_cell(&cell)) {
                    debug!("Learned new {} '{}'", style, ch);
                    match style {
                        FontStyle::Normal => report.normal_added += 1,
                        FontStyle::Condensed => report.condensed_added += 1,
                    }
                }
            }
        }
        Ok(report)
    }
}

/// Ground truth as character vectors, one per line, validated against the
/// line geometry.
fn check_truth<S: AsRef<str>>(
    region: Region,
    lines: &[LineImage],
    truth: &[S],
) -> Result<Vec<Vec<char>>> {
    if truth.len() < lines.len() {
        return Err(EngineError::TruthLineCount {
            region,
            expected: lines.len(),
            got: truth.len(),
        }
        .into());
    }

    lines
        .iter()
        .zip(truth)
        .enumerate()
        .map(|(i, (line, text))| {
            let chars: Vec<char> = text.as_ref().chars().collect();
            if chars.len() < line.char_count {
                return Err(EngineError::TruthLineLength {
                    region,
                    line: i,
                    expected: line.char_count,
                    got: chars.len(),
                }
                .into());
            }
            Ok(chars)
        })
        .collect()
}
