//! Recognition engine for AUSLAB terminal screen captures.
//!
//! A capture is validated and cropped, split into header, center and footer
//! regions, cut into fixed-width character cells and every cell is matched
//! against a library of learned templates.

pub mod consts {
    /// Returned for a cell with ink that no template matches.
    pub const UNRECOGNIZED_CHAR: char = 'x';
    /// Returned for a cell without any ink.
    pub const BLANK_CHAR: char = ' ';

    /// Inverted grayscale values above this count as background.
    pub const BINARY_THRESHOLD: u8 = 240;
    /// Minimum share of background pixels for a capture to be accepted.
    pub const MIN_DARK_PERCENTAGE: f64 = 80.0;

    pub const NORMAL_MIN_WIDTH: u32 = 1008;
    pub const NORMAL_MIN_HEIGHT: u32 = 730;
    pub const LARGE_MIN_WIDTH: u32 = 1260;
    pub const LARGE_MIN_HEIGHT: u32 = 912;
}

pub mod analyzer;
pub mod capture;
pub mod convert;
pub mod error;
pub mod inspect;
pub mod library;
pub mod lines;
pub mod profile;
pub mod recognizer;
pub mod segment;
pub mod worker;

pub use analyzer::{Analysis, CaptureAnalyzer, GroundTruth, RecognizedCapture};
pub use error::EngineError;
pub use library::TemplateLibrary;
pub use profile::{LayoutProfile, ProfileConfig, ProfileSet, SizeVariant};
pub use recognizer::Recognizer;
pub use segment::FontStyle;
