// Layout geometry for the supported capture sizes

use crate::consts::{
    BINARY_THRESHOLD, LARGE_MIN_HEIGHT, LARGE_MIN_WIDTH, MIN_DARK_PERCENTAGE, NORMAL_MIN_HEIGHT,
    NORMAL_MIN_WIDTH,
};
use crate::segment::FontStyle;
use anyhow::{Context, Result};
use include_directory::{Dir, include_directory};
use opencv::{
    core::Mat,
    imgcodecs::{self, IMREAD_GRAYSCALE},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

static ICON_DIR: Dir<'_> = include_directory!("$CARGO_MANIFEST_DIR/assets/icons");

/// Known capture resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeVariant {
    Normal,
    /// Roughly 125% of `Normal`, with fractional line metrics.
    Large,
}

impl SizeVariant {
    pub const ALL: [SizeVariant; 2] = [SizeVariant::Normal, SizeVariant::Large];

    fn icon_dir(self) -> &'static str {
        match self {
            SizeVariant::Normal => "normal",
            SizeVariant::Large => "large",
        }
    }
}

impl fmt::Display for SizeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeVariant::Normal => write!(f, "normal"),
            SizeVariant::Large => write!(f, "large"),
        }
    }
}

/// Result of the size check of a raw capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeClass {
    Normal,
    Large,
    Invalid,
}

impl SizeClass {
    pub fn variant(self) -> Option<SizeVariant> {
        match self {
            SizeClass::Normal => Some(SizeVariant::Normal),
            SizeClass::Large => Some(SizeVariant::Large),
            SizeClass::Invalid => None,
        }
    }
}

impl From<SizeVariant> for SizeClass {
    fn from(variant: SizeVariant) -> Self {
        match variant {
            SizeVariant::Normal => SizeClass::Normal,
            SizeVariant::Large => SizeClass::Large,
        }
    }
}

/// Pixel geometry of one size variant.
///
/// All y/x bounds are in content-area coordinates, i.e. after the window
/// chrome has been cropped. Header bounds are inclusive, the central panel end
/// is exclusive and the footer starts one row below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub min_width: u32,
    pub min_height: u32,
    pub width_slack: u32,
    pub height_slack: u32,

    /// Row of the raw capture scanned for the left and right chrome edge.
    pub border_scan_row: u32,
    /// Column of the raw capture scanned for the top and bottom chrome edge.
    pub border_scan_column: u32,
    /// BGR channel compared against `border_error_margin`.
    pub border_channel: usize,
    pub border_error_margin: u8,

    pub header_x_start: u32,
    pub header_x_end: u32,
    pub header_y_start: u32,
    pub header_y_end: u32,
    pub header_char_count: usize,
    pub header_line_count: usize,

    pub central_panel_y_start: u32,
    pub central_panel_y_end: u32,

    pub line_height: f32,
    pub line_spacing: f32,
    /// Height of a center line strip.
    pub condensed_line_height: f32,
    pub char_width: u32,
    pub condensed_char_width: u32,

    /// Side margins of center lines in the normal style. Condensed lines use
    /// the full panel width.
    pub center_margin_left: u32,
    pub center_margin_right: u32,

    pub binary_threshold: u8,
    pub min_dark_percentage: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_icon: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condensed_icon: Option<PathBuf>,
}

impl Geometry {
    pub fn normal() -> Self {
        Self {
            min_width: NORMAL_MIN_WIDTH,
            min_height: NORMAL_MIN_HEIGHT,
            width_slack: 20,
            height_slack: 50,
            border_scan_row: 60,
            border_scan_column: 15,
            border_channel: 0,
            border_error_margin: 0,
            header_x_start: 56,
            header_x_end: 979,
            header_y_start: 74,
            header_y_end: 156,
            header_char_count: 77,
            header_line_count: 3,
            central_panel_y_start: 194,
            central_panel_y_end: 668,
            line_height: 23.0,
            line_spacing: 7.0,
            condensed_line_height: 23.0,
            char_width: 12,
            condensed_char_width: 8,
            center_margin_left: 32,
            center_margin_right: 16,
            binary_threshold: BINARY_THRESHOLD,
            min_dark_percentage: MIN_DARK_PERCENTAGE,
            normal_icon: None,
            condensed_icon: None,
        }
    }

    pub fn large() -> Self {
        Self {
            min_width: LARGE_MIN_WIDTH,
            min_height: LARGE_MIN_HEIGHT,
            width_slack: 25,
            height_slack: 50,
            border_scan_row: 75,
            border_scan_column: 19,
            border_channel: 0,
            border_error_margin: 0,
            header_x_start: 70,
            header_x_end: 1224,
            header_y_start: 92,
            header_y_end: 195,
            header_char_count: 77,
            header_line_count: 3,
            central_panel_y_start: 242,
            central_panel_y_end: 835,
            line_height: 28.75,
            line_spacing: 8.75,
            condensed_line_height: 28.75,
            char_width: 15,
            condensed_char_width: 10,
            center_margin_left: 40,
            center_margin_right: 20,
            binary_threshold: BINARY_THRESHOLD,
            min_dark_percentage: MIN_DARK_PERCENTAGE,
            normal_icon: None,
            condensed_icon: None,
        }
    }

    /// Distance from one line origin to the next.
    pub fn line_pitch(&self) -> f32 {
        self.line_height + self.line_spacing
    }

    pub fn cell_width(&self, style: FontStyle) -> u32 {
        match style {
            FontStyle::Normal => self.char_width,
            FontStyle::Condensed => self.condensed_char_width,
        }
    }

    /// Largest template distance the classifier will accept.
    pub fn distance_ceiling(&self) -> f32 {
        self.char_width as f32 * self.condensed_line_height
    }

    /// Whether a raw capture of this size falls into the acceptance window.
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        width >= self.min_width
            && width < self.min_width + self.width_slack
            && height >= self.min_height
            && height < self.min_height + self.height_slack
    }
}

/// Profile document: one geometry per size variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub normal: Geometry,
    pub large: Geometry,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            normal: Geometry::normal(),
            large: Geometry::large(),
        }
    }
}

impl ProfileConfig {
    /// Load a JSON profile document. Relative icon paths are resolved against
    /// the directory of the document.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile document {}", path.display()))?;
        let mut config: ProfileConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid profile document {}", path.display()))?;

        if let Some(base) = path.parent() {
            for geometry in [&mut config.normal, &mut config.large] {
                for icon in [&mut geometry.normal_icon, &mut geometry.condensed_icon] {
                    if let Some(p) = icon.as_mut().filter(|p| p.is_relative()) {
                        *p = base.join(&*p);
                    }
                }
            }
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn geometry(&self, variant: SizeVariant) -> &Geometry {
        match variant {
            SizeVariant::Normal => &self.normal,
            SizeVariant::Large => &self.large,
        }
    }
}

/// Grayscale reference icons shown in the footer for each font style.
pub struct StyleIcons {
    pub normal: Mat,
    pub condensed: Mat,
}

impl StyleIcons {
    /// Icons compiled into the binary for a size variant.
    pub fn bundled(variant: SizeVariant) -> Result<Self> {
        let dir = variant.icon_dir();
        Ok(Self {
            normal: Self::bundled_icon(&format!("{dir}/f1_normal.png"))?,
            condensed: Self::bundled_icon(&format!("{dir}/f1_condensed.png"))?,
        })
    }

    pub fn from_files(normal: &Path, condensed: &Path) -> Result<Self> {
        Ok(Self {
            normal: Self::load_icon(normal)?,
            condensed: Self::load_icon(condensed)?,
        })
    }

    fn load_icon(path: &Path) -> Result<Mat> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read icon {}", path.display()))?;
        Self::decode(&data).with_context(|| format!("Failed to load icon {}", path.display()))
    }

    fn bundled_icon(path: &str) -> Result<Mat> {
        let file = ICON_DIR
            .get_file(path)
            .ok_or_else(|| anyhow::anyhow!("Bundled icon '{}' is missing", path))?;
        Self::decode(file.contents())
    }

    fn decode(data: &[u8]) -> Result<Mat> {
        let mat = imgcodecs::imdecode(&Mat::from_slice(data)?, IMREAD_GRAYSCALE)?;
        if mat.empty() {
            anyhow::bail!("Icon data could not be decoded");
        }
        Ok(mat)
    }
}

/// Geometry plus icons of one size variant, ready for use.
pub struct LayoutProfile {
    pub variant: SizeVariant,
    pub geometry: Geometry,
    pub icons: StyleIcons,
}

impl LayoutProfile {
    /// Builds the profile, loading icons from the geometry's paths or the
    /// bundled set when no paths are configured.
    pub fn load(variant: SizeVariant, geometry: Geometry) -> Result<Self> {
        let icons = match (&geometry.normal_icon, &geometry.condensed_icon) {
            (Some(normal), Some(condensed)) => StyleIcons::from_files(normal, condensed)?,
            (None, None) => StyleIcons::bundled(variant)?,
            _ => anyhow::bail!(
                "The {} profile must configure both icon paths or neither",
                variant
            ),
        };
        Ok(Self {
            variant,
            geometry,
            icons,
        })
    }
}

/// One profile per size variant.
pub struct ProfileSet {
    normal: LayoutProfile,
    large: LayoutProfile,
}

impl ProfileSet {
    pub fn new(normal: LayoutProfile, large: LayoutProfile) -> Self {
        Self { normal, large }
    }

    pub fn from_config(config: ProfileConfig) -> Result<Self> {
        Ok(Self {
            normal: LayoutProfile::load(SizeVariant::Normal, config.normal)?,
            large: LayoutProfile::load(SizeVariant::Large, config.large)?,
        })
    }

    /// Built-in geometry with bundled icons.
    pub fn bundled() -> Result<Self> {
        Self::from_config(ProfileConfig::default())
    }

    pub fn get(&self, variant: SizeVariant) -> &LayoutProfile {
        match variant {
            SizeVariant::Normal => &self.normal,
            SizeVariant::Large => &self.large,
        }
    }

    pub fn classify_size(&self, width: u32, height: u32) -> SizeClass {
        SizeVariant::ALL
            .into_iter()
            .find(|&v| self.get(v).geometry.accepts(width, height))
            .map(SizeClass::from)
            .unwrap_or(SizeClass::Invalid)
    }
}
