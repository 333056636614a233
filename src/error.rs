use std::path::PathBuf;
use thiserror::Error;

use crate::segment::Region;

/// Failures callers may want to tell apart from plain `anyhow` errors.
///
/// Engine functions return `anyhow::Result`; these variants can be recovered
/// with `err.downcast_ref::<EngineError>()`.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The border scan left the bitmap before reaching the dark interior.
    #[error(
        "border scan ran off a {width}x{height} capture (x {x_min}..={x_max}, y {y_min}..={y_max})"
    )]
    GeometryOverrun {
        x_min: i64,
        x_max: i64,
        y_min: i64,
        y_max: i64,
        width: u32,
        height: u32,
    },

    #[error("failed to read template library {path}: {source}")]
    LibraryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode template library {path}: {source}")]
    LibraryDecode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("ground truth has {got} {region} lines, capture has {expected}")]
    TruthLineCount {
        region: Region,
        expected: usize,
        got: usize,
    },

    #[error("ground truth for {region} line {line} has {got} characters, capture has {expected}")]
    TruthLineLength {
        region: Region,
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("unsupported pixel layout: {channels} channels with depth {depth}")]
    UnsupportedPixelFormat { channels: i32, depth: i32 },
}
