use anyhow::Result;
use auslab_ocr::{
    Analysis, CaptureAnalyzer, FontStyle, GroundTruth, ProfileSet, SizeVariant, TemplateLibrary,
    capture::InvalidReason,
    convert::rgb_to_bgr,
    inspect::ImageDumpHook,
    profile::SizeClass,
};
use image::{Rgb, RgbImage};
use opencv::core::Mat;

const ALPHABET: &[u8] = b"ABCDEFGHIJ0123456789 ";

const WIDTH: u32 = 1010;
const HEIGHT: u32 = 740;

const CHROME: Rgb<u8> = Rgb([200, 200, 200]);
const INK: Rgb<u8> = Rgb([255, 255, 255]);
const GLYPH_HEIGHT: u32 = 23;

/// Where a synthetic capture puts things, in content coordinates unless
/// noted.
struct Layout {
    /// raw capture size
    width: u32,
    height: u32,
    /// window chrome widths: left, right, top, bottom
    chrome: [u32; 4],
    header_x: u32,
    header_y: u32,
    panel_y: u32,
    center_margin: u32,
    char_width: u32,
    condensed_char_width: u32,
    pitch: f32,
    center_chars: usize,
    condensed_center_chars: usize,
    icon_origin: (u32, u32),
    /// lit half of the bundled normal icon; the condensed one is its transpose
    icon_half: (u32, u32),
}

const NORMAL: Layout = Layout {
    width: WIDTH,
    height: HEIGHT,
    chrome: [4, 6, 30, 5],
    header_x: 56,
    header_y: 74,
    panel_y: 194,
    center_margin: 32,
    char_width: 12,
    condensed_char_width: 8,
    pitch: 30.0,
    center_chars: 79,
    condensed_center_chars: 125,
    icon_origin: (200, 675),
    icon_half: (12, 16),
};

const LARGE: Layout = Layout {
    width: 1265,
    height: 920,
    chrome: [3, 2, 38, 5],
    header_x: 70,
    header_y: 92,
    panel_y: 242,
    center_margin: 40,
    char_width: 15,
    condensed_char_width: 10,
    pitch: 37.5,
    center_chars: 80,
    condensed_center_chars: 126,
    icon_origin: (200, 845),
    icon_half: (15, 20),
};

/// Deterministic text, `chars` characters per line.
fn text(lines: usize, chars: usize, seed: usize) -> Vec<String> {
    (0..lines)
        .map(|i| {
            (0..chars)
                .map(|j| ALPHABET[(i * 7 + j * 2 + seed) % ALPHABET.len()] as char)
                .collect()
        })
        .collect()
}

/// Synthetic terminal capture.
///
/// Every character is a vertical bar plus a horizontal bar whose positions
/// depend on the character; spaces stay dark.
struct SyntheticCapture<'l> {
    layout: &'l Layout,
    image: RgbImage,
}

impl<'l> SyntheticCapture<'l> {
    fn new(layout: &'l Layout) -> Self {
        let [left, right, top, bottom] = layout.chrome;
        let (width, height) = (layout.width, layout.height);
        let image = RgbImage::from_fn(width, height, |x, y| {
            if x < left || x >= width - right || y < top || y >= height - bottom {
                CHROME
            } else {
                Rgb([0, 0, 0])
            }
        });
        Self { layout, image }
    }

    /// Sets a pixel in content coordinates.
    fn ink(&mut self, x: u32, y: u32) {
        let [left, _, top, _] = self.layout.chrome;
        self.image.put_pixel(left + x, top + y, INK);
    }

    fn glyph(&mut self, ch: char, x: u32, y: u32, cell_width: u32) {
        if ch == ' ' {
            return;
        }
        let idx = ALPHABET
            .iter()
            .position(|&c| c as char == ch)
            .expect("character outside the test alphabet") as u32;
        let col = idx % (cell_width - 2) + 1;
        let row = idx + 1;
        for dy in 0..GLYPH_HEIGHT {
            self.ink(x + col, y + dy);
        }
        for dx in 0..cell_width {
            self.ink(x + dx, y + row);
        }
    }

    fn line_y(&self, origin: u32, index: usize) -> u32 {
        origin + (index as f32 * self.layout.pitch).round() as u32
    }

    fn header(&mut self, lines: &[String]) {
        let (x_start, cell_width) = (self.layout.header_x, self.layout.char_width);
        for (i, line) in lines.iter().enumerate() {
            let y = self.line_y(self.layout.header_y, i);
            for (j, ch) in line.chars().enumerate() {
                self.glyph(ch, x_start + cell_width * j as u32, y, cell_width);
            }
        }
    }

    fn center(&mut self, lines: &[String], style: FontStyle) {
        let (x_start, cell_width) = match style {
            FontStyle::Normal => (self.layout.center_margin, self.layout.char_width),
            FontStyle::Condensed => (0, self.layout.condensed_char_width),
        };
        for (i, line) in lines.iter().enumerate() {
            let y = self.line_y(self.layout.panel_y, i);
            for (j, ch) in line.chars().enumerate() {
                self.glyph(ch, x_start + cell_width * j as u32, y, cell_width);
            }
        }
    }

    /// Paints the lit half of the bundled style icon into the footer.
    fn style_icon(&mut self, style: FontStyle) {
        let (half_w, full_h) = self.layout.icon_half;
        let (w, h) = match style {
            FontStyle::Normal => (half_w, full_h),
            FontStyle::Condensed => (half_w * 2, full_h / 2),
        };
        let (x0, y0) = self.layout.icon_origin;
        for y in 0..h {
            for x in 0..w {
                self.ink(x0 + x, y0 + y);
            }
        }
    }

    fn to_mat(&self) -> Mat {
        rgb_to_bgr(&self.image).unwrap()
    }
}

fn build_in(layout: &Layout, truth: &GroundTruth, style: FontStyle) -> Mat {
    let mut capture = SyntheticCapture::new(layout);
    capture.header(&truth.header);
    capture.center(&truth.center, style);
    capture.style_icon(style);
    capture.to_mat()
}

fn build(truth: &GroundTruth, style: FontStyle) -> Mat {
    build_in(&NORMAL, truth, style)
}

fn truth_in(layout: &Layout, style: FontStyle, seed: usize) -> GroundTruth {
    let center_chars = match style {
        FontStyle::Normal => layout.center_chars,
        FontStyle::Condensed => layout.condensed_center_chars,
    };
    GroundTruth {
        header: text(3, 77, seed),
        center: text(16, center_chars, seed + 5),
    }
}

fn truth(style: FontStyle, seed: usize) -> GroundTruth {
    truth_in(&NORMAL, style, seed)
}

fn analyzer() -> CaptureAnalyzer {
    CaptureAnalyzer::new(ProfileSet::bundled().unwrap(), TemplateLibrary::new())
}

fn recognized(analysis: Analysis) -> auslab_ocr::RecognizedCapture {
    match analysis {
        Analysis::Recognized(capture) => capture,
        Analysis::NotAuslab(rejection) => panic!("capture rejected: {:?}", rejection),
    }
}

#[test]
fn test_untrained_library_marks_ink_unrecognized() -> Result<()> {
    let truth = truth(FontStyle::Normal, 0);
    let capture = recognized(analyzer().analyze(build(&truth, FontStyle::Normal))?);

    assert_eq!(capture.variant, SizeVariant::Normal);
    assert_eq!(capture.style, FontStyle::Normal);
    assert_eq!((capture.crop.width(), capture.crop.height()), (1000, 705));
    assert_eq!(capture.header.len(), 3);
    assert_eq!(capture.center.len(), 16);

    for (line, expected) in capture.lines().zip(truth.header.iter().chain(&truth.center)) {
        let masked: String = expected
            .chars()
            .map(|c| if c == ' ' { ' ' } else { 'x' })
            .collect();
        assert_eq!(line, masked);
    }
    Ok(())
}

#[test]
fn test_trained_library_reads_new_capture() -> Result<()> {
    let mut analyzer = analyzer();
    let training = truth(FontStyle::Normal, 0);
    let report = analyzer.train(build(&training, FontStyle::Normal), &training)?;
    // 20 glyphs plus the blank cell
    assert_eq!(report.normal_added, ALPHABET.len());
    assert_eq!(report.condensed_added, 0);

    let unseen = truth(FontStyle::Normal, 11);
    let capture = recognized(analyzer.analyze(build(&unseen, FontStyle::Normal))?);
    assert_eq!(capture.header, unseen.header);
    assert_eq!(capture.center, unseen.center);
    Ok(())
}

#[test]
fn test_training_is_idempotent() -> Result<()> {
    let mut analyzer = analyzer();
    let training = truth(FontStyle::Normal, 3);
    analyzer.train(build(&training, FontStyle::Normal), &training)?;
    let before = analyzer.library().clone();

    let report = analyzer.train(build(&training, FontStyle::Normal), &training)?;
    assert_eq!(report.total(), 0);
    assert_eq!(analyzer.library(), &before);
    Ok(())
}

#[test]
fn test_condensed_capture() -> Result<()> {
    let mut analyzer = analyzer();
    let training = truth(FontStyle::Condensed, 2);
    let report = analyzer.train(build(&training, FontStyle::Condensed), &training)?;
    // header always trains the normal style
    assert_eq!(report.normal_added, ALPHABET.len());
    assert_eq!(report.condensed_added, ALPHABET.len());

    let unseen = truth(FontStyle::Condensed, 8);
    let capture = recognized(analyzer.analyze(build(&unseen, FontStyle::Condensed))?);
    assert_eq!(capture.style, FontStyle::Condensed);
    assert_eq!(capture.center[0].chars().count(), 125);
    assert_eq!(capture.header, unseen.header);
    assert_eq!(capture.center, unseen.center);
    Ok(())
}

#[test]
fn test_library_survives_save_and_load() -> Result<()> {
    let mut trainer = analyzer();
    let training = truth(FontStyle::Normal, 1);
    trainer.train(build(&training, FontStyle::Normal), &training)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("templates.bin");
    trainer.into_library().save(&path)?;

    let reader = CaptureAnalyzer::from_paths(None, Some(&path))?;
    let unseen = truth(FontStyle::Normal, 4);
    let capture = recognized(reader.analyze(build(&unseen, FontStyle::Normal))?);
    assert_eq!(capture.center, unseen.center);
    Ok(())
}

#[test]
fn test_short_ground_truth_is_rejected() -> Result<()> {
    let mut analyzer = analyzer();
    let mut training = truth(FontStyle::Normal, 0);
    let image = build(&training, FontStyle::Normal);
    training.center.truncate(10);

    assert!(analyzer.train(image, &training).is_err());
    assert!(analyzer.library().is_empty());
    Ok(())
}

#[test]
fn test_rejects_wrong_size() -> Result<()> {
    let image = rgb_to_bgr(&RgbImage::new(800, 600))?;
    match analyzer().analyze(image)? {
        Analysis::NotAuslab(rejection) => {
            assert_eq!(rejection.size_class, SizeClass::Invalid);
            assert_eq!(
                rejection.reason,
                InvalidReason::UnknownSize {
                    width: 800,
                    height: 600
                }
            );
        }
        Analysis::Recognized(_) => panic!("800x600 capture must be rejected"),
    }
    Ok(())
}

#[test]
fn test_rejects_bright_capture() -> Result<()> {
    let image = rgb_to_bgr(&RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([240, 240, 240])))?;
    let analysis = analyzer().analyze(image)?;
    assert!(matches!(
        analysis,
        Analysis::NotAuslab(rejection)
            if rejection.size_class == SizeClass::Normal
                && matches!(rejection.reason, InvalidReason::TooLittleBackground { .. })
    ));

    let mut analyzer = analyzer();
    let image = rgb_to_bgr(&RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([240, 240, 240])))?;
    assert!(analyzer.train(image, &GroundTruth::default()).is_err());
    Ok(())
}

#[test]
fn test_dump_hook_sees_every_line() -> Result<()> {
    let truth = truth(FontStyle::Normal, 0);
    let dir = tempfile::tempdir()?;
    let mut hook = ImageDumpHook::new(dir.path())?;
    analyzer().analyze_with(build(&truth, FontStyle::Normal), &mut hook)?;

    // three regions, three header lines, sixteen center lines
    assert_eq!(hook.written(), 3 + 3 + 16);
    let header = image::open(dir.path().join("header.png"))?.to_luma8();
    assert_eq!(header.dimensions(), (924, 83));
    assert!(dir.path().join("center-15.png").exists());
    Ok(())
}

#[test]
fn test_large_capture_untrained() -> Result<()> {
    let truth = truth_in(&LARGE, FontStyle::Normal, 0);
    let capture = recognized(analyzer().analyze(build_in(&LARGE, &truth, FontStyle::Normal))?);

    assert_eq!(capture.variant, SizeVariant::Large);
    assert_eq!(capture.style, FontStyle::Normal);
    assert_eq!((capture.crop.width(), capture.crop.height()), (1260, 877));
    assert_eq!(capture.header.len(), 3);
    assert!(capture.header.iter().all(|l| l.chars().count() == 77));
    assert_eq!(capture.center.len(), 16);
    assert!(capture.center.iter().all(|l| l.chars().count() == 80));
    Ok(())
}

#[test]
fn test_large_capture_round_trip() -> Result<()> {
    let mut analyzer = analyzer();
    let training = truth_in(&LARGE, FontStyle::Normal, 0);
    let report = analyzer.train(build_in(&LARGE, &training, FontStyle::Normal), &training)?;
    assert_eq!(report.normal_added, ALPHABET.len());
    let template = &analyzer.library().templates(FontStyle::Normal)[&'A'][0];
    assert_eq!((template.width, template.height), (15, 29));

    let unseen = truth_in(&LARGE, FontStyle::Normal, 6);
    let capture = recognized(analyzer.analyze(build_in(&LARGE, &unseen, FontStyle::Normal))?);
    assert_eq!(capture.header, unseen.header);
    assert_eq!(capture.center, unseen.center);
    Ok(())
}

#[test]
fn test_large_condensed_capture() -> Result<()> {
    let mut analyzer = analyzer();
    let training = truth_in(&LARGE, FontStyle::Condensed, 1);
    analyzer.train(build_in(&LARGE, &training, FontStyle::Condensed), &training)?;

    let unseen = truth_in(&LARGE, FontStyle::Condensed, 9);
    let capture = recognized(analyzer.analyze(build_in(&LARGE, &unseen, FontStyle::Condensed))?);
    assert_eq!(capture.variant, SizeVariant::Large);
    assert_eq!(capture.style, FontStyle::Condensed);
    assert_eq!(capture.center, unseen.center);
    Ok(())
}
