use anyhow::{Context, Result};
use auslab_ocr::{
    Analysis, CaptureAnalyzer, GroundTruth, ProfileConfig, TemplateLibrary,
    inspect::ImageDumpHook,
    worker::{CaptureJob, CaptureProcessor},
};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use opencv::{
    core::Mat,
    imgcodecs::{self, IMREAD_COLOR},
    prelude::*,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// AUSLAB OCR - text recognition for AUSLAB terminal screen captures
#[derive(Parser, Debug)]
#[command(name = "auslab_ocr")]
#[command(about = "Recognize text in AUSLAB terminal captures", long_about = None)]
struct Args {
    /// Template library (bincode); the bundled library is used when omitted
    #[arg(short = 't', long, global = true)]
    templates: Option<PathBuf>,

    /// Layout profile document (JSON), see the `profiles` command
    #[arg(short = 'p', long, global = true)]
    profiles: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the text of a capture
    Recognize {
        image: PathBuf,

        /// Write region and line images into this directory
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },
    /// Learn templates from a capture with known text
    Train {
        image: PathBuf,

        /// JSON file with `header` and `center` line arrays
        #[arg(long)]
        truth: PathBuf,

        /// Where to save the grown library
        #[arg(short = 'o', long)]
        output: PathBuf,
    },
    /// Recognize every image of a directory on a worker thread
    Batch { dir: PathBuf },
    /// Write every template of the library as PNG
    DumpTemplates { dir: PathBuf },
    /// Print the built-in layout profiles as JSON
    Profiles,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter(None, log::LevelFilter::Info)
        .filter(Some("auslab_ocr"), log::LevelFilter::Debug)
        .init();

    let args = Args::parse();
    let templates = args.templates.as_deref();
    let profiles = args.profiles.as_deref();

    match args.command {
        Command::Recognize { image, dump_dir } => {
            let analyzer = CaptureAnalyzer::from_paths(profiles, templates)?;
            let capture = load_image(&image)?;
            let analysis = match dump_dir {
                Some(dir) => {
                    let mut hook = ImageDumpHook::new(dir)?;
                    let analysis = analyzer.analyze_with(capture, &mut hook)?;
                    info!("Wrote {} inspection images", hook.written());
                    analysis
                }
                None => analyzer.analyze(capture)?,
            };
            print_analysis(&image, &analysis);
        }
        Command::Train {
            image,
            truth,
            output,
        } => {
            let mut analyzer = CaptureAnalyzer::from_paths(profiles, templates)?;
            let truth = GroundTruth::load(&truth)?;
            let report = analyzer.train(load_image(&image)?, &truth)?;
            println!(
                "Added {} normal and {} condensed templates",
                report.normal_added, report.condensed_added
            );
            analyzer.into_library().save(&output)?;
        }
        Command::Batch { dir } => {
            let analyzer = CaptureAnalyzer::from_paths(profiles, templates)?;
            run_batch(analyzer, &dir)?;
        }
        Command::DumpTemplates { dir } => {
            let library = TemplateLibrary::load_or_bundled(templates)?;
            let written = library.dump_images(&dir)?;
            println!("Wrote {} templates to {}", written, dir.display());
        }
        Command::Profiles => {
            let config = match profiles {
                Some(path) => ProfileConfig::load(path)?,
                None => ProfileConfig::default(),
            };
            println!("{}", config.to_json()?);
        }
    }

    Ok(())
}

fn load_image(path: &Path) -> Result<Mat> {
    let path_str = path
        .to_str()
        .with_context(|| format!("Non UTF-8 path {}", path.display()))?;
    let img = imgcodecs::imread(path_str, IMREAD_COLOR)?;
    if img.empty() {
        anyhow::bail!("Failed to load image from {}", path.display());
    }
    Ok(img)
}

fn print_analysis(source: &Path, analysis: &Analysis) {
    match analysis {
        Analysis::Recognized(capture) => {
            info!(
                "{}: {} capture, {} style, {} ms",
                source.display(),
                capture.variant,
                capture.style,
                capture.elapsed.as_millis()
            );
            for line in capture.lines() {
                println!("{}", line);
            }
        }
        Analysis::NotAuslab(rejection) => {
            println!("{}: not an AUSLAB capture ({:?})", source.display(), rejection.reason);
        }
    }
}

fn run_batch(analyzer: CaptureAnalyzer, dir: &Path) -> Result<()> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();
    info!("Found {} images in {}", paths.len(), dir.display());

    let (job_tx, job_rx) = mpsc::sync_channel::<CaptureJob>(2);
    let (result_tx, result_rx) = mpsc::channel();
    let processor = CaptureProcessor::new(analyzer);
    let handle = thread::spawn(move || processor.start_processing(job_rx, result_tx));

    let feeder = thread::spawn(move || {
        for path in paths {
            let image = match load_image(&path) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    continue;
                }
            };
            if job_tx.send(CaptureJob { source: path, image }).is_err() {
                break;
            }
        }
    });

    for processed in result_rx {
        match processed.result {
            Ok(analysis) => print_analysis(&processed.source, &analysis),
            Err(e) => error!("{}: {:#}", processed.source.display(), e),
        }
    }

    if feeder.join().is_err() {
        anyhow::bail!("Image loader thread panicked");
    }
    let stats = handle
        .join()
        .map_err(|_| anyhow::anyhow!("Capture processor thread panicked"))?;
    info!(
        "Batch done: {} recognized, {} rejected, {} failed",
        stats.recognized, stats.rejected, stats.failed
    );
    Ok(())
}
