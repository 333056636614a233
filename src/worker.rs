use crate::analyzer::{Analysis, CaptureAnalyzer};
use anyhow::Result;
use log::{debug, error, info};
use opencv::core::Mat;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};

/// A raw capture waiting for recognition.
pub struct CaptureJob {
    pub source: PathBuf,
    pub image: Mat,
}

/// Outcome of one job. Failures are reported per capture and do not stop
/// the worker.
pub struct ProcessedCapture {
    pub source: PathBuf,
    pub result: Result<Analysis>,
}

/// Counters of a finished worker run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorStats {
    pub received: u64,
    pub recognized: u64,
    pub rejected: u64,
    pub failed: u64,
}

/// Capture processor that runs on its own thread
pub struct CaptureProcessor {
    analyzer: CaptureAnalyzer,
}

impl CaptureProcessor {
    pub fn new(analyzer: CaptureAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Analyze captures from `job_rx` until it closes and send every result
    /// to `result_tx`. Stops early when the result receiver is gone.
    pub fn start_processing(
        self,
        job_rx: Receiver<CaptureJob>,
        result_tx: Sender<ProcessedCapture>,
    ) -> ProcessorStats {
        info!("Capture processor started");
        let mut stats = ProcessorStats::default();

        while let Ok(job) = job_rx.recv() {
            stats.received += 1;
            debug!("Processing {}", job.source.display());

            let result = match self.analyzer.analyze(job.image) {
                Ok(analysis) => {
                    match &analysis {
                        Analysis::Recognized(capture) => {
                            stats.recognized += 1;
                            debug!(
                                "{}: {} lines in {} ms",
                                job.source.display(),
                                capture.header.len() + capture.center.len(),
                                capture.elapsed.as_millis()
                            );
                        }
                        Analysis::NotAuslab(rejection) => {
                            stats.rejected += 1;
                            debug!("{}: rejected, {:?}", job.source.display(), rejection.reason);
                        }
                    }
                    Ok(analysis)
                }
                Err(e) => {
                    stats.failed += 1;
                    error!("Failed to process {}: {:#}", job.source.display(), e);
                    Err(e)
                }
            };

            if stats.received % 100 == 0 {
                info!(
                    "Processed {} captures (recognized: {}, rejected: {}, failed: {})",
                    stats.received, stats.recognized, stats.rejected, stats.failed
                );
            }

            let processed = ProcessedCapture {
                source: job.source,
                result,
            };
            if result_tx.send(processed).is_err() {
                info!("Result receiver closed, stopping capture processor");
                break;
            }
        }

        info!(
            "Capture processor stopped. Received {} captures (recognized: {}, rejected: {}, failed: {})",
            stats.received, stats.recognized, stats.rejected, stats.failed
        );
        stats
    }
}
