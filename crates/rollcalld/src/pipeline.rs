//! The capture loop: frame source → processor → hub + sink.

use crate::hub::RecognitionHub;
use crate::processor::FrameProcessor;
use crate::sink::FrameSink;
use crate::stats::PipelineStats;
use rollcall_hw::FrameSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Why the capture loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineExit {
    /// The source ran out of frames.
    EndOfStream,
    /// [`PipelineHandle::stop`] was called.
    Stopped,
    /// The source returned an error; it has been closed.
    SourceFailed(String),
    /// The capture thread panicked.
    Panicked,
}

impl PipelineExit {
    /// Whether the loop ended because it was asked to. Any other exit means
    /// the daemon lost its camera feed.
    pub fn was_requested(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Sequential capture loop. Sole writer of attendance and sole producer for the hub.
pub struct CapturePipeline {
    source: Box<dyn FrameSource>,
    processor: FrameProcessor,
    hub: Arc<RecognitionHub>,
    sink: Box<dyn FrameSink>,
    stats: Arc<PipelineStats>,
    stop: Arc<AtomicBool>,
    warmup_frames: usize,
}

impl CapturePipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        processor: FrameProcessor,
        hub: Arc<RecognitionHub>,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            source,
            processor,
            hub,
            sink,
            stats: Arc::default(),
            stop: Arc::default(),
            warmup_frames: 0,
        }
    }

    /// Discard this many frames before processing (camera AGC/AE stabilization).
    pub fn with_warmup(mut self, frames: usize) -> Self {
        self.warmup_frames = frames;
        self
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Run on the current thread until the source ends, fails, or a stop is requested.
    ///
    /// The source is closed on every exit path.
    pub fn run(mut self) -> PipelineExit {
        tracing::info!("capture pipeline started");
        let exit = self.run_loop();
        self.source.close();
        tracing::info!(?exit, stats = ?self.stats.snapshot(), "capture pipeline stopped");
        exit
    }

    /// Run on a dedicated OS thread.
    pub fn spawn(self) -> std::io::Result<PipelineHandle> {
        let stop = Arc::clone(&self.stop);
        let thread = std::thread::Builder::new()
            .name("rollcall-capture".into())
            .spawn(move || self.run())?;
        Ok(PipelineHandle { stop, thread })
    }

    fn run_loop(&mut self) -> PipelineExit {
        if self.warmup_frames > 0 {
            tracing::info!(count = self.warmup_frames, "discarding warmup frames");
            for _ in 0..self.warmup_frames {
                if self.stop.load(Ordering::Acquire) {
                    return PipelineExit::Stopped;
                }
                match self.source.next_frame() {
                    Ok(Some(_)) => {}
                    Ok(None) => return PipelineExit::EndOfStream,
                    Err(e) => return PipelineExit::SourceFailed(e.to_string()),
                }
            }
        }

        loop {
            if self.stop.load(Ordering::Acquire) {
                return PipelineExit::Stopped;
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return PipelineExit::EndOfStream,
                Err(e) => {
                    tracing::error!(error = %e, "frame source failed");
                    return PipelineExit::SourceFailed(e.to_string());
                }
            };

            let out = self.processor.process(frame);
            self.stats.frame_processed();
            if out.failure.is_some() {
                self.stats.frame_dropped();
            }
            if out.write_failures > 0 {
                self.stats.write_failed(out.write_failures as u64);
            }

            if !out.recognized.is_empty() && !self.hub.publish(out.recognized) {
                self.stats.batch_dropped();
                tracing::trace!("recognition hub full; batch dropped");
            }

            self.sink.emit(&out.frame);
        }
    }
}

/// Handle to a pipeline running on its own thread.
pub struct PipelineHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<PipelineExit>,
}

impl PipelineHandle {
    /// Ask the loop to stop after the frame in flight. Does not wait.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to exit.
    pub fn join(self) -> PipelineExit {
        self.thread.join().unwrap_or(PipelineExit::Panicked)
    }
}
