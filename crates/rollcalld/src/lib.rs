//! rollcalld — Capture loop, per-frame recognition and the service surface.
//!
//! One dedicated thread runs the [`CapturePipeline`]; D-Bus handlers read from
//! the [`RecognitionHub`], the attendance store and the [`SnapshotSink`]
//! without ever waiting on the capture loop for more than one short lock.

pub mod config;
pub mod dbus_interface;
pub mod hub;
pub mod pipeline;
pub mod processor;
pub mod sink;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use hub::RecognitionHub;
pub use pipeline::{CapturePipeline, PipelineExit, PipelineHandle};
pub use processor::{FrameProcessor, ProcessError, ProcessedFrame, RecognitionBatch};
pub use sink::{FrameSink, SnapshotSink};
pub use stats::PipelineStats;
