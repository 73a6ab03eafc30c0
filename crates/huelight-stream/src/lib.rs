//! huelight-stream: drive the highlighting pipeline off the UI thread.
//!
//! A capture source calls [`FrameWorker::submit`] or
//! [`FrameWorker::try_submit`] once per delivered frame; the worker
//! validates it, processes it against a fresh [`SharedSelection`]
//! snapshot and hands the result to a [`FrameSink`]. Malformed frames
//! are logged and skipped, never retried, and never stop the stream.
//!
//! [`SharedSelection`]: huelight_pipeline::SharedSelection

pub mod frame;
pub mod worker;

pub use frame::{FrameSink, PresentedFrame, RawFrame};
pub use worker::{FrameWorker, StreamConfig, StreamError, TrySubmitError, WorkerStats};
