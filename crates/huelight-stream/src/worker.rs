//! The dedicated frame-processing thread.
//!
//! [`FrameWorker`] owns one named thread that receives [`RawFrame`]s
//! over a rendezvous channel, snapshots the shared selection, runs the
//! pipeline and hands the result to a [`FrameSink`]. The channel has no
//! capacity, so frames are never queued: a producer either waits for
//! the worker ([`submit`](FrameWorker::submit)) or gets its frame back
//! immediately ([`try_submit`](FrameWorker::try_submit)).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use huelight_pipeline::{CompositeParams, SharedSelection, process_frame_with};

use crate::frame::{FrameSink, PresentedFrame, RawFrame};

/// Worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Name of the processing thread.
    pub thread_name: String,
    /// Compositing parameters used for every frame.
    pub params: CompositeParams,
}

impl StreamConfig {
    /// Default processing thread name.
    pub const DEFAULT_THREAD_NAME: &'static str = "huelight-frames";
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            thread_name: Self::DEFAULT_THREAD_NAME.to_string(),
            params: CompositeParams::default(),
        }
    }
}

/// Errors from driving a [`FrameWorker`].
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The processing thread could not be started.
    #[error("failed to spawn frame worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Compositing parameters were rejected before the thread started.
    #[error(transparent)]
    InvalidParams(#[from] huelight_pipeline::FrameError),

    /// The processing thread has exited.
    #[error("frame worker is no longer running")]
    Disconnected,

    /// The processing thread panicked (typically inside the sink).
    #[error("frame worker panicked")]
    WorkerPanicked,
}

/// A frame handed back by [`FrameWorker::try_submit`].
#[derive(Debug, thiserror::Error)]
pub enum TrySubmitError {
    /// The worker is still busy with an earlier frame.
    #[error("frame worker is busy; frame dropped")]
    Busy(RawFrame),

    /// The worker has exited.
    #[error("frame worker is no longer running")]
    Disconnected(RawFrame),
}

impl TrySubmitError {
    /// Recover the rejected frame.
    #[must_use]
    pub fn into_frame(self) -> RawFrame {
        match self {
            Self::Busy(frame) | Self::Disconnected(frame) => frame,
        }
    }
}

/// Frame counters, readable while the worker runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Frames accepted by the worker.
    pub submitted: u64,
    /// Frames processed and presented.
    pub processed: u64,
    /// Frames rejected as malformed.
    pub skipped: u64,
    /// Frames refused by [`FrameWorker::try_submit`] while busy.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    processed: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

struct Job {
    sequence: u64,
    frame: RawFrame,
}

/// Runs the highlighting pipeline on a dedicated thread.
///
/// Dropping the worker closes the channel and joins the thread.
pub struct FrameWorker {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
    next_sequence: AtomicU64,
}

impl FrameWorker {
    /// Start the processing thread.
    ///
    /// `selection` is read once per frame; mutations made through other
    /// clones of it take effect on the next frame the worker picks up.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidParams`] if `config.params` fails
    /// validation and [`StreamError::Spawn`] if the OS refuses the
    /// thread.
    pub fn spawn(
        selection: SharedSelection,
        sink: impl FrameSink,
        config: StreamConfig,
    ) -> Result<Self, StreamError> {
        config.params.validate()?;

        let (sender, receiver) = crossbeam_channel::bounded(0);
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);
        let params = config.params;

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(&receiver, &selection, sink, &params, &worker_counters))?;
        log::debug!("started frame worker thread {:?}", config.thread_name);

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            counters,
            next_sequence: AtomicU64::new(0),
        })
    }

    /// Hand a frame to the worker, waiting until it is free.
    ///
    /// Returns the frame's sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disconnected`] if the worker has exited.
    pub fn submit(&self, frame: RawFrame) -> Result<u64, StreamError> {
        let sender = self.sender.as_ref().ok_or(StreamError::Disconnected)?;
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        sender
            .send(Job { sequence, frame })
            .map_err(|_| StreamError::Disconnected)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(sequence)
    }

    /// Hand a frame to the worker only if it is idle right now.
    ///
    /// Returns the frame's sequence number.
    ///
    /// "Idle" means the worker is already waiting to receive. Just after
    /// [`spawn`](Self::spawn), and between presenting one frame and
    /// asking for the next, the worker is not waiting yet, so a frame
    /// offered then is also refused and counted as dropped. Capture
    /// loops that must not lose the first frame should use
    /// [`submit`](Self::submit) for it.
    ///
    /// # Errors
    ///
    /// Returns [`TrySubmitError::Busy`] with the frame if the worker is
    /// still processing, and [`TrySubmitError::Disconnected`] if it has
    /// exited.
    pub fn try_submit(&self, frame: RawFrame) -> Result<u64, TrySubmitError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(TrySubmitError::Disconnected(frame));
        };
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        match sender.try_send(Job { sequence, frame }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(sequence)
            }
            Err(TrySendError::Full(job)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("worker busy, dropping frame {sequence}");
                Err(TrySubmitError::Busy(job.frame))
            }
            Err(TrySendError::Disconnected(job)) => Err(TrySubmitError::Disconnected(job.frame)),
        }
    }

    /// Current frame counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Stop accepting frames, wait for the in-flight frame, and join the
    /// thread.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::WorkerPanicked`] if the thread panicked.
    pub fn shutdown(mut self) -> Result<WorkerStats, StreamError> {
        self.join()?;
        Ok(self.counters.snapshot())
    }

    fn join(&mut self) -> Result<(), StreamError> {
        // Closing the channel ends the worker's receive loop.
        self.sender = None;
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| StreamError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            log::error!("{e}");
        }
    }
}

fn run(
    receiver: &Receiver<Job>,
    selection: &SharedSelection,
    mut sink: impl FrameSink,
    params: &CompositeParams,
    counters: &Counters,
) {
    for Job { sequence, frame } in receiver {
        let state = selection.snapshot();
        let result = frame
            .into_pixel_buffer()
            .and_then(|buffer| process_frame_with(&buffer, &state, params));
        match result {
            Ok(output) => {
                counters.processed.fetch_add(1, Ordering::Relaxed);
                sink.present(PresentedFrame { sequence, output });
            }
            Err(e) => {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
                log::warn!("skipping frame {sequence}: {e}");
            }
        }
    }
    log::debug!("frame worker exiting");
}
