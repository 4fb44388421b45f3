//! Data types exchanged between the control thread, the workers and callers.

use crate::dsp::window::WindowFunction;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Amplitudes of one window in dB, one value per transform coefficient.
pub type Spectrum = Vec<f64>;

/// One window cut from the sample buffer, ready for a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowJob {
    /// Ordering key for reassembly; strictly increasing from 0.
    pub index: u64,
    /// Exactly `window_size` samples.
    pub samples: Vec<f64>,
    pub window_function: WindowFunction,
}

impl WindowJob {
    pub fn new(index: u64, samples: Vec<f64>, window_function: WindowFunction) -> Self {
        Self {
            index,
            samples,
            window_function,
        }
    }
}

/// Instruction sent from the pool to one worker.
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    Process(WindowJob),
    Shutdown,
}

/// What a worker has to say about its last job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Worker started and has no result yet.
    Ready,
    Completed { index: u64, spectrum: Spectrum },
    Failed { index: u64, message: String },
}

/// Message from a worker back to the control thread.
///
/// Every report means the sending worker is idle again.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub worker: usize,
    pub outcome: JobOutcome,
}

impl WorkerReport {
    pub fn ready(worker: usize) -> Self {
        Self {
            worker,
            outcome: JobOutcome::Ready,
        }
    }

    pub fn completed(worker: usize, index: u64, spectrum: Spectrum) -> Self {
        Self {
            worker,
            outcome: JobOutcome::Completed { index, spectrum },
        }
    }

    pub fn failed(worker: usize, index: u64, message: impl Into<String>) -> Self {
        Self {
            worker,
            outcome: JobOutcome::Failed {
                index,
                message: message.into(),
            },
        }
    }
}

/// The ordered result of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedSpectrogram {
    /// Spectra in window order, index `i` at position `i`.
    pub spectra: Vec<Spectrum>,
    /// Time from the first write until completion.
    pub elapsed: Duration,
}

impl FinishedSpectrogram {
    pub fn windows(&self) -> usize {
        self.spectra.len()
    }
}

/// Notifications emitted by a spectrogram.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrogramEvent {
    /// A window finished; arrives in completion order, not index order.
    Spectrum { index: u64, spectrum: Spectrum },
    /// A window could not be computed; the run cannot finish.
    WorkerFailed { index: u64, message: String },
    /// Every window is in and the input has ended. Emitted once per run.
    Finished(FinishedSpectrogram),
}

/// Snapshot of the control-side state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub buffered_samples: usize,
    pub shift: usize,
    pub dispatched: u64,
    pub completed: u64,
    pub idle_workers: usize,
    pub running: bool,
    pub stream_ended: bool,
    pub finished: bool,
    /// Set once the run has finished.
    pub execution_time: Option<Duration>,
}

/// Start and end of a run, for diagnostics only.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTiming {
    pub started: Option<Instant>,
    pub execution_time: Option<Duration>,
}

impl RunTiming {
    /// Records the start on the first call only.
    pub fn mark_started(&mut self) {
        self.started.get_or_insert_with(Instant::now);
    }

    /// Records and returns the time elapsed since the start.
    pub fn mark_finished(&mut self) -> Duration {
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        self.execution_time = Some(elapsed);
        elapsed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
