//! Worker computation unit and the thread that runs it.

use crate::dsp::transform::{SpectralTransform, to_decibels};
use crate::error::{Result, SpectroError};
use crate::pipeline::types::{Spectrum, WindowJob, WorkerCommand, WorkerReport};
use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Stateless per-job computation: window → transform → dB.
#[derive(Clone)]
pub struct SpectrumWorker {
    transform: Arc<dyn SpectralTransform>,
    decibel_floor: f64,
}

impl SpectrumWorker {
    pub fn new(transform: Arc<dyn SpectralTransform>, decibel_floor: f64) -> Self {
        Self {
            transform,
            decibel_floor,
        }
    }

    /// Computes the spectrum of one job.
    ///
    /// Fails without side effects when the job does not match the transform
    /// length or the transform itself fails.
    pub fn process(&self, job: WindowJob) -> Result<Spectrum> {
        let expected = self.transform.len();
        if job.samples.len() != expected {
            return Err(SpectroError::Transform {
                message: format!(
                    "window {} has {} samples, transform expects {}",
                    job.index,
                    job.samples.len(),
                    expected
                ),
            });
        }

        let mut samples = job.samples;
        job.window_function.apply(&mut samples);

        let coefficients = self.transform.transform(&samples)?;
        if coefficients.len() != expected {
            return Err(SpectroError::Transform {
                message: format!(
                    "{} returned {} coefficients for {} samples",
                    self.transform.name(),
                    coefficients.len(),
                    expected
                ),
            });
        }

        Ok(coefficients
            .into_iter()
            .map(|c| to_decibels(c, self.decibel_floor))
            .collect())
    }

    /// Like [`process`](Self::process), but also turns a panic inside the
    /// transform into an error so the worker thread survives it.
    pub fn process_guarded(&self, job: WindowJob) -> Result<Spectrum> {
        let index = job.index;
        panic::catch_unwind(AssertUnwindSafe(|| self.process(job))).unwrap_or_else(|payload| {
            let msg = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            Err(SpectroError::Transform {
                message: format!("window {index} panicked: {msg}"),
            })
        })
    }
}

/// Runs a [`SpectrumWorker`] in a dedicated thread.
pub(crate) struct WorkerRunner {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl WorkerRunner {
    /// Spawns worker `id`.
    ///
    /// The worker announces itself with a `Ready` report, then answers every
    /// job with exactly one report until it receives `Shutdown`, its command
    /// channel disconnects, or the report channel closes.
    pub(crate) fn spawn(
        id: usize,
        worker: SpectrumWorker,
        commands: Receiver<WorkerCommand>,
        reports: Sender<WorkerReport>,
    ) -> Self {
        let handle = thread::Builder::new()
            .name(format!("spectro-worker-{id}"))
            .spawn(move || Self::run_worker(id, &worker, commands, reports));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("failed to spawn worker {id}: {e}");
                None
            }
        };

        Self { id, handle }
    }

    fn run_worker(
        id: usize,
        worker: &SpectrumWorker,
        commands: Receiver<WorkerCommand>,
        reports: Sender<WorkerReport>,
    ) {
        if reports.send(WorkerReport::ready(id)).is_err() {
            return;
        }

        while let Ok(command) = commands.recv() {
            let job = match command {
                WorkerCommand::Process(job) => job,
                WorkerCommand::Shutdown => break,
            };

            let index = job.index;
            let report = match worker.process_guarded(job) {
                Ok(spectrum) => WorkerReport::completed(id, index, spectrum),
                Err(e) => WorkerReport::failed(id, index, e.to_string()),
            };

            if reports.send(report).is_err() {
                // Pool was stopped while this job was in flight.
                debug!("worker {id} dropping result for window {index}");
                break;
            }
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn is_spawned(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Waits for the worker thread to complete.
    pub(crate) fn join(mut self) -> std::result::Result<(), String> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| format!("Worker {} thread panicked", self.id))
        } else {
            Ok(())
        }
    }
}
