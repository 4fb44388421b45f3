//! State owned by the control thread: buffer, cursor, results and workers.

use crate::audio::chunk::{BitDepth, Chunk};
use crate::audio::sample_buffer::SampleBuffer;
use crate::config::SpectrogramConfig;
use crate::dsp::transform::SpectralTransform;
use crate::error::{Result, SpectroError};
use crate::pipeline::collector::ResultTable;
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::scheduler::WindowScheduler;
use crate::pipeline::types::{
    EngineStatus, FinishedSpectrogram, JobOutcome, RunTiming, SpectrogramEvent, WorkerReport,
};
use crate::pipeline::worker::SpectrumWorker;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single-threaded core of a spectrogram.
///
/// Every method runs to completion before the next one starts; the
/// [`Spectrogram`](crate::pipeline::orchestrator::Spectrogram) handle
/// serializes callers and worker reports onto one thread.
pub struct SpectrogramEngine {
    config: SpectrogramConfig,
    bit_depth: BitDepth,
    buffer: SampleBuffer,
    scheduler: WindowScheduler,
    table: ResultTable,
    pool: WorkerPool,
    events: Sender<SpectrogramEvent>,
    timing: RunTiming,
    stream_ended: bool,
    finished: bool,
    /// `Finished` or the first `WorkerFailed` of the current run.
    outcome: Option<SpectrogramEvent>,
}

impl SpectrogramEngine {
    /// Validates `config` and prepares a stopped engine.
    ///
    /// No thread is spawned until [`start`](Self::start).
    pub fn new(
        config: SpectrogramConfig,
        transform: Arc<dyn SpectralTransform>,
        events: Sender<SpectrogramEvent>,
    ) -> Result<Self> {
        config.validate()?;
        let bit_depth = config.bit_depth()?;

        if transform.len() != config.window_size {
            return Err(SpectroError::Transform {
                message: format!(
                    "{} expects {} samples but windows have {}",
                    transform.name(),
                    transform.len(),
                    config.window_size
                ),
            });
        }

        let scheduler =
            WindowScheduler::new(config.window_size, config.hop(), config.window_function);
        let pool = WorkerPool::new(
            config.workers,
            SpectrumWorker::new(transform, config.decibel_floor),
        );

        debug!(
            "engine: W={} hop={} {} workers={}",
            config.window_size,
            config.hop(),
            config.window_function,
            config.workers
        );

        Ok(Self {
            config,
            bit_depth,
            buffer: SampleBuffer::new(),
            scheduler,
            table: ResultTable::new(),
            pool,
            events,
            timing: RunTiming::default(),
            stream_ended: false,
            finished: false,
            outcome: None,
        })
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// Spawns the workers; a no-op while they are running.
    pub fn start(&mut self) {
        self.pool.start();
    }

    /// Stops the workers without waiting for busy ones. Buffer and stored
    /// results are kept.
    pub fn stop(&mut self) {
        let dispatched = self.scheduler.dispatched();
        if self.pool.is_running() && !self.table.is_complete(dispatched) {
            debug!(
                "stopping with windows {:?} still open",
                self.table.missing(dispatched)
            );
        }
        self.pool.stop();
    }

    /// Stops the workers and joins them, waiting a short while for busy ones.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }

    /// Stops the workers and forgets the run, as if nothing had been written.
    pub fn clear(&mut self) {
        self.stop();
        self.buffer.clear();
        self.scheduler.reset();
        self.table.clear();
        self.timing.reset();
        self.stream_ended = false;
        self.finished = false;
        self.outcome = None;
        info!("spectrogram cleared");
    }

    /// Decodes and buffers one chunk, then dispatches whatever became cuttable.
    ///
    /// A failing chunk leaves the buffer as it was.
    pub fn write(&mut self, chunk: Chunk) -> Result<usize> {
        self.timing.mark_started();
        let appended = self.buffer.ingest(chunk, self.bit_depth)?;
        debug!("buffered {appended} samples ({} total)", self.buffer.len());
        self.process();
        Ok(appended)
    }

    /// Records that no more input will arrive.
    pub fn end_stream(&mut self) {
        if !self.stream_ended {
            debug!("end of stream after {} samples", self.buffer.len());
        }
        self.stream_ended = true;
        self.process();
    }

    /// Applies one worker report; the reporting worker becomes idle.
    pub fn handle_report(&mut self, report: WorkerReport) {
        match report.outcome {
            JobOutcome::Ready => debug!("worker {} ready", report.worker),
            JobOutcome::Completed { index, spectrum } => self.store(index, spectrum),
            JobOutcome::Failed { index, message } => {
                warn!("worker {} failed window {index}: {message}", report.worker);
                self.fail(index, message);
            }
        }

        self.pool.mark_idle(report.worker);
        self.process();
    }

    /// Worker reports of the current pool generation.
    pub fn reports(&self) -> Receiver<WorkerReport> {
        self.pool.reports()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// How the current run ended, once it has: the finished spectrogram, or
    /// the first window that failed.
    pub fn outcome(&self) -> Option<Result<FinishedSpectrogram>> {
        match self.outcome.as_ref()? {
            SpectrogramEvent::Finished(done) => Some(Ok(done.clone())),
            SpectrogramEvent::WorkerFailed { index, message } => Some(Err(SpectroError::Worker {
                index: *index,
                message: message.clone(),
            })),
            SpectrogramEvent::Spectrum { .. } => None,
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            buffered_samples: self.buffer.len(),
            shift: self.scheduler.shift(),
            dispatched: self.scheduler.dispatched(),
            completed: self.table.len() as u64,
            idle_workers: self.pool.idle_count(),
            running: self.pool.is_running(),
            stream_ended: self.stream_ended,
            finished: self.finished,
            execution_time: self.timing.execution_time,
        }
    }

    fn store(&mut self, index: u64, spectrum: Vec<f64>) {
        if index >= self.scheduler.dispatched() {
            warn!("ignoring result for window {index} that was never dispatched");
            return;
        }
        if !self.table.insert(index, spectrum.clone()) {
            warn!("ignoring duplicate result for window {index}");
            return;
        }
        self.emit(SpectrogramEvent::Spectrum { index, spectrum });
    }

    /// Dispatches windows while both a window and an idle worker exist,
    /// then checks for completion.
    fn process(&mut self) {
        while self.scheduler.can_cut(self.buffer.len()) {
            let Some(worker) = self.pool.take_idle() else {
                debug!(
                    "no idle worker, deferring window {}",
                    self.scheduler.dispatched()
                );
                return;
            };
            let Some(job) = self.scheduler.cut(&self.buffer) else {
                self.pool.mark_idle(worker);
                break;
            };

            let index = job.index;
            if let Err(job) = self.pool.dispatch(worker, job) {
                // The worker thread is gone; it is not returned to the idle set.
                warn!("worker {worker} unreachable, window {} lost", job.index);
                self.fail(index, format!("worker {worker} is no longer running"));
            }
        }

        self.check_finished();
    }

    fn check_finished(&mut self) {
        if self.finished || !self.stream_ended {
            return;
        }
        if self.scheduler.can_cut(self.buffer.len()) {
            return;
        }

        let dispatched = self.scheduler.dispatched();
        if !self.table.is_complete(dispatched) {
            return;
        }

        self.finished = true;
        let elapsed = self.timing.mark_finished();
        let spectra = self.table.assemble(dispatched);
        info!(
            "spectrogram finished: {} windows in {:.1}ms",
            spectra.len(),
            elapsed.as_secs_f64() * 1000.0
        );
        let event = SpectrogramEvent::Finished(FinishedSpectrogram { spectra, elapsed });
        self.outcome = Some(event.clone());
        self.emit(event);
    }

    fn fail(&mut self, index: u64, message: String) {
        let event = SpectrogramEvent::WorkerFailed { index, message };
        if self.outcome.is_none() {
            self.outcome = Some(event.clone());
        }
        self.emit(event);
    }

    fn emit(&self, event: SpectrogramEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::transform::Dct2;
    use crate::dsp::window::WindowFunction;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);
    const FLOOR: f64 = -200.0;

    fn config(overlap: f64, workers: usize) -> SpectrogramConfig {
        SpectrogramConfig::default()
            .with_window_size(128)
            .with_overlap(overlap)
            .with_workers(workers)
            .with_decibel_floor(FLOOR)
    }

    fn engine(config: SpectrogramConfig) -> (SpectrogramEngine, Receiver<SpectrogramEvent>) {
        let (tx, rx) = unbounded();
        let transform = Arc::new(Dct2::new(config.window_size));
        (SpectrogramEngine::new(config, transform, tx).unwrap(), rx)
    }

    /// Feeds worker reports into the engine until it finishes.
    fn drive(engine: &mut SpectrogramEngine) {
        while !engine.is_finished() {
            let report = engine.reports().recv_timeout(TIMEOUT).unwrap();
            engine.handle_report(report);
        }
    }

    fn finished(events: &Receiver<SpectrogramEvent>) -> Vec<FinishedSpectrogram> {
        events
            .try_iter()
            .filter_map(|e| match e {
                SpectrogramEvent::Finished(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_config_before_spawning() {
        let (tx, _rx) = unbounded();
        let err = SpectrogramEngine::new(config(1.0, 1), Arc::new(Dct2::new(128)), tx)
            .err()
            .unwrap();
        assert!(err.is_config_error());
    }

    #[test]
    fn rejects_transform_of_wrong_length() {
        let (tx, _rx) = unbounded();
        let result = SpectrogramEngine::new(config(0.0, 1), Arc::new(Dct2::new(256)), tx);
        assert!(matches!(result, Err(SpectroError::Transform { .. })));
    }

    #[test]
    fn silent_input_finishes_with_floor_spectra() {
        let (mut engine, events) = engine(config(0.0, 1));
        engine.start();
        engine.write(Chunk::from(vec![0.0; 256])).unwrap();
        engine.end_stream();
        drive(&mut engine);

        let done = finished(&events);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].windows(), 2);
        for spectrum in &done[0].spectra {
            assert_eq!(spectrum.len(), 128);
            assert!(spectrum.iter().all(|&db| db == FLOOR));
        }

        let status = engine.status();
        assert_eq!(status.dispatched, 2);
        assert_eq!(status.completed, 2);
        assert_eq!(status.shift, 256);
        assert!(status.finished);
        assert!(status.execution_time.is_some());
    }

    #[test]
    fn half_overlap_cuts_three_windows() {
        let (mut engine, events) = engine(config(0.5, 2));
        engine.start();
        engine.write(Chunk::from(vec![0.0; 256])).unwrap();
        engine.end_stream();
        drive(&mut engine);

        assert_eq!(engine.status().dispatched, 3);
        assert_eq!(engine.status().shift, 192);
        assert_eq!(finished(&events)[0].windows(), 3);
    }

    #[test]
    fn results_delivered_out_of_order_are_assembled_in_order() {
        let square = config(0.0, 2).with_window_function(WindowFunction::Square);
        let (mut engine, events) = engine(square);
        engine.start();
        let mut samples = vec![0.0; 128];
        samples.extend(vec![1.0; 128]);
        engine.write(Chunk::from(samples)).unwrap();
        engine.end_stream();

        let reports = engine.reports();
        let mut completed = Vec::new();
        while completed.len() < 2 {
            let report = reports.recv_timeout(TIMEOUT).unwrap();
            match report.outcome {
                JobOutcome::Ready => engine.handle_report(report),
                _ => completed.push(report),
            }
        }
        completed.sort_by_key(|r| match r.outcome {
            JobOutcome::Completed { index, .. } => std::cmp::Reverse(index),
            _ => std::cmp::Reverse(u64::MAX),
        });

        engine.handle_report(completed.remove(0));
        assert!(!engine.is_finished());
        engine.handle_report(completed.remove(0));
        assert!(engine.is_finished());

        let spectra: Vec<_> = events
            .try_iter()
            .filter_map(|e| match e {
                SpectrogramEvent::Spectrum { index, .. } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(spectra, vec![1, 0]);
        assert_eq!(finished(&events).len(), 1);
    }

    #[test]
    fn spectra_follow_window_order() {
        let square = config(0.0, 1).with_window_function(WindowFunction::Square);
        let (mut engine, events) = engine(square);
        engine.start();
        let mut samples = vec![0.0; 128];
        samples.extend(vec![1.0; 128]);
        engine.write(Chunk::from(samples)).unwrap();
        engine.end_stream();
        drive(&mut engine);

        let done = finished(&events).remove(0);
        assert!(done.spectra[0].iter().all(|&db| db == FLOOR));
        assert!(done.spectra[1][0] > 0.0);
    }

    #[test]
    fn nothing_finishes_without_end_of_stream() {
        let (mut engine, events) = engine(config(0.0, 1));
        engine.start();
        engine.write(Chunk::from(vec![0.0; 256])).unwrap();

        let reports = engine.reports();
        while engine.status().completed < 2 {
            engine.handle_report(reports.recv_timeout(TIMEOUT).unwrap());
        }
        assert!(!engine.is_finished());
        assert!(finished(&events).is_empty());

        engine.end_stream();
        assert!(engine.is_finished());
    }

    #[test]
    fn outcome_is_kept_after_finishing() {
        let (mut engine, events) = engine(config(0.0, 1));
        assert!(engine.outcome().is_none());
        engine.start();
        engine.write(Chunk::from(vec![0.0; 256])).unwrap();
        engine.end_stream();
        drive(&mut engine);

        let emitted = finished(&events).remove(0);
        let kept = engine.outcome().unwrap().unwrap();
        assert_eq!(kept, emitted);
        // Asking again gives the same answer.
        assert_eq!(engine.outcome().unwrap().unwrap(), emitted);
    }

    #[test]
    fn finished_fires_once() {
        let (mut engine, events) = engine(config(0.0, 1));
        engine.start();
        engine.write(Chunk::from(vec![0.0; 128])).unwrap();
        engine.end_stream();
        drive(&mut engine);
        engine.end_stream();
        engine.handle_report(WorkerReport::ready(0));

        assert_eq!(finished(&events).len(), 1);
    }

    #[test]
    fn empty_stream_finishes_with_no_windows() {
        let (mut engine, events) = engine(config(0.0, 1));
        engine.start();
        engine.write(Chunk::from(vec![0.0; 100])).unwrap();
        engine.end_stream();

        let done = finished(&events);
        assert_eq!(done.len(), 1);
        assert!(done[0].spectra.is_empty());
    }

    #[test]
    fn writes_while_stopped_are_buffered_and_deferred() {
        let (mut engine, _events) = engine(config(0.0, 1));
        engine.write(Chunk::from(vec![0.0; 256])).unwrap();

        let status = engine.status();
        assert_eq!(status.buffered_samples, 256);
        assert_eq!(status.dispatched, 0);
        assert!(!status.running);

        engine.start();
        engine.end_stream();
        drive(&mut engine);
        assert_eq!(engine.status().dispatched, 2);
    }

    #[test]
    fn failed_chunk_leaves_state_unchanged() {
        let (mut engine, _events) = engine(config(0.0, 1));
        engine.write(Chunk::from(vec![1.0, 2.0])).unwrap();
        let before = engine.status();

        let err = engine
            .write(Chunk::from(serde_json::json!("not samples")))
            .unwrap_err();
        assert!(matches!(err, SpectroError::UnsupportedChunkType { .. }));
        assert_eq!(engine.status(), before);
    }

    #[test]
    fn results_for_undispatched_windows_are_ignored() {
        let (mut engine, events) = engine(config(0.0, 1));
        engine.handle_report(WorkerReport::completed(0, 7, vec![0.0; 128]));
        assert_eq!(engine.status().completed, 0);
        assert_eq!(events.try_iter().count(), 0);
    }

    #[test]
    fn failed_job_is_reported_and_blocks_completion() {
        let (mut engine, events) = engine(config(0.0, 1));
        engine.start();
        engine.write(Chunk::from(vec![0.0; 128])).unwrap();

        let reports = engine.reports();
        // Swap the real result for a failure before the engine sees it.
        loop {
            let report = reports.recv_timeout(TIMEOUT).unwrap();
            if let JobOutcome::Completed { index, .. } = report.outcome {
                engine.handle_report(WorkerReport::failed(report.worker, index, "boom"));
                break;
            }
            engine.handle_report(report);
        }
        engine.end_stream();

        assert!(!engine.is_finished());
        assert!(matches!(
            engine.outcome(),
            Some(Err(SpectroError::Worker { index: 0, .. }))
        ));
        let failures: Vec<_> = events
            .try_iter()
            .filter(|e| matches!(e, SpectrogramEvent::WorkerFailed { index: 0, .. }))
            .collect();
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn clear_then_same_input_reproduces_output() {
        let input: Vec<f64> = (0..512).map(|i| ((i * 37) % 101) as f64 - 50.0).collect();

        let (mut engine, events) = engine(config(0.25, 2));
        engine.start();
        engine.write(Chunk::from(input.clone())).unwrap();
        engine.end_stream();
        drive(&mut engine);
        let first = finished(&events).remove(0);

        engine.clear();
        let cleared = engine.status();
        assert_eq!(cleared.buffered_samples, 0);
        assert_eq!(cleared.shift, 0);
        assert_eq!(cleared.dispatched, 0);
        assert!(!cleared.running && !cleared.stream_ended && !cleared.finished);
        assert!(engine.outcome().is_none());

        engine.start();
        engine.write(Chunk::from(input)).unwrap();
        engine.end_stream();
        drive(&mut engine);
        let second = finished(&events).remove(0);

        assert_eq!(first.spectra, second.spectra);
    }

    #[test]
    fn stop_keeps_buffer_and_results() {
        let (mut engine, _events) = engine(config(0.0, 1));
        engine.start();
        engine.write(Chunk::from(vec![0.0; 128])).unwrap();
        let reports = engine.reports();
        while engine.status().completed < 1 {
            engine.handle_report(reports.recv_timeout(TIMEOUT).unwrap());
        }

        engine.stop();
        let status = engine.status();
        assert!(!status.running);
        assert_eq!(status.buffered_samples, 128);
        assert_eq!(status.completed, 1);
        assert_eq!(status.idle_workers, 0);
    }
}
