//! Fixed-size pool of worker threads with idle/busy tracking.

use crate::defaults::WORKER_JOIN_TIMEOUT;
use crate::pipeline::types::{WindowJob, WorkerCommand, WorkerReport};
use crate::pipeline::worker::{SpectrumWorker, WorkerRunner};
use crossbeam_channel::{Receiver, Sender, bounded, never, unbounded};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

struct WorkerSlot {
    commands: Sender<WorkerCommand>,
    runner: WorkerRunner,
}

/// Owns `size` workers while running.
///
/// Only the control thread touches the pool. Workers become idle through
/// the reports they send (including the initial `Ready`), which the control
/// thread feeds back via [`mark_idle`](WorkerPool::mark_idle).
pub struct WorkerPool {
    size: usize,
    worker: SpectrumWorker,
    slots: Vec<WorkerSlot>,
    idle: Vec<usize>,
    reports: Option<Receiver<WorkerReport>>,
}

impl WorkerPool {
    pub fn new(size: usize, worker: SpectrumWorker) -> Self {
        Self {
            size,
            worker,
            slots: Vec::new(),
            idle: Vec::new(),
            reports: None,
        }
    }

    /// Spawns the workers. Does nothing if the pool is already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let (report_tx, report_rx) = unbounded();
        self.slots = (0..self.size)
            .map(|id| {
                let (command_tx, command_rx) = bounded(1);
                let runner =
                    WorkerRunner::spawn(id, self.worker.clone(), command_rx, report_tx.clone());
                WorkerSlot {
                    commands: command_tx,
                    runner,
                }
            })
            .collect();
        self.reports = Some(report_rx);

        let spawned = self.slots.iter().filter(|s| s.runner.is_spawned()).count();
        if spawned < self.size {
            warn!("only {spawned} of {} workers could be spawned", self.size);
        } else {
            info!("started {} workers", self.size);
        }
    }

    pub fn is_running(&self) -> bool {
        self.reports.is_some()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Receiver for worker reports; never yields while the pool is stopped.
    pub fn reports(&self) -> Receiver<WorkerReport> {
        self.reports.clone().unwrap_or_else(never)
    }

    /// Takes one idle worker, if any.
    pub fn take_idle(&mut self) -> Option<usize> {
        self.idle.pop()
    }

    /// Returns a worker to the idle set after it reported.
    pub fn mark_idle(&mut self, worker: usize) {
        if worker < self.slots.len() && !self.idle.contains(&worker) {
            self.idle.push(worker);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Hands a job to a worker taken with [`take_idle`](Self::take_idle).
    ///
    /// On failure the job is handed back.
    pub fn dispatch(&mut self, worker: usize, job: WindowJob) -> Result<(), WindowJob> {
        let Some(slot) = self.slots.get(worker) else {
            return Err(job);
        };

        let index = job.index;
        match slot.commands.try_send(WorkerCommand::Process(job)) {
            Ok(()) => {
                debug!("window {index} → worker {worker}");
                Ok(())
            }
            Err(e) => match e.into_inner() {
                WorkerCommand::Process(job) => Err(job),
                WorkerCommand::Shutdown => unreachable!("only Process commands are dispatched"),
            },
        }
    }

    /// Shuts every worker down and forgets the idle set, without waiting.
    ///
    /// Threads that have not exited yet are detached. They finish their
    /// current window, fail to deliver it, and exit.
    pub fn stop(&mut self) {
        let busy = reap_finished(self.halt());
        if !busy.is_empty() {
            debug!("detaching {} worker threads", busy.len());
        }
    }

    /// Like [`stop`](Self::stop), but joins the threads, detaching only
    /// those still busy after [`WORKER_JOIN_TIMEOUT`].
    pub fn shutdown(&mut self) {
        join_with_deadline(self.halt(), WORKER_JOIN_TIMEOUT);
    }

    /// Disconnects every worker and hands back their runners.
    fn halt(&mut self) -> Vec<WorkerRunner> {
        if !self.is_running() {
            return Vec::new();
        }

        self.reports = None;
        self.idle.clear();

        let mut runners = Vec::with_capacity(self.slots.len());
        for slot in self.slots.drain(..) {
            // A full channel means a job is still queued; dropping the
            // sender ends the worker after it anyway.
            if slot.commands.try_send(WorkerCommand::Shutdown).is_err() {
                debug!("worker {} busy or gone at shutdown", slot.runner.id());
            }
            runners.push(slot.runner);
        }

        info!("stopped {} workers", self.size);
        runners
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Joins the runners whose threads have exited and returns the others.
fn reap_finished(runners: Vec<WorkerRunner>) -> Vec<WorkerRunner> {
    let mut remaining = Vec::new();
    for runner in runners {
        if runner.is_finished() {
            if let Err(msg) = runner.join() {
                warn!("{msg}");
            }
        } else {
            remaining.push(runner);
        }
    }
    remaining
}

/// Joins finished workers until `timeout`, then detaches the rest.
fn join_with_deadline(mut runners: Vec<WorkerRunner>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    let poll_interval = Duration::from_millis(5);

    loop {
        runners = reap_finished(runners);

        if runners.is_empty() {
            break;
        }

        if Instant::now() >= deadline {
            let ids: Vec<usize> = runners.iter().map(|r| r.id()).collect();
            warn!("workers {ids:?} still busy at shutdown, detaching");
            // Dropping JoinHandles detaches threads.
            break;
        }

        thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::transform::{Dct2, SpectralTransform};
    use crate::dsp::window::WindowFunction;
    use crate::error::Result;
    use crate::pipeline::types::JobOutcome;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// DCT that takes half a second per window.
    struct SleepyTransform(Dct2);

    impl SpectralTransform for SleepyTransform {
        fn transform(&self, input: &[f64]) -> Result<Vec<f64>> {
            thread::sleep(Duration::from_millis(500));
            self.0.transform(input)
        }

        fn len(&self) -> usize {
            self.0.len()
        }
    }

    fn pool(size: usize) -> WorkerPool {
        WorkerPool::new(size, SpectrumWorker::new(Arc::new(Dct2::new(128)), -200.0))
    }

    /// Drains `Ready` reports until every worker is idle.
    fn wait_ready(pool: &mut WorkerPool) {
        let reports = pool.reports();
        while pool.idle_count() < pool.size() {
            let report = reports.recv_timeout(TIMEOUT).unwrap();
            assert_eq!(report.outcome, JobOutcome::Ready);
            pool.mark_idle(report.worker);
        }
    }

    #[test]
    fn workers_announce_themselves() {
        let mut pool = pool(3);
        assert!(!pool.is_running());
        pool.start();
        assert!(pool.is_running());
        wait_ready(&mut pool);
        assert_eq!(pool.idle_count(), 3);
        pool.stop();
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let mut pool = pool(2);
        pool.start();
        let reports = pool.reports();
        pool.start();
        wait_ready(&mut pool);
        // No second batch of Ready messages.
        assert!(reports.recv_timeout(Duration::from_millis(50)).is_err());
        pool.stop();
    }

    #[test]
    fn dispatch_and_receive() {
        let mut pool = pool(1);
        pool.start();
        wait_ready(&mut pool);

        let worker = pool.take_idle().unwrap();
        assert!(pool.take_idle().is_none());
        pool.dispatch(
            worker,
            WindowJob::new(0, vec![0.0; 128], WindowFunction::Hamming),
        )
        .unwrap();

        let report = pool.reports().recv_timeout(TIMEOUT).unwrap();
        assert_eq!(report.worker, worker);
        assert!(matches!(report.outcome, JobOutcome::Completed { index: 0, .. }));
        pool.stop();
    }

    #[test]
    fn dispatch_to_unknown_worker_returns_job() {
        let mut pool = pool(1);
        let job = WindowJob::new(0, vec![0.0; 128], WindowFunction::Hamming);
        assert_eq!(pool.dispatch(5, job.clone()), Err(job));
    }

    #[test]
    fn mark_idle_ignores_duplicates_and_strangers() {
        let mut pool = pool(2);
        pool.start();
        wait_ready(&mut pool);
        pool.mark_idle(0);
        pool.mark_idle(9);
        assert_eq!(pool.idle_count(), 2);
        pool.stop();
    }

    #[test]
    fn stop_clears_idle_and_reports() {
        let mut pool = pool(2);
        pool.start();
        wait_ready(&mut pool);
        pool.stop();

        assert!(!pool.is_running());
        assert_eq!(pool.idle_count(), 0);
        assert!(pool.reports().recv_timeout(Duration::from_millis(20)).is_err());
        // Stopping again is harmless.
        pool.stop();
    }

    #[test]
    fn stop_returns_while_a_worker_is_busy() {
        let sleepy = SpectrumWorker::new(Arc::new(SleepyTransform(Dct2::new(128))), -200.0);
        let mut pool = WorkerPool::new(1, sleepy);
        pool.start();
        wait_ready(&mut pool);

        let worker = pool.take_idle().unwrap();
        pool.dispatch(
            worker,
            WindowJob::new(0, vec![0.0; 128], WindowFunction::Hamming),
        )
        .unwrap();

        let begun = Instant::now();
        pool.stop();
        assert!(begun.elapsed() < WORKER_JOIN_TIMEOUT);
        assert!(!pool.is_running());
    }

    #[test]
    fn shutdown_joins_idle_workers() {
        let mut pool = pool(2);
        pool.start();
        wait_ready(&mut pool);
        pool.shutdown();

        assert!(!pool.is_running());
        assert_eq!(pool.idle_count(), 0);
        pool.shutdown();
    }

    #[test]
    fn restart_after_stop() {
        let mut pool = pool(2);
        pool.start();
        wait_ready(&mut pool);
        pool.stop();

        pool.start();
        wait_ready(&mut pool);
        assert_eq!(pool.idle_count(), 2);
    }
}
