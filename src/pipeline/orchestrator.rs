//! Public spectrogram handle and the control thread behind it.

use crate::audio::chunk::Chunk;
use crate::config::SpectrogramConfig;
use crate::dsp::transform::{Dct2, SpectralTransform};
use crate::error::{Result, SpectroError};
use crate::pipeline::engine::SpectrogramEngine;
use crate::pipeline::types::{EngineStatus, FinishedSpectrogram, SpectrogramEvent};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select, unbounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

enum Command {
    Write {
        chunk: Chunk,
        reply: Sender<Result<usize>>,
    },
    EndOfStream,
    Start {
        reply: Sender<()>,
    },
    Stop {
        reply: Sender<()>,
    },
    Clear {
        reply: Sender<()>,
    },
    Status {
        reply: Sender<EngineStatus>,
    },
    Await {
        reply: Waiter,
    },
    Shutdown,
}

type Waiter = Sender<Result<FinishedSpectrogram>>;

/// A running spectrogram.
///
/// Chunks are written from any thread holding the handle; windows are cut and
/// handed to the workers as soon as enough samples are buffered. Results
/// arrive on [`events`](Self::events).
pub struct Spectrogram {
    config: SpectrogramConfig,
    commands: Sender<Command>,
    events: Receiver<SpectrogramEvent>,
    control: Option<JoinHandle<()>>,
}

impl Spectrogram {
    /// Builds a spectrogram using the DCT-II and starts its workers.
    pub fn new(config: SpectrogramConfig) -> Result<Self> {
        config.validate()?;
        let transform = Arc::new(Dct2::new(config.window_size));
        Self::with_transform(config, transform)
    }

    /// Builds a spectrogram around a custom transform and starts its workers.
    ///
    /// The transform must be planned for `config.window_size` samples.
    pub fn with_transform(
        config: SpectrogramConfig,
        transform: Arc<dyn SpectralTransform>,
    ) -> Result<Self> {
        let (event_tx, event_rx) = unbounded();
        let mut engine = SpectrogramEngine::new(config.clone(), transform, event_tx)?;
        engine.start();

        let (command_tx, command_rx) = unbounded();
        let control = thread::Builder::new()
            .name("spectro-control".to_string())
            .spawn(move || run_control(engine, command_rx))?;

        Ok(Self {
            config,
            commands: command_tx,
            events: event_rx,
            control: Some(control),
        })
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// Appends one chunk of input.
    ///
    /// Returns once the chunk is buffered and every window it completed has
    /// been dispatched or deferred. A rejected chunk changes nothing.
    pub fn write(&self, chunk: impl Into<Chunk>) -> Result<()> {
        let (reply, response) = bounded(1);
        self.send(Command::Write {
            chunk: chunk.into(),
            reply,
        })?;
        response.recv().map_err(|_| SpectroError::Disconnected)?.map(|_| ())
    }

    /// Signals that no more input will be written.
    pub fn end_stream(&self) -> Result<()> {
        self.send(Command::EndOfStream)
    }

    /// Spectra, failures and the final result, in the order they happen.
    pub fn events(&self) -> &Receiver<SpectrogramEvent> {
        &self.events
    }

    /// Starts the workers again after [`stop`](Self::stop) or [`clear`](Self::clear).
    pub fn start(&self) -> Result<()> {
        self.request(|reply| Command::Start { reply })
    }

    /// Stops the workers without waiting for windows in flight.
    ///
    /// Returns as soon as the workers are disconnected; threads still
    /// computing are detached and exit after their current window. Buffered
    /// samples and received spectra are kept, but a run stopped with windows
    /// in flight never finishes.
    pub fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply })
    }

    /// Stops the workers and resets to the state before the first write.
    ///
    /// Events of the cleared run still waiting in [`events`](Self::events)
    /// are discarded, and a pending [`finish`](Self::finish) returns
    /// [`SpectroError::Cancelled`].
    pub fn clear(&self) -> Result<()> {
        self.request(|reply| Command::Clear { reply })?;
        // The control thread emitted everything of the old run before replying.
        let stale = self.events.try_iter().count();
        if stale > 0 {
            debug!("discarded {stale} events of the cleared run");
        }
        Ok(())
    }

    pub fn status(&self) -> Result<EngineStatus> {
        self.request(|reply| Command::Status { reply })
    }

    /// Ends the stream and blocks until the spectrogram is finished.
    ///
    /// Leaves [`events`](Self::events) untouched, so it can be called again
    /// or after `Finished` was taken from there. A failed window is returned
    /// as [`SpectroError::Worker`]; a stopped run with windows in flight
    /// blocks forever, see [`finish_timeout`](Self::finish_timeout).
    pub fn finish(&self) -> Result<FinishedSpectrogram> {
        self.end_stream()?;
        self.request(|reply| Command::Await { reply })?
    }

    /// Like [`finish`](Self::finish), giving up after `timeout`.
    pub fn finish_timeout(&self, timeout: Duration) -> Result<FinishedSpectrogram> {
        self.end_stream()?;
        let (reply, response) = bounded(1);
        self.send(Command::Await { reply })?;
        response.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => SpectroError::Timeout {
                millis: timeout.as_millis(),
            },
            RecvTimeoutError::Disconnected => SpectroError::Disconnected,
        })?
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SpectroError::Disconnected)
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = bounded(1);
        self.send(command(reply))?;
        response.recv().map_err(|_| SpectroError::Disconnected)
    }
}

impl Drop for Spectrogram {
    fn drop(&mut self) {
        if self.commands.send(Command::Shutdown).is_err() {
            debug!("control thread already gone");
        }
        if let Some(handle) = self.control.take()
            && handle.join().is_err()
        {
            warn!("spectrogram control thread panicked");
        }
    }
}

/// Serializes commands and worker reports onto the engine until shutdown.
fn run_control(mut engine: SpectrogramEngine, commands: Receiver<Command>) {
    let mut waiters: Vec<Waiter> = Vec::new();
    loop {
        // Re-fetched every round: start/stop/clear replace the report channel.
        let reports = engine.reports();
        select! {
            recv(commands) -> command => match command {
                Ok(Command::Shutdown) | Err(_) => break,
                Ok(command) => handle_command(&mut engine, &mut waiters, command),
            },
            recv(reports) -> report => match report {
                Ok(report) => engine.handle_report(report),
                Err(_) => {
                    warn!("all workers exited, stopping pool");
                    engine.stop();
                }
            },
        }
        answer_waiters(&engine, &mut waiters);
    }

    engine.shutdown();
    debug!("control thread exiting");
}

/// Hands the run's outcome to every pending `finish` once there is one.
fn answer_waiters(engine: &SpectrogramEngine, waiters: &mut Vec<Waiter>) {
    while let Some(waiter) = waiters.pop() {
        let Some(outcome) = engine.outcome() else {
            waiters.push(waiter);
            return;
        };
        if waiter.send(outcome).is_err() {
            debug!("finish caller went away");
        }
    }
}

fn handle_command(engine: &mut SpectrogramEngine, waiters: &mut Vec<Waiter>, command: Command) {
    // Reply failures mean the caller stopped waiting; nothing to do.
    match command {
        Command::Write { chunk, reply } => {
            if reply.send(engine.write(chunk)).is_err() {
                debug!("write caller went away");
            }
        }
        Command::EndOfStream => engine.end_stream(),
        Command::Start { reply } => {
            engine.start();
            if reply.send(()).is_err() {
                debug!("start caller went away");
            }
        }
        Command::Stop { reply } => {
            engine.stop();
            if reply.send(()).is_err() {
                debug!("stop caller went away");
            }
        }
        Command::Clear { reply } => {
            for waiter in waiters.drain(..) {
                if waiter.send(Err(SpectroError::Cancelled)).is_err() {
                    debug!("finish caller went away");
                }
            }
            engine.clear();
            if reply.send(()).is_err() {
                debug!("clear caller went away");
            }
        }
        Command::Status { reply } => {
            if reply.send(engine.status()).is_err() {
                debug!("status caller went away");
            }
        }
        Command::Await { reply } => waiters.push(reply),
        Command::Shutdown => {}
    }
}
