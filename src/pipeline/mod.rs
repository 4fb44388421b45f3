//! Parallel spectrogram pipeline.
//!
//! A control thread owns the sample buffer, the window scheduler and the
//! result table. Windows go to a fixed pool of worker threads over bounded
//! crossbeam channels; results come back on one shared channel and are put
//! back in window order.

pub mod collector;
pub mod engine;
pub mod orchestrator;
pub mod pool;
pub mod scheduler;
pub mod types;
pub mod worker;

pub use collector::ResultTable;
pub use engine::SpectrogramEngine;
pub use orchestrator::Spectrogram;
pub use pool::WorkerPool;
pub use scheduler::WindowScheduler;
pub use types::{
    EngineStatus, FinishedSpectrogram, JobOutcome, Spectrum, SpectrogramEvent, WindowJob,
    WorkerReport,
};
pub use worker::SpectrumWorker;
