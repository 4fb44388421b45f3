//! Command-line interface for spectro
//!
//! Provides argument parsing using clap derive macros.

use crate::dsp::window::WindowFunction;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Compute the spectrogram of mono PCM audio
#[derive(Parser, Debug)]
#[command(
    name = "spectro",
    version,
    about = "Compute the spectrogram of mono PCM audio"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// WAV file to analyse (`-` or absent: read stdin)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Samples per window (power of two, 128 to 4096)
    #[arg(long, short = 'w', value_name = "SAMPLES")]
    pub window_size: Option<usize>,

    /// Window function (square, vonhann, hamming, blackman, blackmanharris, blackmannuttall, bartlett)
    #[arg(long, short = 'f', value_name = "NAME")]
    pub window_function: Option<WindowFunction>,

    /// Fraction of a window shared with the next one, in [0, 1)
    #[arg(long, value_name = "FRACTION")]
    pub overlap: Option<f64>,

    /// Number of worker threads (default: available cores)
    #[arg(long, short = 'j', value_name = "N")]
    pub workers: Option<usize>,

    /// Treat INPUT as headerless little-endian PCM instead of WAV
    #[arg(long)]
    pub raw: bool,

    /// Bits per sample of raw PCM input (8, 16 or 32)
    #[arg(long, value_name = "BITS")]
    pub bits: Option<u32>,

    /// Bytes written to the spectrogram per chunk
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Clip outlier amplitudes to 1.5 IQR around the quartiles
    #[arg(long)]
    pub filter_iqr: bool,

    /// Write the JSON report here instead of stdout
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version and build hash
    Version,

    /// List the available window functions
    Windows,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}

impl Cli {
    /// True when the input should be read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.input.as_deref().is_none_or(|p| p.as_os_str() == "-")
    }
}
