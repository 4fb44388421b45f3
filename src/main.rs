use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use serde::Serialize;
use spectro::audio::{BitDepth, Chunk, WavInput};
use spectro::cli::{Cli, Commands, ConfigAction};
use spectro::config::Config;
use spectro::dsp::{IqrBounds, WindowFunction, filter_iqr, max_amplitude, min_amplitude};
use spectro::pipeline::{Spectrogram, Spectrum};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{Level, debug, info};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match &cli.command {
        Some(Commands::Version) => {
            println!("spectro {}", spectro::version_string());
        }
        Some(Commands::Windows) => {
            for window in WindowFunction::ALL {
                println!("{window}");
            }
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "spectro",
                &mut std::io::stdout(),
            );
        }
        None => run_analysis(&cli)?,
    }

    Ok(())
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, _) => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Load config from file, then apply env and CLI overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(path) = cli.config.as_deref() {
        Config::load(path).with_context(|| format!("loading {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    let mut config = config.with_env_overrides()?;
    let spectrogram = &mut config.spectrogram;
    if let Some(size) = cli.window_size {
        spectrogram.window_size = size;
    }
    if let Some(function) = cli.window_function {
        spectrogram.window_function = function;
    }
    if let Some(overlap) = cli.overlap {
        spectrogram.overlap = overlap;
    }
    if let Some(workers) = cli.workers {
        spectrogram.workers = workers;
    }
    if let Some(bits) = cli.bits {
        spectrogram.bits_per_sample = bits;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.input.chunk_size = chunk_size;
    }

    Ok(config)
}

fn handle_config_command(action: &ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = match custom_path {
                Some(path) => Config::load(path)?,
                None => Config::load_or_default(&Config::default_path())?,
            };
            print!("{}", config.with_env_overrides()?.to_toml()?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Everything read from the input before it is streamed.
enum Input {
    Wav(WavInput),
    Raw(Vec<u8>),
}

fn read_input(cli: &Cli) -> Result<Input> {
    let path = cli.input.as_deref().filter(|_| !cli.reads_stdin());
    let open =
        |path: &Path| File::open(path).with_context(|| format!("opening {}", path.display()));

    if !cli.raw {
        let wav = match path {
            Some(path) => WavInput::from_reader(BufReader::new(open(path)?))?,
            None => WavInput::from_stdin()?,
        };
        return Ok(Input::Wav(wav));
    }

    let mut bytes = Vec::new();
    match path {
        Some(path) => open(path)?.read_to_end(&mut bytes)?,
        None => std::io::stdin().lock().read_to_end(&mut bytes)?,
    };
    Ok(Input::Raw(bytes))
}

#[derive(Serialize)]
struct Report<'a> {
    window_size: usize,
    window_function: WindowFunction,
    overlap: f64,
    windows: usize,
    elapsed_ms: f64,
    max_amplitude: Option<f64>,
    min_amplitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iqr: Option<IqrBounds>,
    spectra: &'a [Spectrum],
}

fn run_analysis(cli: &Cli) -> Result<()> {
    let mut config = load_config(cli)?;
    let input = read_input(cli)?;

    let sample_rate = match &input {
        Input::Wav(wav) => {
            // Only meaningful for raw PCM; WAV samples arrive decoded.
            if let Ok(depth) = BitDepth::try_from(u32::from(wav.bits_per_sample())) {
                config.spectrogram.bits_per_sample = depth.bits();
            }
            Some(wav.sample_rate())
        }
        Input::Raw(_) => None,
    };

    let spectrogram = Spectrogram::new(config.spectrogram.clone())?;
    let width = config.spectrogram.bit_depth()?.width();
    let chunk_bytes = config.input.chunk_size.max(width) / width * width;

    match input {
        Input::Wav(wav) => {
            let samples_per_chunk = chunk_bytes / width;
            info!(
                "streaming {} samples at {} Hz",
                wav.samples().len(),
                wav.sample_rate()
            );
            for chunk in wav.samples().chunks(samples_per_chunk) {
                spectrogram.write(chunk)?;
            }
        }
        Input::Raw(bytes) => {
            info!("streaming {} bytes of raw PCM", bytes.len());
            for chunk in bytes.chunks(chunk_bytes) {
                spectrogram
                    .write(Chunk::Pcm(chunk.to_vec()))
                    .context("writing raw PCM chunk")?;
            }
        }
    }

    let mut done = spectrogram.finish()?;
    let status = spectrogram.status()?;
    debug!(?status, "spectrogram finished");

    let iqr = if cli.filter_iqr {
        filter_iqr(&mut done.spectra)
    } else {
        None
    };

    let report = Report {
        window_size: config.spectrogram.window_size,
        window_function: config.spectrogram.window_function,
        overlap: config.spectrogram.overlap,
        windows: done.windows(),
        elapsed_ms: done.elapsed.as_secs_f64() * 1000.0,
        max_amplitude: max_amplitude(&done.spectra),
        min_amplitude: min_amplitude(&done.spectra),
        sample_rate,
        iqr,
        spectra: &done.spectra,
    };

    match cli.output.as_deref() {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &report)?;
            writer.flush()?;
            info!("wrote {} windows to {}", report.windows, path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer(&mut writer, &report)?;
            writeln!(writer)?;
            writer.flush()?;
        }
    }

    Ok(())
}
