use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use wavesmooth::audio_toolkit::smooth_file;
use wavesmooth::microphone::{list_input_devices, record_from_microphone, CaptureBackend};
use wavesmooth::Settings;

#[derive(Parser)]
#[command(name = "wavesmooth")]
#[command(about = "Decode and smooth audio files, or record the microphone to MP3")]
#[command(version)]
struct Cli {
    /// Settings file (TOML). Defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a file, smooth it and print sample counts (default)
    Smooth {
        /// Media file to decode
        path: Option<PathBuf>,

        /// Moving-average window in samples
        #[arg(long)]
        window: Option<usize>,
    },

    /// Record the microphone into an MP3 file
    Record {
        /// Output MP3 path
        output: PathBuf,

        /// Recording duration in seconds
        #[arg(long)]
        duration: u64,

        /// Capture backend (alsa, jack, coreaudio/avfoundation, wasapi/dshow, asio)
        #[arg(long)]
        backend: Option<CaptureBackend>,

        /// Input device name (substring match)
        #[arg(long)]
        device: Option<String>,
    },

    /// List input devices for a capture backend
    Devices {
        #[arg(long)]
        backend: Option<CaptureBackend>,
    },

    /// List capture backends and whether they are available
    Backends,
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command.unwrap_or(Commands::Smooth {
        path: None,
        window: None,
    }) {
        Commands::Smooth { path, window } => {
            let path = path.unwrap_or_else(|| settings.input_path.clone());
            let window = window.unwrap_or(settings.window_size);
            let report = smooth_file(&path, window, &settings)
                .with_context(|| format!("Failed to process {}", path.display()))?;
            println!("{}", report);
        }
        Commands::Record {
            output,
            duration,
            backend,
            device,
        } => {
            let mut recording = settings.recording.clone();
            if let Some(backend) = backend {
                recording.capture_backend = backend;
            }
            if device.is_some() {
                recording.device = device;
            }

            println!("Recording {}s to {}...", duration, output.display());
            let summary = record_from_microphone(&output, Duration::from_secs(duration), &recording)
                .context("Error recording audio")?;
            println!(
                "Recording complete ({:.1}s, {} samples)",
                summary.elapsed.as_secs_f32(),
                summary.samples_written
            );
        }
        Commands::Devices { backend } => {
            let backend = backend.unwrap_or(settings.recording.capture_backend);
            let devices = list_input_devices(backend)
                .with_context(|| format!("Failed to list devices for {}", backend))?;
            if devices.is_empty() {
                println!("No input devices found for {}", backend);
            }
            for device in devices {
                let marker = if device.is_default { " (default)" } else { "" };
                let rates: Vec<String> = device
                    .sample_rates
                    .iter()
                    .map(|(min, max)| {
                        if min == max {
                            format!("{}", min)
                        } else {
                            format!("{}-{}", min, max)
                        }
                    })
                    .collect();
                println!(
                    "{}{}: up to {} channels, rates [{}] Hz",
                    device.name,
                    marker,
                    device.max_channels,
                    rates.join(", ")
                );
            }
        }
        Commands::Backends => {
            let default = settings.recording.capture_backend;
            for backend in CaptureBackend::ALL {
                let status = if backend.is_available() {
                    "available"
                } else {
                    "unavailable"
                };
                let marker = if backend == default { " (configured)" } else { "" };
                println!("{}: {}{}", backend, status, marker);
            }
        }
    }

    Ok(())
}

fn main() {
    wavesmooth::init_logging();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{:#}", e);
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}
