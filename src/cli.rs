//! Command-line interface.
//!
//! Configuration comes from `SONGGEN_*` environment variables; the flags
//! below override the most commonly changed ones.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{GeneratorBackend, ServiceConfig, WorkerConfig};
use crate::types::AudioFormat;

/// Generation backend of the task service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// One job on the GPU worker
    Remote,
    /// Crossfaded clips from a short-clip model
    Segmented,
}

impl From<BackendArg> for GeneratorBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Remote => GeneratorBackend::Remote,
            BackendArg::Segmented => GeneratorBackend::Segmented,
        }
    }
}

/// songgen-daemon: song generation task service and GPU job worker
#[derive(Parser, Debug)]
#[command(name = "songgen-daemon")]
#[command(about = "Song generation task service and GPU job worker")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the GPU job worker
    Worker {
        /// Listen address
        #[arg(long)]
        bind: Option<String>,

        /// Directory holding one subdirectory per job
        #[arg(long)]
        jobs_dir: Option<PathBuf>,

        /// Working directory of the generation command
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Number of jobs that may run at once
        #[arg(long)]
        slots: Option<usize>,
    },

    /// Run the task service
    Serve {
        /// Listen address
        #[arg(long)]
        bind: Option<String>,

        /// sqlx SQLite URL
        #[arg(long)]
        database_url: Option<String>,

        /// Directory of stored artifacts
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Generation backend
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,

        /// Base URL of the job worker
        #[arg(long)]
        remote_url: Option<String>,
    },

    /// Run one job on a worker and save the result
    Generate {
        /// Text prompt describing the music
        #[arg(short, long)]
        prompt: String,

        /// Target duration in seconds
        #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..=600))]
        duration: u32,

        /// Comma-separated style tags
        #[arg(long)]
        style: Option<String>,

        /// Lyrics; implies a song with vocals
        #[arg(long)]
        lyrics: Option<String>,

        /// Random seed for reproducible generation
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output file; the extension selects WAV or FLAC
        #[arg(short, long, default_value = "output.wav")]
        output: PathBuf,

        /// Base URL of the job worker
        #[arg(long)]
        remote_url: Option<String>,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

impl Command {
    /// Worker configuration from the environment with flag overrides.
    pub fn worker_config(&self, mut config: WorkerConfig) -> WorkerConfig {
        if let Command::Worker {
            bind,
            jobs_dir,
            workdir,
            slots,
        } = self
        {
            if let Some(bind) = bind {
                config.bind = bind.clone();
            }
            if let Some(dir) = jobs_dir {
                config.jobs_dir = Some(dir.clone());
            }
            if let Some(dir) = workdir {
                config.workdir = dir.clone();
            }
            if let Some(slots) = slots {
                config.slots = (*slots).max(1);
            }
        }
        config
    }

    /// Service configuration from the environment with flag overrides.
    pub fn service_config(&self, mut config: ServiceConfig) -> ServiceConfig {
        match self {
            Command::Serve {
                bind,
                database_url,
                static_dir,
                backend,
                remote_url,
            } => {
                if let Some(bind) = bind {
                    config.bind = bind.clone();
                }
                if let Some(url) = database_url {
                    config.database_url = Some(url.clone());
                }
                if let Some(dir) = static_dir {
                    config.static_dir = Some(dir.clone());
                }
                if let Some(backend) = backend {
                    config.backend = (*backend).into();
                }
                if let Some(url) = remote_url {
                    config.remote_url = url.trim_end_matches('/').to_string();
                }
            }
            Command::Generate {
                remote_url: Some(url),
                ..
            } => config.remote_url = url.trim_end_matches('/').to_string(),
            _ => {}
        }
        config
    }
}

/// Output format implied by the file extension; WAV when unrecognized.
pub fn output_format(path: &std::path::Path) -> AudioFormat {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| AudioFormat::from_extension(&e.to_ascii_lowercase()))
        .unwrap_or(AudioFormat::Wav)
}
