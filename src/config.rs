//! Command-line interface and host configuration

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::command::split_script_spec;
use crate::engine::EngineParams;
use crate::error::{HostError, HostResult};
use crate::logging::MAX_LOG_LEVEL;

/// Well-known location of the command pipe
pub const DEFAULT_PIPE_PATH: &str = "/tmp/livehost_cmd";

/// Script file extension accepted on the command line
pub const SCRIPT_EXTENSION: &str = "ck";

/// Parse `-l`; values outside 0..=7 fall back to silent
fn parse_log_level(s: &str) -> Result<u8, String> {
    let level = s
        .parse::<i64>()
        .map_err(|_| format!("invalid log level '{}'", s))?;
    Ok(if (0..=MAX_LOG_LEVEL as i64).contains(&level) {
        level as u8
    } else {
        0
    })
}

/// Live-coding audio host: renders audio to stdout, takes commands from a pipe
#[derive(Parser, Debug, Clone)]
#[command(name = "livehost", disable_version_flag = true)]
pub struct Cli {
    /// Sample rate
    #[arg(short = 'r', value_name = "rate", default_value_t = 48000)]
    pub sample_rate: u32,

    /// Buffer size in frames
    #[arg(short = 'b', value_name = "size", default_value_t = 256)]
    pub block_size: usize,

    /// Number of channels
    #[arg(short = 'c', value_name = "chans", default_value_t = 2)]
    pub channels: usize,

    /// Log level (0-7, 0 is silent)
    #[arg(short = 'l', value_name = "level", default_value_t = 0,
          allow_negative_numbers = true, value_parser = parse_log_level)]
    pub log_level: u8,

    /// Command pipe path
    #[arg(long = "pipe", value_name = "path", default_value = DEFAULT_PIPE_PATH)]
    pub pipe: PathBuf,

    /// Stop once no units are running
    #[arg(long)]
    pub halt: bool,

    /// Script to run at startup: file.ck[:arg1[:arg2...]]
    #[arg(value_name = "file.ck")]
    pub script: Option<String>,
}

/// Script given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupScript {
    pub path: PathBuf,
    pub args: Vec<String>,
}

/// Validated host configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub engine: EngineParams,
    pub pipe_path: PathBuf,
    pub script: Option<StartupScript>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            engine: EngineParams::default(),
            pipe_path: PathBuf::from(DEFAULT_PIPE_PATH),
            script: None,
        }
    }
}

fn is_script_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == SCRIPT_EXTENSION)
}

impl HostConfig {
    /// Build the configuration from parsed arguments
    pub fn from_cli(cli: Cli) -> HostResult<Self> {
        if cli.sample_rate == 0 {
            return Err(HostError::Config("sample rate must be positive".to_string()));
        }
        if cli.block_size == 0 {
            return Err(HostError::Config("buffer size must be positive".to_string()));
        }
        if cli.channels == 0 {
            return Err(HostError::Config("channel count must be positive".to_string()));
        }

        let script = cli.script.as_deref().and_then(|spec| {
            let (path, args) = split_script_spec(spec);
            if is_script_path(&path) {
                Some(StartupScript { path, args })
            } else {
                log::warn!("Ignoring argument '{}': not a .{} file", spec, SCRIPT_EXTENSION);
                None
            }
        });

        Ok(Self {
            engine: EngineParams {
                sample_rate: cli.sample_rate,
                channels: cli.channels,
                block_size: cli.block_size,
                halt_when_idle: cli.halt,
            },
            pipe_path: cli.pipe,
            script,
        })
    }

    /// Interleaved samples per block
    pub fn samples_per_block(&self) -> usize {
        self.engine.block_size * self.engine.channels
    }
}
