//! livehost: render audio to stdout while taking commands from a named pipe
//!
//! Usage: livehost [-r rate] [-b size] [-c chans] [-l level] [file.ck[:args]]
//!
//! Samples go to stdout as raw interleaved 32-bit integers, everything
//! else goes to stderr. Commands are written to the pipe, e.g.
//! `echo "+ drone.ck:110" > /tmp/livehost_cmd`.

use std::io::{self, BufWriter};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use livehost::channel::{CommandChannel, OpenMode};
use livehost::config::{Cli, HostConfig};
use livehost::logging;
use livehost::scheduler::Scheduler;
use livehost::tone::ToneEngine;

fn run(config: HostConfig) -> anyhow::Result<()> {
    // Blocks until a controller opens the pipe for writing
    let channel = CommandChannel::open(&config.pipe_path, OpenMode::WaitForWriter)?;

    // One block per write: each rendered block goes straight to the transport
    let output = BufWriter::with_capacity(config.samples_per_block() * 4, io::stdout().lock());

    let mut scheduler = Scheduler::new(ToneEngine::new(), channel, output, &config.engine)?;

    if let Some(script) = &config.script {
        scheduler.load_script(&script.path, &script.args)?;
    }

    scheduler.run().context("render loop aborted")?;
    Ok(())
}

fn main() -> ExitCode {
    // stdout carries audio, so help and usage errors go to stderr
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprint!("{}", e.render());
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    logging::init(cli.log_level);

    let config = match HostConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("livehost: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "livehost starting: {} Hz, {} frames, {} channels, pipe {}",
        config.engine.sample_rate,
        config.engine.block_size,
        config.engine.channels,
        config.pipe_path.display()
    );

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("livehost: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
