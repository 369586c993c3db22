//! Render loop scheduler
//!
//! The single coordination point between control and audio. Each iteration
//! polls the command channel once, dispatches at most one command, renders
//! one block, encodes it and writes it out. Everything runs on the calling
//! thread; nothing in an iteration blocks.

use std::fs::File;
use std::io::{self, Read, Write};

use crate::bridge::ControlBridge;
use crate::channel::CommandChannel;
use crate::codec;
use crate::command::parse;
use crate::engine::{Engine, EngineParams, UnitId};
use crate::error::{HostError, HostResult};

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// Input, output and encode buffers, allocated once and reused
pub struct AudioBlock {
    /// Frames per block
    frames: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    encoded: Vec<i32>,
}

impl AudioBlock {
    pub fn new(frames: usize, channels: usize) -> Self {
        let samples = frames * channels;
        Self {
            frames,
            input: vec![0.0; samples],
            output: vec![0.0; samples],
            encoded: vec![0; samples],
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Interleaved samples per block
    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }
}

/// Drives the engine, the command channel and the output transport
///
/// `R` is the channel's byte source, `W` the output transport.
pub struct Scheduler<E: Engine, R: Read = File, W: Write = io::Stdout> {
    engine: E,
    channel: Option<CommandChannel<R>>,
    output: W,
    bridge: ControlBridge,
    block: Option<AudioBlock>,
    state: LoopState,
    blocks_written: u64,
    output_error: Option<io::Error>,
}

impl<E: Engine, R: Read, W: Write> Scheduler<E, R, W> {
    /// Initialize and start the engine and allocate the audio buffers
    pub fn new(
        mut engine: E,
        channel: CommandChannel<R>,
        output: W,
        params: &EngineParams,
    ) -> HostResult<Self> {
        engine.init(params).map_err(HostError::EngineInit)?;
        engine.start();

        log::info!(
            "Engine running: {} Hz, {} channels, {} frames/block",
            params.sample_rate,
            params.channels,
            params.block_size
        );

        Ok(Self {
            engine,
            channel: Some(channel),
            output,
            bridge: ControlBridge::new(),
            block: Some(AudioBlock::new(params.block_size, params.channels)),
            state: LoopState::Running,
            blocks_written: 0,
            output_error: None,
        })
    }

    /// Replace the control bridge (custom reporter)
    pub fn with_bridge(mut self, bridge: ControlBridge) -> Self {
        self.bridge = bridge;
        self
    }

    /// Compile and admit a script before the loop starts
    pub fn load_script(&mut self, path: &std::path::Path, args: &[String]) -> HostResult<UnitId> {
        let id = self
            .engine
            .compile_and_run(path, args)
            .map_err(|source| HostError::ScriptCompile {
                path: path.to_path_buf(),
                source,
            })?;
        self.bridge.record_admission(id);
        log::info!("Running {} as unit {}", path.display(), id);
        Ok(id)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn bridge(&self) -> &ControlBridge {
        &self.bridge
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    /// Run one loop iteration
    pub fn step(&mut self) -> LoopState {
        if self.state != LoopState::Running {
            return self.state;
        }

        // 1. At most one command per iteration
        if let Some(record) = self.channel.as_mut().and_then(|channel| channel.poll()) {
            let command = parse(record.text());
            log::debug!("Command {}: {:?}", command.kind(), record.text());
            self.bridge.dispatch(&mut self.engine, command);
        }

        if self.bridge.stop_requested() {
            self.state = LoopState::Stopping;
            return self.state;
        }

        let Some(block) = self.block.as_mut() else {
            self.state = LoopState::Stopping;
            return self.state;
        };

        // 2. Render
        self.engine
            .render_block(&block.input, &mut block.output, block.frames);
        self.bridge.observe_admissions(&self.engine);

        // 3. Encode and emit
        codec::encode(&block.output, &mut block.encoded);
        if let Err(e) = codec::write_block(&mut self.output, &block.encoded) {
            log::error!("Output transport failed: {}", e);
            self.output_error = Some(e);
            self.state = LoopState::Stopping;
            return self.state;
        }
        self.blocks_written += 1;

        // 4. Engine halt
        if !self.engine.is_running() {
            log::info!("Engine stopped running");
            self.state = LoopState::Stopping;
        }

        self.state
    }

    /// Release buffers, flush output, close and remove the channel
    pub fn teardown(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }

        if let Err(e) = self.output.flush() {
            log::error!("Failed to flush output: {}", e);
            self.output_error.get_or_insert(e);
        }
        self.block = None;
        if let Some(channel) = self.channel.take() {
            channel.close();
        }

        log::info!("Stopped after {} blocks", self.blocks_written);
        self.state = LoopState::Stopped;
    }

    /// Loop until stopped, then tear down
    ///
    /// Fails only when the output transport failed.
    pub fn run(&mut self) -> HostResult<()> {
        while self.step() == LoopState::Running {}
        self.teardown();

        match self.output_error.take() {
            Some(e) => Err(HostError::Output(e)),
            None => Ok(()),
        }
    }
}
