//! Reference engine
//!
//! A deliberately small [`Engine`] implementation: units are oscillator
//! patches (see [`patch`]), mixed to mono and copied to every output
//! channel. Control messages wait in a lock-free queue and are applied at
//! the start of the next `render_block`.

pub mod patch;

use std::fs;
use std::path::Path;

use crate::engine::{control_queue, ControlMessage, Engine, EngineParams, UnitId};
use crate::error::{EngineError, EngineResult};
use crate::generator::{Oscillator, RampGenerator, SignalGenerator};
use crate::status::{StatusSnapshot, UnitStatus};

pub use patch::{compile_patch, Patch, VoiceSpec};

/// Fade-in length for newly admitted units, in frames
pub const FADE_IN_FRAMES: usize = 64;

/// A unit admitted into the engine
struct RunningUnit {
    id: UnitId,
    name: String,
    /// Render clock at admission
    start: u64,
    /// Render clock at which the unit is removed
    end: Option<u64>,
    voices: Vec<Oscillator>,
    fade: RampGenerator,
}

impl RunningUnit {
    /// Silent units are reported as waiting
    fn is_waiting(&self) -> bool {
        self.voices.iter().all(|v| v.gain() == 0.0)
    }
}

/// Oscillator-patch engine
pub struct ToneEngine {
    params: EngineParams,
    queue_tx: rtrb::Producer<ControlMessage<Patch>>,
    queue_rx: rtrb::Consumer<ControlMessage<Patch>>,
    units: Vec<RunningUnit>,
    next_id: u64,
    last_id: Option<UnitId>,
    /// Render clock, in frames
    now: u64,
    running: bool,
    start_time: Option<i64>,
    /// Per-voice scratch, one block long
    voice_buffer: Vec<f32>,
    /// Fade gains for the current unit, one block long
    fade_buffer: Vec<f32>,
    /// Mono mix, one block long
    mix_buffer: Vec<f32>,
}

impl Default for ToneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneEngine {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = control_queue();
        Self {
            params: EngineParams::default(),
            queue_tx,
            queue_rx,
            units: Vec::new(),
            next_id: 1,
            last_id: None,
            now: 0,
            running: false,
            start_time: None,
            voice_buffer: Vec::new(),
            fade_buffer: Vec::new(),
            mix_buffer: Vec::new(),
        }
    }

    /// Number of admitted units
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Ids of admitted units, in admission order
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|u| u.id).collect()
    }

    /// Render clock, in frames
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Current engine state
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            now: self.now,
            sample_rate: self.params.sample_rate,
            units: self
                .units
                .iter()
                .map(|unit| UnitStatus {
                    id: unit.id,
                    name: unit.name.clone(),
                    start: unit.start,
                    waiting: unit.is_waiting(),
                })
                .collect(),
        }
    }

    /// Admit a compiled patch and assign it an id
    fn admit(&mut self, patch: Patch, args: Vec<String>) -> UnitId {
        let id = UnitId(self.next_id);
        self.next_id += 1;

        let sample_rate = self.params.sample_rate;
        let voices = patch
            .voices
            .iter()
            .map(|v| Oscillator::new(v.waveform, v.frequency, v.gain, sample_rate))
            .collect();
        let end = patch
            .duration
            .map(|seconds| {
                // Float-to-int casts saturate; huge durations clamp to "never"
                let frames = (seconds as f64 * sample_rate as f64).round() as u64;
                self.now.saturating_add(frames)
            });

        log::info!("Admitted unit {} ({}) args={:?}", id, patch.name, args);

        self.units.push(RunningUnit {
            id,
            name: patch.name,
            start: self.now,
            end,
            voices,
            fade: RampGenerator::new(FADE_IN_FRAMES),
        });
        self.last_id = Some(id);
        id
    }

    fn remove(&mut self, id: UnitId) {
        match self.units.iter().position(|u| u.id == id) {
            Some(index) => {
                let unit = self.units.remove(index);
                log::info!("Removed unit {} ({})", unit.id, unit.name);
            }
            None => log::warn!("Cannot remove unit {}: no such unit", id),
        }
    }

    /// Apply everything waiting in the control queue
    fn process_messages(&mut self) {
        while let Ok(message) = self.queue_rx.pop() {
            log::trace!("Processing {}", message.kind());
            match message {
                ControlMessage::AddUnit { unit, args } => {
                    self.admit(unit, args);
                }
                ControlMessage::RemoveUnit { id } => self.remove(id),
                ControlMessage::StatusQuery { reply } => reply.deliver(self.snapshot()),
            }
        }
    }

    /// Drop units whose duration has elapsed
    fn retire_expired(&mut self) {
        let now = self.now;
        self.units.retain(|unit| match unit.end {
            Some(end) if end <= now => {
                log::info!("Unit {} ({}) finished", unit.id, unit.name);
                false
            }
            _ => true,
        });
    }

    fn read_source(path: &Path) -> EngineResult<String> {
        fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn unit_name(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }
}

impl Engine for ToneEngine {
    type Unit = Patch;

    fn init(&mut self, params: &EngineParams) -> EngineResult<()> {
        if params.sample_rate == 0 || params.channels == 0 || params.block_size == 0 {
            return Err(EngineError::Init(format!(
                "sample rate, channels and block size must be non-zero (got {} Hz, {} ch, {} frames)",
                params.sample_rate, params.channels, params.block_size
            )));
        }

        self.params = params.clone();
        self.voice_buffer = vec![0.0; params.block_size];
        self.fade_buffer = vec![0.0; params.block_size];
        self.mix_buffer = vec![0.0; params.block_size];

        log::debug!(
            "Engine initialized: {} Hz, {} channels, {} frames/block",
            params.sample_rate,
            params.channels,
            params.block_size
        );
        Ok(())
    }

    fn start(&mut self) {
        self.running = true;
        self.start_time = Some(chrono::Utc::now().timestamp_micros());
        log::debug!("Engine started");
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn compile(&mut self, path: &Path, args: &[String]) -> EngineResult<Patch> {
        let source = Self::read_source(path)?;
        compile_patch(&Self::unit_name(path), &source, args)
    }

    fn compile_and_run(&mut self, path: &Path, args: &[String]) -> EngineResult<UnitId> {
        let patch = self.compile(path, args)?;
        Ok(self.admit(patch, args.to_vec()))
    }

    fn compile_inline(&mut self, source: &str, name: &str) -> EngineResult<UnitId> {
        let patch = compile_patch(name, source, &[])?;
        Ok(self.admit(patch, Vec::new()))
    }

    fn render_block(&mut self, _input: &[f32], output: &mut [f32], frames: usize) {
        self.process_messages();

        let channels = self.params.channels.max(1);
        let frames = frames
            .min(self.mix_buffer.len())
            .min(output.len() / channels);

        let mix = &mut self.mix_buffer[..frames];
        mix.fill(0.0);
        let voice_out = &mut self.voice_buffer[..frames];
        let fade = &mut self.fade_buffer[..frames];

        for unit in &mut self.units {
            unit.fade.process(fade);
            for voice in &mut unit.voices {
                voice.process(voice_out);
                for ((m, &v), &g) in mix.iter_mut().zip(voice_out.iter()).zip(fade.iter()) {
                    *m += v * g;
                }
            }
        }

        output.fill(0.0);
        for (frame, &sample) in output.chunks_mut(channels).zip(mix.iter()) {
            frame.fill(sample);
        }

        self.now += frames as u64;
        self.retire_expired();

        if self.params.halt_when_idle && self.units.is_empty() && self.running {
            log::info!("No units left, halting");
            self.running = false;
        }
    }

    fn submit(&mut self, message: ControlMessage<Patch>) {
        if let Err(rtrb::PushError::Full(message)) = self.queue_tx.push(message) {
            log::warn!("Engine queue full, dropping {}", message.kind());
        }
    }

    fn last_assigned_id(&self) -> Option<UnitId> {
        self.last_id
    }

    fn start_time_micros(&self) -> Option<i64> {
        self.start_time
    }
}
