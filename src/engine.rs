//! Engine collaborator interface and control message queue
//!
//! The engine compiles script units, executes them and mixes their output
//! into a block buffer. The host only talks to it through [`Engine`]:
//! two synchronous compile paths, the render step, and one asynchronous
//! queue of [`ControlMessage`]s.
//!
//! # Ownership
//!
//! Messages are moved into the engine by [`Engine::submit`]. From then on
//! the engine disposes of them. A [`StatusReply`] is consumed by
//! [`StatusReply::deliver`], so the callback runs at most once, and the
//! snapshot it receives is dropped when the callback returns.

use std::fmt;
use std::path::Path;

use crate::error::EngineResult;
use crate::status::StatusSnapshot;

/// Id assigned by the engine when a unit is admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audio parameters fixed at engine init
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved output channels
    pub channels: usize,
    /// Frames per render step
    pub block_size: usize,
    /// Stop running once no units remain
    pub halt_when_idle: bool,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            block_size: 256,
            halt_when_idle: false,
        }
    }
}

/// Single-shot continuation for a status query
pub struct StatusReply(Box<dyn FnOnce(StatusSnapshot) + Send>);

impl StatusReply {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(StatusSnapshot) + Send + 'static,
    {
        Self(Box::new(callback))
    }

    /// Hand the snapshot to the callback, consuming both
    pub fn deliver(self, snapshot: StatusSnapshot) {
        (self.0)(snapshot)
    }
}

impl fmt::Debug for StatusReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusReply(..)")
    }
}

/// Asynchronous message for the engine's queue
///
/// `U` is the engine's compiled-unit handle.
#[derive(Debug)]
pub enum ControlMessage<U> {
    /// Admit a compiled unit with its positional arguments
    AddUnit { unit: U, args: Vec<String> },
    /// Remove a running unit; unknown ids are the engine's business
    RemoveUnit { id: UnitId },
    /// Produce a status snapshot and deliver it to `reply`
    StatusQuery { reply: StatusReply },
}

impl<U> ControlMessage<U> {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::AddUnit { .. } => "AddUnit",
            ControlMessage::RemoveUnit { .. } => "RemoveUnit",
            ControlMessage::StatusQuery { .. } => "StatusQuery",
        }
    }
}

/// Capacity of the control queue
///
/// Commands arrive at most one per render iteration, so a few dozen slots
/// cover any realistic gap between submission and the next render step.
pub const CONTROL_QUEUE_CAPACITY: usize = 64;

/// Create a control queue (producer/consumer pair)
pub fn control_queue<U>() -> (rtrb::Producer<ControlMessage<U>>, rtrb::Consumer<ControlMessage<U>>) {
    rtrb::RingBuffer::new(CONTROL_QUEUE_CAPACITY)
}

/// The engine as seen from the control plane
pub trait Engine {
    /// Compiled but not yet admitted unit
    type Unit;

    /// Apply audio parameters and prepare internal state
    fn init(&mut self, params: &EngineParams) -> EngineResult<()>;

    /// Begin execution; called once after `init`
    fn start(&mut self);

    /// False once the engine has halted
    fn is_running(&self) -> bool;

    /// Compile a script file without running it
    fn compile(&mut self, path: &Path, args: &[String]) -> EngineResult<Self::Unit>;

    /// Compile a script file and admit it immediately
    fn compile_and_run(&mut self, path: &Path, args: &[String]) -> EngineResult<UnitId>;

    /// Compile inline source under `name` and admit it immediately
    fn compile_inline(&mut self, source: &str, name: &str) -> EngineResult<UnitId>;

    /// Process queued messages and render one block into `output`
    ///
    /// `input` and `output` hold `frames × channels` interleaved samples.
    fn render_block(&mut self, input: &[f32], output: &mut [f32], frames: usize);

    /// Queue a control message for deferred processing
    fn submit(&mut self, message: ControlMessage<Self::Unit>);

    /// Id of the most recently admitted unit
    fn last_assigned_id(&self) -> Option<UnitId>;

    /// Wall-clock time of `start`, in microseconds since the Unix epoch
    fn start_time_micros(&self) -> Option<i64>;
}
