//! Control plane for a live-coding audio host
//!
//! Runs a fixed-block render loop while absorbing out-of-band commands
//! from a named pipe:
//! - channel: non-blocking side-channel reader
//! - command: command grammar and id parsing
//! - bridge: command → engine call / control message translation
//! - scheduler: the render loop itself
//! - codec: float → fixed-point block conversion
//!
//! The engine is a collaborator behind the [`engine::Engine`] trait;
//! [`tone::ToneEngine`] is a small reference implementation.

pub mod bridge;
pub mod channel;
pub mod codec;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod logging;
pub mod scheduler;
pub mod status;
pub mod tone;

pub use bridge::{ControlBridge, Dispatch};
pub use channel::{CommandChannel, CommandRecord, OpenMode};
pub use command::{parse, parse_id, Command};
pub use config::{Cli, HostConfig};
pub use engine::{ControlMessage, Engine, EngineParams, StatusReply, UnitId};
pub use error::{EngineError, HostError, IdParseError};
pub use scheduler::{LoopState, Scheduler};
pub use status::{StatusSnapshot, UnitStatus};
pub use tone::ToneEngine;
