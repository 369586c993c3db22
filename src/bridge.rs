//! Engine control bridge
//!
//! Turns parsed commands into engine calls. Compilation is synchronous and
//! its errors are reported inline; admission, removal and status queries
//! go through the engine's asynchronous queue.
//!
//! Nothing here is fatal: every failure is logged and the render loop
//! carries on.

use std::sync::Arc;

use crate::command::Command;
use crate::engine::{ControlMessage, Engine, StatusReply, UnitId};
use crate::status::format_report;

/// Sink for requested reports (status, start time)
///
/// Shared with reply callbacks, which may run whenever the engine chooses.
pub type Reporter = Arc<dyn Fn(&str) + Send + Sync>;

/// Reporter writing to stderr
pub fn stderr_reporter() -> Reporter {
    Arc::new(|report: &str| eprint!("{}", report))
}

/// Outcome of dispatching one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Stop,
}

/// Translates commands into engine interactions
pub struct ControlBridge {
    /// Most recently admitted unit, for diagnostics
    last_id: Option<UnitId>,
    stop_requested: bool,
    reporter: Reporter,
}

impl Default for ControlBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlBridge {
    pub fn new() -> Self {
        Self::with_reporter(stderr_reporter())
    }

    pub fn with_reporter(reporter: Reporter) -> Self {
        Self {
            last_id: None,
            stop_requested: false,
            reporter,
        }
    }

    pub fn last_id(&self) -> Option<UnitId> {
        self.last_id
    }

    /// Set once `exit` has been received
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Record an id admitted outside `dispatch` (startup script)
    pub fn record_admission(&mut self, id: UnitId) {
        self.last_id = Some(id);
    }

    /// Pick up ids the engine assigned while processing its queue
    pub fn observe_admissions<E: Engine>(&mut self, engine: &E) {
        if let Some(id) = engine.last_assigned_id() {
            if self.last_id != Some(id) {
                log::info!("Unit {} admitted", id);
                self.last_id = Some(id);
            }
        }
    }

    /// Carry out one command
    pub fn dispatch<E: Engine>(&mut self, engine: &mut E, command: Command) -> Dispatch {
        match command {
            Command::Shutdown => {
                log::info!("exit command received, shutting down");
                self.stop_requested = true;
                return Dispatch::Stop;
            }
            Command::EvalCode { source } => match engine.compile_inline(&source, "eval") {
                Ok(id) => {
                    self.last_id = Some(id);
                    log::info!("eval'd code block as unit {}: {{{}}}", id, source);
                }
                Err(e) => log::error!("Failed to eval code block: {}", e),
            },
            Command::AddScript { path, args } => match engine.compile(&path, &args) {
                Ok(unit) => {
                    log::debug!("Compiled {}, queueing for admission", path.display());
                    engine.submit(ControlMessage::AddUnit { unit, args });
                }
                Err(e) => log::error!("Failed to compile {}: {}", path.display(), e),
            },
            Command::RemoveScript { id } => {
                log::debug!("Queueing removal of unit {}", id);
                engine.submit(ControlMessage::RemoveUnit { id });
            }
            Command::QueryStatus => {
                let reporter = Arc::clone(&self.reporter);
                let reply = StatusReply::new(move |snapshot| {
                    reporter(&format_report(&snapshot));
                });
                engine.submit(ControlMessage::StatusQuery { reply });
            }
            Command::StartTime => match engine.start_time_micros() {
                Some(micros) => {
                    (self.reporter)(&format!("Engine start time in microseconds: {}\n", micros))
                }
                None => log::warn!("Engine has not been started"),
            },
            Command::Unrecognized { raw } => {
                log::warn!("*** unrecognized command: {} ***", raw);
            }
        }

        Dispatch::Continue
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::command::parse;
    use crate::error::{EngineError, EngineResult};
    use crate::engine::EngineParams;
    use crate::status::StatusSnapshot;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Engine double that records every call
    #[derive(Default)]
    pub(crate) struct MockEngine {
        pub compiled: Vec<(PathBuf, Vec<String>)>,
        pub inline: Vec<(String, String)>,
        pub submitted: Vec<ControlMessage<String>>,
        pub renders: usize,
        pub fail_compile: bool,
        pub running: bool,
        /// Stop running after this many renders
        pub halt_after: Option<usize>,
        pub next_id: u64,
        pub last_id: Option<UnitId>,
    }

    impl MockEngine {
        pub(crate) fn submitted_kinds(&self) -> Vec<&'static str> {
            self.submitted.iter().map(|m| m.kind()).collect()
        }
    }

    impl Engine for MockEngine {
        type Unit = String;

        fn init(&mut self, params: &EngineParams) -> EngineResult<()> {
            if params.block_size == 0 {
                return Err(EngineError::Init("zero block size".to_string()));
            }
            Ok(())
        }

        fn start(&mut self) {
            self.running = true;
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn compile(&mut self, path: &Path, args: &[String]) -> EngineResult<String> {
            self.compiled.push((path.to_path_buf(), args.to_vec()));
            if self.fail_compile {
                return Err(EngineError::Compile {
                    name: path.display().to_string(),
                    line: 1,
                    message: "syntax error".to_string(),
                });
            }
            Ok(path.display().to_string())
        }

        fn compile_and_run(&mut self, path: &Path, args: &[String]) -> EngineResult<UnitId> {
            self.compile(path, args)?;
            self.next_id += 1;
            self.last_id = Some(UnitId(self.next_id));
            Ok(UnitId(self.next_id))
        }

        fn compile_inline(&mut self, source: &str, name: &str) -> EngineResult<UnitId> {
            self.inline.push((source.to_string(), name.to_string()));
            if self.fail_compile {
                return Err(EngineError::Compile {
                    name: name.to_string(),
                    line: 1,
                    message: "syntax error".to_string(),
                });
            }
            self.next_id += 1;
            self.last_id = Some(UnitId(self.next_id));
            Ok(UnitId(self.next_id))
        }

        fn render_block(&mut self, _input: &[f32], output: &mut [f32], _frames: usize) {
            // Admit queued units the way a real engine would
            for message in &self.submitted {
                if let ControlMessage::AddUnit { .. } = message {
                    self.next_id += 1;
                    self.last_id = Some(UnitId(self.next_id));
                }
            }
            self.submitted.retain(|m| !matches!(m, ControlMessage::AddUnit { .. }));

            output.fill(0.25);
            self.renders += 1;
            if self.halt_after.is_some_and(|n| self.renders >= n) {
                self.running = false;
            }
        }

        fn submit(&mut self, message: ControlMessage<String>) {
            self.submitted.push(message);
        }

        fn last_assigned_id(&self) -> Option<UnitId> {
            self.last_id
        }

        fn start_time_micros(&self) -> Option<i64> {
            self.running.then_some(1_700_000_000_000_000)
        }
    }

    pub(crate) fn collecting_reporter() -> (Reporter, Arc<Mutex<Vec<String>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let reporter: Reporter = Arc::new(move |report: &str| {
            sink.lock().unwrap().push(report.to_string());
        });
        (reporter, reports)
    }

    fn running_mock() -> MockEngine {
        MockEngine {
            running: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_shutdown_sets_flag_only() {
        let mut engine = running_mock();
        let mut bridge = ControlBridge::new();

        assert!(!bridge.stop_requested());
        assert_eq!(bridge.dispatch(&mut engine, Command::Shutdown), Dispatch::Stop);
        assert!(bridge.stop_requested());
        assert!(engine.submitted.is_empty());
        assert!(engine.compiled.is_empty());
    }

    #[test]
    fn test_eval_records_id() {
        let mut engine = running_mock();
        let mut bridge = ControlBridge::new();

        bridge.dispatch(&mut engine, parse("{ sine 440 }"));
        assert_eq!(engine.inline, vec![(" sine 440 ".to_string(), "eval".to_string())]);
        assert_eq!(bridge.last_id(), Some(UnitId(1)));
        assert!(engine.submitted.is_empty());
    }

    #[test]
    fn test_eval_failure_queues_nothing() {
        let mut engine = MockEngine {
            fail_compile: true,
            ..running_mock()
        };
        let mut bridge = ControlBridge::new();

        assert_eq!(
            bridge.dispatch(&mut engine, parse("{ broken }")),
            Dispatch::Continue
        );
        assert_eq!(bridge.last_id(), None);
        assert!(engine.submitted.is_empty());
    }

    #[test]
    fn test_add_script_compiles_then_queues() {
        let mut engine = running_mock();
        let mut bridge = ControlBridge::new();

        bridge.dispatch(&mut engine, parse("+ demo.ck:440:0.5"));

        assert_eq!(
            engine.compiled,
            vec![(
                PathBuf::from("demo.ck"),
                vec!["440".to_string(), "0.5".to_string()]
            )]
        );
        match &engine.submitted[..] {
            [ControlMessage::AddUnit { unit, args }] => {
                assert_eq!(unit, "demo.ck");
                assert_eq!(args, &vec!["440".to_string(), "0.5".to_string()]);
            }
            other => panic!("unexpected queue: {:?}", other),
        }
        // Id only becomes known after the engine admits the unit
        assert_eq!(bridge.last_id(), None);
    }

    #[test]
    fn test_add_script_compile_failure() {
        let mut engine = MockEngine {
            fail_compile: true,
            ..running_mock()
        };
        let mut bridge = ControlBridge::new();

        bridge.dispatch(&mut engine, parse("+ broken.ck"));
        assert_eq!(engine.compiled.len(), 1);
        assert!(engine.submitted.is_empty());
    }

    #[test]
    fn test_remove_queues_without_validation() {
        let mut engine = running_mock();
        let mut bridge = ControlBridge::new();

        bridge.dispatch(&mut engine, parse("- 0x2a"));
        bridge.dispatch(&mut engine, parse("- 7"));

        match &engine.submitted[..] {
            [ControlMessage::RemoveUnit { id: first }, ControlMessage::RemoveUnit { id: second }] => {
                assert_eq!(*first, UnitId(42));
                assert_eq!(*second, UnitId(7));
            }
            other => panic!("unexpected queue: {:?}", other),
        }
    }

    #[test]
    fn test_status_reply_reports_once() {
        let mut engine = running_mock();
        let (reporter, reports) = collecting_reporter();
        let mut bridge = ControlBridge::with_reporter(reporter);

        bridge.dispatch(&mut engine, Command::QueryStatus);
        assert!(reports.lock().unwrap().is_empty());

        // Play the engine's part: deliver the snapshot to the reply
        match engine.submitted.pop() {
            Some(ControlMessage::StatusQuery { reply }) => {
                reply.deliver(StatusSnapshot::empty(48000));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("# of units in engine: 0"));
    }

    #[test]
    fn test_start_time_report() {
        let mut engine = running_mock();
        let (reporter, reports) = collecting_reporter();
        let mut bridge = ControlBridge::with_reporter(reporter);

        bridge.dispatch(&mut engine, Command::StartTime);
        assert_eq!(
            reports.lock().unwrap().as_slice(),
            ["Engine start time in microseconds: 1700000000000000\n".to_string()]
        );
    }

    #[test]
    fn test_unrecognized_touches_nothing() {
        let mut engine = running_mock();
        let mut bridge = ControlBridge::new();

        let outcome = bridge.dispatch(&mut engine, parse("not a real command"));
        assert_eq!(outcome, Dispatch::Continue);
        assert!(!bridge.stop_requested());
        assert!(engine.submitted.is_empty());
        assert!(engine.compiled.is_empty());
        assert!(engine.inline.is_empty());
    }

    #[test]
    fn test_observe_admissions() {
        let mut engine = running_mock();
        let mut bridge = ControlBridge::new();

        bridge.observe_admissions(&engine);
        assert_eq!(bridge.last_id(), None);

        engine.last_id = Some(UnitId(5));
        bridge.observe_admissions(&engine);
        assert_eq!(bridge.last_id(), Some(UnitId(5)));
    }
}
