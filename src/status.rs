//! Status snapshots and the human-readable status report

use std::fmt::Write;

use crate::engine::UnitId;

/// One running unit as seen at snapshot time
#[derive(Debug, Clone, PartialEq)]
pub struct UnitStatus {
    pub id: UnitId,
    pub name: String,
    /// Render clock value at admission, in samples
    pub start: u64,
    /// Waiting on an event rather than producing sound
    pub waiting: bool,
}

/// Engine state delivered to a status query's reply callback
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// Render clock, in samples
    pub now: u64,
    pub sample_rate: u32,
    pub units: Vec<UnitStatus>,
}

impl StatusSnapshot {
    pub fn empty(sample_rate: u32) -> Self {
        Self {
            now: 0,
            sample_rate,
            units: Vec::new(),
        }
    }

    /// Elapsed render time as (hours, minutes, seconds)
    pub fn elapsed_hms(&self) -> (u64, u64, u64) {
        let total_seconds = self.now / self.sample_rate.max(1) as u64;
        (
            total_seconds / 3600,
            (total_seconds % 3600) / 60,
            total_seconds % 60,
        )
    }

    /// Seconds a unit has been running
    pub fn unit_age_seconds(&self, unit: &UnitStatus) -> f64 {
        self.now.saturating_sub(unit.start) as f64 / self.sample_rate.max(1) as f64
    }
}

/// Format a snapshot as a multi-line report
pub fn format_report(snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();
    let (h, m, s) = snapshot.elapsed_hms();

    // Writing to a String cannot fail
    let _ = writeln!(out, "-------------------------------");
    let _ = writeln!(out, "# of units in engine: {}", snapshot.units.len());
    let _ = writeln!(out, "engine time: {}::samp ({}h{}m{}s)", snapshot.now, h, m, s);

    if !snapshot.units.is_empty() {
        let _ = writeln!(out, "--------");
        for unit in &snapshot.units {
            let _ = writeln!(
                out,
                "[unit] id: {} source: {} running: {:.3}s state: {}",
                unit.id,
                unit.name,
                snapshot.unit_age_seconds(unit),
                if unit.waiting {
                    "(waiting on event)"
                } else {
                    "ACTIVE"
                }
            );
        }
        let _ = writeln!(out, "--------");
    }

    out
}
