//! Process-wide per-instruction latency profiler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::graph::Instruction;

/// Aggregated timing for one instruction identity.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionStats {
    pub instr_repr: String,
    pub source_hash: i64,
    pub count: u64,
    pub time_total: f64,
}

#[derive(Debug, Default)]
struct ProfilerState {
    t_total: f64,
    stats: HashMap<i64, InstructionStats>,
}

/// Singleton profiler aggregating call count and elapsed seconds per
/// instruction, keyed by the instruction's source hash so numbers
/// accumulate across runs and interpreter instances.
///
/// All mutation is serialized behind one mutex; leaving the profiler on
/// during parallel runs adds contention on that lock.
pub struct NativeProfiler {
    on: AtomicBool,
    state: Mutex<ProfilerState>,
}

static PROFILER: Lazy<NativeProfiler> = Lazy::new(|| NativeProfiler {
    on: AtomicBool::new(false),
    state: Mutex::new(ProfilerState::default()),
});

/// The process-wide profiler instance.
pub fn profiler() -> &'static NativeProfiler {
    &PROFILER
}

impl NativeProfiler {
    /// Begin recording. Interpreters skip timing entirely while off.
    pub fn start(&self) {
        self.on.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.on.store(false, Ordering::Relaxed);
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    /// Record one fire of `instr` taking `elapsed` seconds.
    pub fn update(&self, instr: &Instruction, elapsed: f64) {
        let mut state = self.state.lock().expect("profiler mutex poisoned");
        state
            .stats
            .entry(instr.source_hash())
            .and_modify(|entry| {
                entry.count += 1;
                entry.time_total += elapsed;
            })
            .or_insert_with(|| InstructionStats {
                instr_repr: instr.repr().to_string(),
                source_hash: instr.source_hash(),
                count: 1,
                time_total: elapsed,
            });
        state.t_total += elapsed;
    }

    /// Drop all records and reset the running total.
    pub fn clear_stats(&self) {
        let mut state = self.state.lock().expect("profiler mutex poisoned");
        state.stats.clear();
        state.t_total = 0.0;
    }

    /// Total elapsed seconds across every recorded fire.
    pub fn t_total(&self) -> f64 {
        self.state.lock().expect("profiler mutex poisoned").t_total
    }

    /// Snapshot of the per-instruction records, sorted by total time
    /// descending.
    pub fn instr_stats(&self) -> Vec<InstructionStats> {
        let state = self.state.lock().expect("profiler mutex poisoned");
        let mut entries: Vec<InstructionStats> = state.stats.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.time_total
                .partial_cmp(&a.time_total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries
    }

    /// Print the aggregated table to stdout.
    pub fn print_stats(&self) {
        let entries = self.instr_stats();
        if entries.is_empty() {
            crate::warning!("no instruction stats recorded");
            return;
        }
        let t_total = self.t_total();
        crate::log!(
            "{:<44} {:>8} {:>12} {:>12} {:>6}",
            "instruction",
            "count",
            "total (s)",
            "avg (s)",
            "%"
        );
        for entry in &entries {
            let avg = entry.time_total / entry.count as f64;
            let share = if t_total > 0.0 {
                entry.time_total / t_total * 100.0
            } else {
                0.0
            };
            crate::log!(
                "{:<44} {:>8} {:>12.6} {:>12.6} {:>5.1}%",
                truncate(&entry.instr_repr, 44),
                entry.count,
                entry.time_total,
                avg,
                share
            );
        }
        crate::log!("total: {:.6} s", t_total);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
