/// Soft debug layer - hazard and misuse statistics with a colored report
///
/// Every soft context owns a tracker of atomic counters. The tracker is
/// shared with [`SoftDebug`] handles, so statistics stay readable after the
/// context is boxed into a device context.

use colored::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of a soft context's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftStats {
    /// Set-range calls on shader slots
    pub set_range_calls: u64,
    /// Shader slots written by set-range calls
    pub slots_written: u64,
    pub draws: u64,
    pub dispatches: u64,
    /// A resource was bound in a role conflicting with one it already held
    pub hazards: u64,
    /// Calls the soft context ignored (unknown handle, slot out of range, missing shader)
    pub misuse: u64,
    pub command_lists_recorded: u64,
    pub command_lists_executed: u64,
}

impl SoftStats {
    /// Hazards plus misuse
    pub fn problems(&self) -> u64 {
        self.hazards + self.misuse
    }
}

#[derive(Debug, Default)]
pub(crate) struct SoftStatsTracker {
    set_range_calls: AtomicU64,
    slots_written: AtomicU64,
    draws: AtomicU64,
    dispatches: AtomicU64,
    hazards: AtomicU64,
    misuse: AtomicU64,
    command_lists_recorded: AtomicU64,
    command_lists_executed: AtomicU64,
}

impl SoftStatsTracker {
    pub(crate) fn record_set_range(&self, slots: usize) {
        self.set_range_calls.fetch_add(1, Ordering::Relaxed);
        self.slots_written.fetch_add(slots as u64, Ordering::Relaxed);
    }

    pub(crate) fn increment_draw(&self) {
        self.draws.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_hazard(&self) {
        self.hazards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_misuse(&self) {
        self.misuse.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_recorded(&self) {
        self.command_lists_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_executed(&self) {
        self.command_lists_executed.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> SoftStats {
        SoftStats {
            set_range_calls: self.set_range_calls.load(Ordering::Relaxed),
            slots_written: self.slots_written.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            hazards: self.hazards.load(Ordering::Relaxed),
            misuse: self.misuse.load(Ordering::Relaxed),
            command_lists_recorded: self.command_lists_recorded.load(Ordering::Relaxed),
            command_lists_executed: self.command_lists_executed.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.set_range_calls,
            &self.slots_written,
            &self.draws,
            &self.dispatches,
            &self.hazards,
            &self.misuse,
            &self.command_lists_recorded,
            &self.command_lists_executed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Shared handle to the statistics of one soft context
#[derive(Debug, Clone)]
pub struct SoftDebug {
    tracker: Arc<SoftStatsTracker>,
}

impl SoftDebug {
    pub(crate) fn new(tracker: Arc<SoftStatsTracker>) -> Self {
        Self { tracker }
    }

    pub fn stats(&self) -> SoftStats {
        self.tracker.get_stats()
    }

    pub fn reset(&self) {
        self.tracker.reset();
    }
}

/// Print a colored statistics report to stdout
pub fn print_stats_report(stats: &SoftStats) {
    println!("\n{}", "=== Soft Context Statistics Report ===".bright_blue().bold());

    println!("  {} {} ({} slots)", "Set-range calls:".white().bold(), stats.set_range_calls, stats.slots_written);
    println!("  {} {}", "Draws:".white().bold(), stats.draws);
    println!("  {} {}", "Dispatches:".white().bold(), stats.dispatches);
    if stats.command_lists_recorded > 0 || stats.command_lists_executed > 0 {
        println!(
            "  {} {} recorded, {} executed",
            "Command lists:".cyan(),
            stats.command_lists_recorded, stats.command_lists_executed
        );
    }

    if stats.problems() == 0 {
        println!("  {}", "✓ No hazards or misuse".green().bold());
    } else {
        if stats.hazards > 0 {
            println!("  {} {}", "Hazards:".red().bold(), stats.hazards);
        }
        if stats.misuse > 0 {
            println!("  {} {}", "Misuse:".yellow().bold(), stats.misuse);
        }
    }

    println!("{}\n", "======================================".bright_blue().bold());
}
