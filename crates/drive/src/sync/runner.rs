//! Scheduling shell around the engine
//!
//! Runs the engine once, or repeatedly with a pause after each cycle until
//! stopped. A failing cycle is logged and counted; it never ends the loop.

use log::{debug, error, info};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use super::ReconciliationEngine;

/// Loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Sleeping,
    Stopping,
    Terminated,
}

/// Cooperative stop request shared between the loop and a signal handler
///
/// Cloning yields a handle to the same flag. Stopping wakes a sleeping
/// loop immediately.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap()
    }

    /// Sleep for up to `timeout`; returns true if stopped meanwhile
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap();
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap();
        *guard
    }
}

/// Totals across the cycles a loop ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    /// Cycles that aborted before uploading anything
    pub failed_cycles: u64,
    pub uploaded: usize,
    pub final_state: LoopState,
}

/// Runs a [`ReconciliationEngine`] once or on a fixed pause
pub struct SyncLoop {
    engine: ReconciliationEngine,
    interval: Duration,
    stop: StopSignal,
    state: LoopState,
}

impl SyncLoop {
    /// `interval` is the pause after each cycle completes
    pub fn new(engine: ReconciliationEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            stop: StopSignal::new(),
            state: LoopState::Idle,
        }
    }

    /// Handle for requesting a stop from another thread
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run exactly one cycle, then release resources
    pub fn run_once(mut self) -> LoopSummary {
        let mut summary = self.summary();
        self.cycle(&mut summary);
        self.finish(summary)
    }

    /// Run cycles until the stop signal fires, then release resources
    ///
    /// The stop signal is honoured between cycles and while sleeping; an
    /// in-flight cycle always completes.
    pub fn run(mut self) -> LoopSummary {
        info!(
            "Starting sync loop for {} every {:?}",
            self.engine.watch_dir().display(),
            self.interval
        );
        let mut summary = self.summary();

        while !self.stop.is_stopped() {
            self.cycle(&mut summary);
            if self.stop.is_stopped() {
                break;
            }

            self.transition(LoopState::Sleeping);
            info!("Sleeping for {} seconds", self.interval.as_secs_f64());
            if self.stop.wait(self.interval) {
                break;
            }
        }

        info!("Sync loop stopped by request");
        self.finish(summary)
    }

    fn summary(&self) -> LoopSummary {
        LoopSummary {
            cycles: 0,
            failed_cycles: 0,
            uploaded: 0,
            final_state: self.state,
        }
    }

    fn cycle(&mut self, summary: &mut LoopSummary) {
        self.transition(LoopState::Running);
        summary.cycles += 1;
        match self.engine.run_cycle() {
            Ok(stats) => summary.uploaded += stats.uploaded,
            Err(e) => {
                error!("Error during sync: {}", e);
                summary.failed_cycles += 1;
            }
        }
    }

    fn finish(mut self, mut summary: LoopSummary) -> LoopSummary {
        self.transition(LoopState::Stopping);
        self.engine.shutdown();
        summary.final_state = LoopState::Terminated;
        debug!("Sync loop terminated after {} cycles", summary.cycles);
        summary
    }

    fn transition(&mut self, next: LoopState) {
        debug!("Sync loop {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
