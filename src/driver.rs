//! Background stepping for a [`Core`].
//!
//! [`Machine`] owns the core behind a mutex and at most one driver thread
//! that calls [`Core::step`] once per cycle period. Each driver has its own
//! "should continue" flag, checked under the core lock before every step,
//! so a stop request always lands before the next step.

use crate::cpu::{Core, CpuError, CpuSnapshot};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default delay between steps, in milliseconds.
pub const DEFAULT_CYCLE_MS: u64 = 5;

struct Driver {
    signal: DriverSignal,
    handle: JoinHandle<()>,
}

// The "should continue" flag of one driver plus its thread, for unparking.
#[derive(Clone)]
struct DriverSignal {
    active: Arc<AtomicBool>,
    thread: Thread,
}

impl DriverSignal {
    fn raise(&self) {
        self.active.store(false, Ordering::Release);
        self.thread.unpark();
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Cloneable handle that lets other threads stop or reset a [`Machine`]
/// without owning it.
#[derive(Clone)]
pub struct ControlHandle {
    core: Arc<Mutex<Core>>,
    current: Arc<Mutex<Option<DriverSignal>>>,
    fault: Arc<Mutex<Option<CpuError>>>,
}

impl ControlHandle {
    /// Ask the active driver, if any, to stop before its next step.
    /// Does not wait for the thread to exit.
    pub fn stop(&self) {
        if let Ok(current) = self.current.lock() {
            if let Some(signal) = current.as_ref() {
                signal.raise();
            }
        }
    }

    /// Stop the active driver and reset the core.
    pub fn reset(&self) -> Result<(), DriverError> {
        self.stop();
        self.core.lock().map_err(|_| DriverError::Poisoned)?.reset();
        if let Ok(mut fault) = self.fault.lock() {
            *fault = None;
        }
        info!("reset (remote)");
        Ok(())
    }

    /// Whether a driver is currently stepping the core.
    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .map(|c| c.as_ref().is_some_and(DriverSignal::is_active))
            .unwrap_or(false)
    }
}

/// A core plus the thread that ticks it.
pub struct Machine {
    core: Arc<Mutex<Core>>,
    cycle_ms: u64,
    driver: Option<Driver>,
    current: Arc<Mutex<Option<DriverSignal>>>,
    fault: Arc<Mutex<Option<CpuError>>>,
    drivers_started: Arc<AtomicU64>,
}

impl Machine {
    pub fn new(core: Core) -> Self {
        Self {
            core: Arc::new(Mutex::new(core)),
            cycle_ms: DEFAULT_CYCLE_MS,
            driver: None,
            current: Arc::new(Mutex::new(None)),
            fault: Arc::new(Mutex::new(None)),
            drivers_started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Set the delay between steps used by the next [`Machine::run`].
    /// Zero is treated as 1 ms.
    pub fn set_cycle(&mut self, period_ms: u64) {
        self.cycle_ms = period_ms.max(1);
    }

    /// Current delay between steps, in milliseconds.
    pub fn cycle_ms(&self) -> u64 {
        self.cycle_ms
    }

    /// Steps per second at the current cycle period.
    pub fn ticks_per_second(&self) -> u64 {
        1000 / self.cycle_ms
    }

    /// Start periodic stepping. Does nothing if a driver is already active.
    pub fn run(&mut self) -> Result<(), DriverError> {
        if self.is_running() {
            return Ok(());
        }
        self.reap();

        let active = Arc::new(AtomicBool::new(true));
        let core = Arc::clone(&self.core);
        let fault = Arc::clone(&self.fault);
        let period = Duration::from_millis(self.cycle_ms);
        let flag = Arc::clone(&active);

        let handle = thread::Builder::new()
            .name("td4-driver".into())
            .spawn(move || drive(core, flag, period, fault))
            .map_err(DriverError::Spawn)?;

        let signal = DriverSignal { active, thread: handle.thread().clone() };
        if let Ok(mut current) = self.current.lock() {
            *current = Some(signal.clone());
        }

        let n = self.drivers_started.fetch_add(1, Ordering::Relaxed) + 1;
        info!("run: driver #{} at {} ms/step", n, self.cycle_ms);
        self.driver = Some(Driver { signal, handle });
        Ok(())
    }

    /// Ask the driver to stop and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.signal.raise();
            if driver.handle.join().is_err() {
                warn!("driver thread panicked");
            }
            self.clear_current();
            info!("stop");
        }
    }

    /// Stop the driver and reset the core.
    pub fn reset(&mut self) -> Result<(), DriverError> {
        self.stop();
        self.lock()?.reset();
        if let Ok(mut fault) = self.fault.lock() {
            *fault = None;
        }
        info!("reset");
        Ok(())
    }

    /// Execute one step on the calling thread.
    pub fn step(&self) -> Result<bool, DriverError> {
        Ok(self.lock()?.step()?)
    }

    /// Whether a driver is active and has not yet finished.
    pub fn is_running(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| d.signal.is_active())
    }

    /// Block until the driver finishes on its own or `timeout` elapses.
    /// Returns true if the driver has finished.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_running() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        self.reap();
        true
    }

    /// Copy out the core's visible state.
    pub fn snapshot(&self) -> Result<CpuSnapshot, DriverError> {
        Ok(self.lock()?.snapshot())
    }

    /// Drive a value onto the input port.
    pub fn set_input(&self, value: u8) -> Result<(), DriverError> {
        self.lock()?.set_input(value).map_err(CpuError::from)?;
        Ok(())
    }

    /// Run a closure against the core while holding its lock.
    pub fn with_core<T>(&self, f: impl FnOnce(&Core) -> T) -> Result<T, DriverError> {
        let core = self.lock()?;
        Ok(f(&core))
    }

    /// The error that stopped the last driver, if any.
    pub fn last_error(&self) -> Option<CpuError> {
        self.fault.lock().ok().and_then(|f| f.clone())
    }

    /// Handle for stopping or resetting from another thread.
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            core: Arc::clone(&self.core),
            current: Arc::clone(&self.current),
            fault: Arc::clone(&self.fault),
        }
    }

    /// Number of driver threads spawned over this machine's lifetime.
    pub fn drivers_started(&self) -> u64 {
        self.drivers_started.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Core>, DriverError> {
        self.core.lock().map_err(|_| DriverError::Poisoned)
    }

    // Join a driver that already exited by itself.
    fn reap(&mut self) {
        if let Some(driver) = self.driver.take() {
            if driver.handle.join().is_err() {
                warn!("driver thread panicked");
            }
            self.clear_current();
        }
    }

    fn clear_current(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(Core::new())
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drive(
    core: Arc<Mutex<Core>>,
    active: Arc<AtomicBool>,
    period: Duration,
    fault: Arc<Mutex<Option<CpuError>>>,
) {
    let mut next_tick = Instant::now() + period;

    while active.load(Ordering::Acquire) {
        // Sleep until the next tick; stop() unparks us early.
        loop {
            let now = Instant::now();
            if now >= next_tick || !active.load(Ordering::Acquire) {
                break;
            }
            thread::park_timeout(next_tick - now);
        }
        next_tick = next_deadline(next_tick, period, Instant::now());

        let Ok(mut guard) = core.lock() else {
            error!("core lock poisoned, driver exiting");
            break;
        };
        if !active.load(Ordering::Acquire) {
            break;
        }
        match guard.step() {
            Ok(true) => {}
            Ok(false) => {
                info!("halted after {} steps", guard.cycles);
                break;
            }
            Err(e) => {
                error!("driver stopped: {}", e);
                if let Ok(mut slot) = fault.lock() {
                    *slot = Some(e);
                }
                break;
            }
        }
    }

    active.store(false, Ordering::Release);
}

// Schedule the tick after `prev`. A driver that fell behind (the core lock
// was held for several periods) resumes one period from now instead of
// stepping back to back.
fn next_deadline(prev: Instant, period: Duration, now: Instant) -> Instant {
    let next = prev + period;
    if next < now {
        now + period
    } else {
        next
    }
}

/// Errors surfaced by [`Machine`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("cpu error: {0}")]
    Cpu(#[from] CpuError),

    #[error("core lock poisoned")]
    Poisoned,

    #[error("failed to spawn driver thread: {0}")]
    Spawn(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_config() {
        let mut machine = Machine::default();
        assert_eq!(machine.cycle_ms(), DEFAULT_CYCLE_MS);
        assert_eq!(machine.ticks_per_second(), 200);
        machine.set_cycle(0);
        assert_eq!(machine.cycle_ms(), 1);
        machine.set_cycle(250);
        assert_eq!(machine.ticks_per_second(), 4);
    }

    #[test]
    fn test_stop_without_run_is_noop() {
        let mut machine = Machine::default();
        machine.stop();
        machine.stop();
        assert!(!machine.is_running());
        assert_eq!(machine.drivers_started(), 0);
    }

    #[test]
    fn test_next_deadline_keeps_cadence() {
        let start = Instant::now();
        let period = Duration::from_millis(5);
        assert_eq!(next_deadline(start, period, start), start + period);
    }

    #[test]
    fn test_next_deadline_does_not_catch_up() {
        let start = Instant::now();
        let period = Duration::from_millis(5);
        let late = start + Duration::from_millis(50);
        assert_eq!(next_deadline(start, period, late), late + period);
    }

    #[test]
    fn test_with_core_reads_state() {
        let machine = Machine::default();
        assert_eq!(machine.with_core(|core| core.pc()).unwrap(), 0);
        machine.step().unwrap();
        let rows = machine.with_core(|core| core.rom().len()).unwrap();
        assert_eq!(rows, 16);
        assert_eq!(machine.with_core(Core::pc).unwrap(), 1);
    }

    #[test]
    fn test_manual_step() {
        let machine = Machine::default();
        assert!(machine.step().unwrap());
        assert_eq!(machine.snapshot().unwrap().pc, 1);
    }
}
