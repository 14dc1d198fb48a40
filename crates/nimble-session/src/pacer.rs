//! Fixed-period pacing for the command send loop.
//!
//! The actuator expects a pendant frame every couple of milliseconds.
//! `thread::sleep` alone is too coarse for that, so the pacer waits against
//! absolute deadlines on the monotonic clock and finishes each wait by
//! polling.

use std::time::{Duration, Instant};

use tracing::debug;

/// Frame period of the pendant.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(2);

/// How the pacer waits for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Busy-spin until the deadline. Most precise, burns a core.
    Spin,
    /// Poll the clock and yield the thread between polls.
    SpinYield,
    /// Sleep until `spin_window` before the deadline, then busy-spin.
    SleepSpin { spin_window: Duration },
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::SleepSpin {
            spin_window: Duration::from_micros(500),
        }
    }
}

/// Pacer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerConfig {
    /// Time between ticks. Default: 2 ms.
    pub period: Duration,
    pub wait: WaitStrategy,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            wait: WaitStrategy::default(),
        }
    }
}

/// Absolute-deadline ticker.
///
/// Tick `n` is due at `start + n * period`; a late tick does not shift the
/// ones after it. When the loop falls behind, `wait_for_tick` returns
/// immediately until it has caught up.
#[derive(Debug)]
pub struct Pacer {
    config: PacerConfig,
    start: Instant,
    next_tick: Instant,
    ticks: u64,
    overruns: u64,
}

impl Pacer {
    pub fn new(config: PacerConfig) -> Self {
        let period = config.period.max(Duration::from_nanos(1));
        let config = PacerConfig { period, ..config };
        let now = Instant::now();
        Self {
            config,
            start: now,
            next_tick: tick_after(now, period),
            ticks: 0,
            overruns: 0,
        }
    }

    /// Wait until the next tick is due and return its number (starting at 1).
    pub fn wait_for_tick(&mut self) -> u64 {
        let now = Instant::now();
        if now >= self.next_tick {
            self.overruns += 1;
            debug!(
                tick = self.ticks + 1,
                late_us = now.duration_since(self.next_tick).as_micros() as u64,
                "pacer overrun"
            );
        } else {
            self.sleep_until(self.next_tick);
        }

        self.ticks += 1;
        self.next_tick = tick_after(self.next_tick, self.config.period);
        self.ticks
    }

    fn sleep_until(&self, target: Instant) {
        match self.config.wait {
            WaitStrategy::Spin => spin_until(target),
            WaitStrategy::SpinYield => {
                while Instant::now() < target {
                    std::thread::yield_now();
                }
            }
            WaitStrategy::SleepSpin { spin_window } => {
                let remaining = target.saturating_duration_since(Instant::now());
                if remaining > spin_window {
                    std::thread::sleep(remaining - spin_window);
                }
                spin_until(target);
            }
        }
    }

    /// Restart the schedule from now.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.next_tick = tick_after(now, self.config.period);
        self.ticks = 0;
        self.overruns = 0;
    }

    /// Ticks completed.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks that were already due when `wait_for_tick` was called.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Time since the schedule started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// When the next tick is due.
    pub fn next_deadline(&self) -> Instant {
        self.next_tick
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }
}

/// Roughly a century; later deadlines are never reached in practice.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `at + period`, saturating when the sum is not representable.
fn tick_after(at: Instant, period: Duration) -> Instant {
    at.checked_add(period)
        .or_else(|| at.checked_add(FAR_FUTURE))
        .unwrap_or(at)
}

fn spin_until(target: Instant) {
    while Instant::now() < target {
        std::hint::spin_loop();
    }
}
