//! Firmware update progress clock
//!
//! Two timers run while the bridge installs firmware: a progress timer that
//! counts elapsed seconds and a deadline timer that ends the update session.
//! The bridge never reports completion, so the deadline alone decides when the
//! settings view may be closed again.

use log::{debug, info};
use std::{pin::Pin, time::Duration};
use tokio::time::{Instant, Interval, Sleep, interval_at, sleep_until};

pub const PROGRESS_PERIOD: Duration = Duration::from_secs(1);
pub const UPDATE_DEADLINE: Duration = Duration::from_secs(180);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClockEvent {
    Progress,
    Deadline,
}

/// State of the update session, driven by explicit transitions
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpdateProgressClock {
    progress_seconds: u32,
    can_close: bool,
    progress_running: bool,
    deadline_running: bool,
    since_progress_tick: Duration,
    since_start: Duration,
}

impl Default for UpdateProgressClock {
    fn default() -> Self {
        Self {
            progress_seconds: 0,
            can_close: true,
            progress_running: false,
            deadline_running: false,
            since_progress_tick: Duration::ZERO,
            since_start: Duration::ZERO,
        }
    }
}

impl UpdateProgressClock {
    /// Start both timers; the view may not be closed until the deadline
    pub fn start(&mut self) {
        info!("update session started, deadline in {}s", UPDATE_DEADLINE.as_secs());
        *self = Self {
            can_close: false,
            progress_running: true,
            deadline_running: true,
            ..Self::default()
        };
    }

    pub fn on_progress_tick(&mut self) {
        if self.progress_running {
            self.progress_seconds += 1;
        }
    }

    /// Stop both timers and release the close lock; safe to apply twice
    pub fn on_deadline(&mut self) {
        if self.is_active() {
            info!("update session ended after {}s", self.progress_seconds);
        }
        self.stop();
    }

    /// Stop the session early; safe to apply twice
    pub fn cancel(&mut self) {
        if self.is_active() {
            debug!("update session cancelled at {}s", self.progress_seconds);
        }
        self.stop();
    }

    pub fn handle(&mut self, event: ClockEvent) {
        match event {
            ClockEvent::Progress => self.on_progress_tick(),
            ClockEvent::Deadline => self.on_deadline(),
        }
    }

    /// Advance simulated time and fire every timer that falls due, in time order
    ///
    /// A progress tick due at the same instant as the deadline fires first.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<ClockEvent> {
        let mut remaining = elapsed;
        let mut events = Vec::new();

        while self.is_active() {
            let to_progress = if self.progress_running {
                PROGRESS_PERIOD - self.since_progress_tick
            } else {
                Duration::MAX
            };
            let to_deadline = if self.deadline_running {
                UPDATE_DEADLINE - self.since_start
            } else {
                Duration::MAX
            };
            let step = to_progress.min(to_deadline);

            if step > remaining {
                self.since_progress_tick += remaining;
                self.since_start += remaining;
                break;
            }

            remaining -= step;
            self.since_progress_tick += step;
            self.since_start += step;

            if self.progress_running && self.since_progress_tick >= PROGRESS_PERIOD {
                self.since_progress_tick = Duration::ZERO;
                self.on_progress_tick();
                events.push(ClockEvent::Progress);
            }
            if self.deadline_running && self.since_start >= UPDATE_DEADLINE {
                self.on_deadline();
                events.push(ClockEvent::Deadline);
            }
        }

        events
    }

    pub fn is_active(&self) -> bool {
        self.progress_running || self.deadline_running
    }

    pub fn progress_seconds(&self) -> u32 {
        self.progress_seconds
    }

    pub fn can_close(&self) -> bool {
        self.can_close
    }

    fn stop(&mut self) {
        self.progress_running = false;
        self.deadline_running = false;
        self.can_close = true;
    }
}

/// Real-time source of [`ClockEvent`]s for an event loop
///
/// Callers `select!` on [`UpdateTicker::next`] next to their other inputs and
/// feed the events into the session that owns the clock.
#[derive(Debug)]
pub struct UpdateTicker {
    progress: Interval,
    deadline: Pin<Box<Sleep>>,
    finished: bool,
}

impl UpdateTicker {
    pub fn start() -> Self {
        let start = Instant::now();

        Self {
            progress: interval_at(start + PROGRESS_PERIOD, PROGRESS_PERIOD),
            deadline: Box::pin(sleep_until(start + UPDATE_DEADLINE)),
            finished: false,
        }
    }

    /// Next clock event, `None` once the deadline fired
    pub async fn next(&mut self) -> Option<ClockEvent> {
        if self.finished {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.progress.tick() => Some(ClockEvent::Progress),
            _ = &mut self.deadline => {
                self.finished = true;
                Some(ClockEvent::Deadline)
            }
        }
    }
}
