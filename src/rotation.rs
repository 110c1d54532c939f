use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::models::{Review, ReviewId};

pub const DEFAULT_WINDOW_SIZE: usize = 5;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5000);

/// Position of the highlight rotation over the newest reviews
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationState {
    pub window: Vec<ReviewId>,
    pub index: usize,
    pub paused: bool,
    /// Steps taken so far, counting ones that wrap onto the same item
    pub steps: u64,
}

impl RotationState {
    pub fn current(&self) -> Option<&ReviewId> {
        self.window.get(self.index)
    }

    /// Move one step with wrap-around; an empty window never steps
    fn step(&mut self, forward: bool) -> bool {
        let len = self.window.len();
        if len == 0 {
            return false;
        }

        self.index = if forward {
            (self.index + 1) % len
        } else {
            (self.index + len - 1) % len
        };
        self.steps += 1;
        true
    }
}

/// Cyclic preview over the first `window_size` reviews
///
/// While mounted and non-empty, a ticker task advances the position every
/// `interval`. The ticker is stopped on unmount, when the window empties, and
/// on drop.
pub struct RotationController {
    window_size: usize,
    interval: Duration,
    state: Arc<watch::Sender<RotationState>>,
    ticker: Option<JoinHandle<()>>,
    mounted: bool,
}

impl RotationController {
    pub fn new(window_size: usize, interval: Duration) -> Self {
        let (state, _) = watch::channel(RotationState::default());
        Self {
            window_size: window_size.max(1),
            // tokio intervals panic on a zero period
            interval: interval.max(Duration::from_millis(1)),
            state: Arc::new(state),
            ticker: None,
            mounted: false,
        }
    }

    /// Watch position changes, including automatic steps
    pub fn subscribe(&self) -> watch::Receiver<RotationState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RotationState {
        self.state.borrow().clone()
    }

    pub fn index(&self) -> usize {
        self.state.borrow().index
    }

    pub fn current(&self) -> Option<ReviewId> {
        self.state.borrow().current().cloned()
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Recompute the window from the committed collection
    ///
    /// A different window resets the position to the first item.
    pub fn sync(&mut self, reviews: &[Review]) {
        let window: Vec<ReviewId> = reviews
            .iter()
            .take(self.window_size)
            .map(|r| r.id.clone())
            .collect();

        let changed = self.state.send_if_modified(|state| {
            if state.window == window {
                return false;
            }
            state.window = window;
            state.index = 0;
            true
        });

        if changed {
            debug!(len = self.state.borrow().window.len(), "Rotation window changed");
            self.restart_ticker();
        }
    }

    pub fn mount(&mut self) {
        self.mounted = true;
        self.restart_ticker();
    }

    pub fn unmount(&mut self) {
        self.mounted = false;
        self.stop_ticker();
    }

    /// Manual next; the automatic interval starts over
    pub fn advance(&mut self) {
        self.state.send_if_modified(|state| state.step(true));
        self.restart_ticker();
    }

    /// Manual previous; the automatic interval starts over
    pub fn retreat(&mut self) {
        self.state.send_if_modified(|state| state.step(false));
        self.restart_ticker();
    }

    pub fn pause(&self) {
        self.state.send_if_modified(|state| !std::mem::replace(&mut state.paused, true));
    }

    pub fn resume(&self) {
        self.state.send_if_modified(|state| std::mem::replace(&mut state.paused, false));
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
            debug!("Rotation ticker stopped");
        }
    }

    fn restart_ticker(&mut self) {
        self.stop_ticker();

        if !self.mounted || self.state.borrow().window.is_empty() {
            return;
        }

        let state = Arc::clone(&self.state);
        let period = self.interval;

        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                state.send_if_modified(|s| !s.paused && s.step(true));
            }
        }));

        debug!(interval_ms = period.as_millis() as u64, "Rotation ticker started");
    }
}

impl Default for RotationController {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_INTERVAL)
    }
}

impl Drop for RotationController {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
