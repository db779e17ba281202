//! Render scheduling.
//!
//! Output does not render immediately. Each batch of output (re)arms a short
//! "lower" deadline, and the first batch after a frame also arms an "upper"
//! deadline that only a rendered frame clears. Whichever passes first makes a
//! frame due. While an application synchronized update is open nothing is
//! scheduled; the window closes on request or when its own deadline passes.
//!
//! The scheduler holds deadlines only. The event loop asks for the earliest
//! one, sleeps until then and calls [`RenderScheduler::poll`].

use std::time::{Duration, Instant};

use crate::config::TermConfig;

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    lower_delay: Duration,
    upper_delay: Duration,
    sync_timeout: Duration,
    lower: Option<Instant>,
    upper: Option<Instant>,
    sync: Option<Instant>,
    /// A frame is due at the next poll regardless of deadlines.
    immediate: bool,
}

impl RenderScheduler {
    #[must_use]
    pub fn new(config: &TermConfig) -> Self {
        Self {
            lower_delay: Duration::from_nanos(config.delayed_render_lower_ns),
            upper_delay: Duration::from_nanos(config.delayed_render_upper_ns),
            sync_timeout: Duration::from_nanos(config.app_sync_timeout_ns),
            lower: None,
            upper: None,
            sync: None,
            immediate: false,
        }
    }

    /// Whether a synchronized update window is open.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.sync.is_some()
    }

    /// Record that output was processed at `now`.
    pub fn on_output(&mut self, now: Instant) {
        if self.is_syncing() {
            return;
        }
        if self.lower_delay.is_zero() || self.upper_delay.is_zero() {
            self.immediate = true;
            return;
        }
        self.lower = Some(now + self.lower_delay);
        if self.upper.is_none() {
            self.upper = Some(now + self.upper_delay);
        }
    }

    /// Ask for a frame at the next poll (resize, scrollback navigation).
    pub fn request_immediate(&mut self) {
        if !self.is_syncing() {
            self.immediate = true;
        }
    }

    /// Open a synchronized update window. Pending deadlines are dropped.
    pub fn begin_sync(&mut self, now: Instant) {
        self.sync = Some(now + self.sync_timeout);
        self.lower = None;
        self.upper = None;
        self.immediate = false;
    }

    /// Close the synchronized update window; a frame becomes due at once.
    pub fn end_sync(&mut self) {
        if self.sync.take().is_some() {
            self.immediate = true;
        }
    }

    /// The earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.immediate && !self.is_syncing() {
            return Some(Instant::now());
        }
        [self.lower, self.upper, self.sync]
            .into_iter()
            .flatten()
            .min()
    }

    /// Advance to `now`. Returns `true` when a frame should be rendered.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.sync {
            if now < deadline {
                return false;
            }
            tracing::debug!("synchronized update timed out");
            self.end_sync();
        }
        let expired = |d: Option<Instant>| d.is_some_and(|d| d <= now);
        if self.immediate || expired(self.lower) || expired(self.upper) {
            self.frame_rendered();
            return true;
        }
        false
    }

    /// Reset the delay timers after a frame.
    pub fn frame_rendered(&mut self) {
        self.lower = None;
        self.upper = None;
        self.immediate = false;
    }
}
