// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Busy-wait synchronization for blocking channel calls.
//!
//! Each blocking call runs a small state machine:
//! Idle → Spinning → Ready → Idle, with terminal exits from Spinning on
//! deadline expiry (Timeout) or an external cancel signal (Cancelled).
//! The spin loop only polls; it never mutates shared state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ChannelError;

/// Default number of pause-hint iterations before escalating.
pub const DEFAULT_SPIN_LIMIT: u32 = 128;

/// Spin states for one side of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinState {
    /// No pending operation.
    Idle,
    /// Polling the peer's cursor.
    Spinning,
    /// Condition satisfied, operation proceeds.
    Ready,
    /// Deadline exceeded while spinning.
    TimedOut,
    /// Cancel signal observed while spinning.
    Cancelled,
}

impl SpinState {
    /// Get the state name for log messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Spinning => "Spinning",
            Self::Ready => "Ready",
            Self::TimedOut => "TimedOut",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Cancelled)
    }
}

impl std::fmt::Display for SpinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What to do between failed polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffPolicy {
    /// Pause hint every iteration. Lowest latency, burns a full core.
    #[default]
    Spin,
    /// Pause hint for `spin_limit` iterations, then yield to the scheduler.
    Yield { spin_limit: u32 },
    /// Pause hint for `spin_limit` iterations, then sleep, doubling the sleep
    /// from `min_sleep` up to `max_sleep`.
    Sleep {
        spin_limit: u32,
        min_sleep: Duration,
        max_sleep: Duration,
    },
}

/// Per-call backoff progress.
#[derive(Debug)]
struct Backoff {
    spins: u32,
    next_sleep: Option<Duration>,
}

impl Backoff {
    fn new() -> Self {
        Self {
            spins: 0,
            next_sleep: None,
        }
    }

    /// Wait once according to `policy`, never sleeping past `remaining`.
    fn snooze(&mut self, policy: &BackoffPolicy, remaining: Option<Duration>) {
        match *policy {
            BackoffPolicy::Spin => std::hint::spin_loop(),
            BackoffPolicy::Yield { spin_limit } => {
                if self.spins < spin_limit {
                    self.spins += 1;
                    std::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
            }
            BackoffPolicy::Sleep {
                spin_limit,
                min_sleep,
                max_sleep,
            } => {
                if self.spins < spin_limit {
                    self.spins += 1;
                    std::hint::spin_loop();
                    return;
                }
                let sleep = self.next_sleep.unwrap_or(min_sleep);
                self.next_sleep = Some((sleep * 2).min(max_sleep));
                let sleep = match remaining {
                    Some(remaining) => sleep.min(remaining),
                    None => sleep,
                };
                if !sleep.is_zero() {
                    std::thread::sleep(sleep);
                }
            }
        }
    }
}

/// Cooperative cancellation signal shared between a blocking call and its canceller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Blocking calls observing this token give up.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Configuration for blocking calls: backoff, optional deadline, optional cancel token.
#[derive(Debug, Clone, Default)]
pub struct SpinPolicy {
    backoff: BackoffPolicy,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl SpinPolicy {
    /// Pure spin, no deadline, no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Give up with `Timeout` after this much wall-clock time.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Repeat `attempt` until it returns anything other than `WouldBlock`.
    ///
    /// Returns `Timeout` or `Cancelled` if the policy gives up first.
    pub fn run<T, F>(&self, mut attempt: F) -> Result<T, ChannelError>
    where
        F: FnMut() -> Result<T, ChannelError>,
    {
        let mut spinner = Spinner::new(self);
        loop {
            match attempt() {
                Err(ChannelError::WouldBlock) => spinner.wait()?,
                result => {
                    spinner.ready();
                    spinner.reset();
                    return result;
                }
            }
        }
    }
}

/// Explicit spin state machine for one blocking call.
#[derive(Debug)]
pub struct Spinner<'a> {
    policy: &'a SpinPolicy,
    state: SpinState,
    started: Instant,
    deadline: Option<Instant>,
    iterations: u64,
    backoff: Backoff,
}

impl<'a> Spinner<'a> {
    pub fn new(policy: &'a SpinPolicy) -> Self {
        let started = Instant::now();
        Self {
            policy,
            state: SpinState::Idle,
            started,
            deadline: policy.timeout.map(|t| started + t),
            iterations: 0,
            backoff: Backoff::new(),
        }
    }

    pub fn state(&self) -> SpinState {
        self.state
    }

    /// Number of failed polls so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Record a failed poll and back off.
    ///
    /// Moves Idle → Spinning on the first call. Fails with `Cancelled` or
    /// `Timeout`, leaving the machine in the matching terminal state.
    pub fn wait(&mut self) -> Result<(), ChannelError> {
        if self.state.is_terminal() {
            return Err(self.terminal_error());
        }
        self.state = SpinState::Spinning;
        self.iterations += 1;

        if let Some(token) = &self.policy.cancel {
            if token.is_cancelled() {
                self.state = SpinState::Cancelled;
                tracing::trace!(iterations = self.iterations, "Spin wait cancelled");
                return Err(ChannelError::Cancelled);
            }
        }

        let remaining = match self.deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    self.state = SpinState::TimedOut;
                    tracing::trace!(
                        iterations = self.iterations,
                        elapsed_us = self.started.elapsed().as_micros() as u64,
                        "Spin wait timed out"
                    );
                    return Err(ChannelError::Timeout {
                        elapsed: now - self.started,
                    });
                }
                Some(deadline - now)
            }
            None => None,
        };

        self.backoff.snooze(&self.policy.backoff, remaining);
        Ok(())
    }

    /// The awaited condition holds.
    pub fn ready(&mut self) {
        if self.state == SpinState::Spinning {
            tracing::trace!(
                iterations = self.iterations,
                elapsed_ns = self.started.elapsed().as_nanos() as u64,
                "Spin wait satisfied"
            );
        }
        self.state = SpinState::Ready;
    }

    /// Return to Idle for the next operation.
    pub fn reset(&mut self) {
        self.state = SpinState::Idle;
        self.iterations = 0;
        self.backoff = Backoff::new();
        self.started = Instant::now();
        self.deadline = self.policy.timeout.map(|t| self.started + t);
    }

    fn terminal_error(&self) -> ChannelError {
        match self.state {
            SpinState::Cancelled => ChannelError::Cancelled,
            _ => ChannelError::Timeout {
                elapsed: self.started.elapsed(),
            },
        }
    }
}
