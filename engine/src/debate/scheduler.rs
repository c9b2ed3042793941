//! Cancellable scheduled ticks.
//!
//! The engine never sleeps itself. It asks a [`Scheduler`] for `count` ticks
//! spaced `interval` apart and gets back a [`CancelHandle`]. Ticks come back
//! to the engine's owner, who feeds them to `DebateEngine::handle_tick`.
//!
//! - [`TokioScheduler`]: real time, ticks delivered over an mpsc channel.
//! - [`ManualScheduler`]: virtual clock advanced explicitly by tests.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Which delay a tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// drawing → playing
    DrawToPlay,
    /// playing → speaking
    PlayToSpeak,
    /// judging → winnerAnnouncement
    Verdict,
    /// One more judge revealed.
    JudgeReveal,
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DrawToPlay => write!(f, "draw_to_play"),
            Self::PlayToSpeak => write!(f, "play_to_speak"),
            Self::Verdict => write!(f, "verdict"),
            Self::JudgeReveal => write!(f, "judge_reveal"),
        }
    }
}

/// One timer expiry, stamped with the engine epoch it was armed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tick {
    pub epoch: u64,
    pub kind: TimerKind,
}

/// Handle to a started timer. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Source of delayed, repeating ticks.
pub trait Scheduler: Send {
    /// Deliver `tick` `count` times, the first after `interval`.
    fn start(&self, count: u32, interval: Duration, tick: Tick) -> CancelHandle;
}

/// Real-time scheduler backed by tokio tasks.
///
/// `start` must be called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<Tick>,
}

impl TokioScheduler {
    /// A scheduler and the receiver its ticks arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Scheduler for TokioScheduler {
    fn start(&self, count: u32, interval: Duration, tick: Tick) -> CancelHandle {
        let handle = CancelHandle::new();
        let token = handle.token();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            for _ in 0..count {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                if token.is_cancelled() || tx.send(tick).is_err() {
                    return;
                }
            }
        });
        handle
    }
}

#[derive(Debug)]
struct PendingTimer {
    due: Duration,
    interval: Duration,
    remaining: u32,
    tick: Tick,
    handle: CancelHandle,
}

#[derive(Debug, Default)]
struct ManualClock {
    now: Duration,
    timers: Vec<PendingTimer>,
}

/// Deterministic scheduler with a virtual clock.
///
/// Clones share the same clock, so a test can keep one clone while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Virtual time elapsed so far.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Timers that are neither cancelled nor exhausted.
    pub fn pending(&self) -> usize {
        self.lock()
            .timers
            .iter()
            .filter(|t| t.remaining > 0 && !t.handle.is_cancelled())
            .count()
    }

    /// Move the clock forward and return every tick that came due, in due
    /// order. Timers armed after this call returns are not included.
    pub fn advance(&self, by: Duration) -> Vec<Tick> {
        let mut clock = self.lock();
        let target = clock.now + by;
        let mut fired = Vec::new();

        loop {
            clock
                .timers
                .retain(|t| t.remaining > 0 && !t.handle.is_cancelled());
            let Some(next) = clock
                .timers
                .iter_mut()
                .filter(|t| t.due <= target)
                .min_by_key(|t| t.due)
            else {
                break;
            };
            let due = next.due;
            next.remaining -= 1;
            next.due += next.interval;
            fired.push(next.tick);
            clock.now = due;
        }

        clock.now = target;
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn start(&self, count: u32, interval: Duration, tick: Tick) -> CancelHandle {
        let handle = CancelHandle::new();
        let mut clock = self.lock();
        let due = clock.now + interval;
        clock.timers.push(PendingTimer {
            due,
            interval,
            remaining: count,
            tick,
            handle: handle.clone(),
        });
        handle
    }
}
