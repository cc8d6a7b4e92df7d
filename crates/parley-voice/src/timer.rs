//! Restartable one-shot timers that fire back into the coordinator channel.
//!
//! Every arm bumps a generation counter and aborts the previous sleep, so the
//! last arm wins. The fire event carries its generation; the owner checks it
//! with [`OneShotTimer::fired`], which rejects stale fires that were already
//! queued when the timer was re-armed or cancelled.

use crate::event::{EngineEvents, TimerKind, VoiceEvent};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

pub struct OneShotTimer {
    kind: TimerKind,
    events: EngineEvents,
    generation: u64,
    pending: bool,
    task: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    pub fn new(kind: TimerKind, events: EngineEvents) -> Self {
        Self {
            kind,
            events,
            generation: 0,
            pending: false,
            task: None,
        }
    }

    /// (Re)start the countdown, cancelling any previous one. Must be called
    /// from within a tokio runtime.
    pub fn arm(&mut self, after: Duration) {
        self.abort_task();
        self.generation += 1;
        self.pending = true;

        let generation = self.generation;
        let kind = self.kind;
        let events = self.events.clone();
        // Deadline is taken now, not when the task is first polled.
        let deadline = Instant::now() + after;
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            events.post(VoiceEvent::Timer { kind, generation });
        }));
    }

    /// Clear a pending countdown. No effect if none is pending.
    pub fn cancel(&mut self) {
        if self.pending {
            debug!("{:?} timer cancelled", self.kind);
        }
        self.abort_task();
        self.generation += 1;
        self.pending = false;
    }

    /// Accept a fire event. Returns true exactly once per arm, and only for
    /// the most recent one; the timer is idle afterwards.
    pub fn fired(&mut self, generation: u64) -> bool {
        if !self.pending || generation != self.generation {
            debug!(
                "stale {:?} timer fire ignored (generation {} vs {})",
                self.kind, generation, self.generation
            );
            return false;
        }
        self.pending = false;
        self.task = None;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// Debounce timer that fires `CommitDue` after a quiet period.
///
/// Re-armed on every final fragment, so it always measures silence since the
/// last speech, not time since the turn started.
pub struct SilenceCommitTimer {
    timer: OneShotTimer,
    window: Duration,
}

impl SilenceCommitTimer {
    pub fn new(window: Duration, events: EngineEvents) -> Self {
        Self {
            timer: OneShotTimer::new(TimerKind::SilenceCommit, events),
            window,
        }
    }

    /// Restart the countdown with the configured window.
    pub fn arm(&mut self) {
        self.timer.arm(self.window);
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    pub fn fired(&mut self, generation: u64) -> bool {
        self.timer.fired(generation)
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }
}
