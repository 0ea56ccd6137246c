#![forbid(unsafe_code)]

//! Delayed tasks on a host-driven clock.
//!
//! Animation sequencing needs a handful of one-shot timers: activate the
//! entry transition on the next frame, move focus once the entry animation
//! finishes, tear the popup down once the exit animation finishes. A
//! [`TaskQueue`] holds these as plain values keyed by their due time; the
//! owner drains due tasks whenever the host advances the clock.
//!
//! # Cancellation
//!
//! Every task is scheduled against a [`CancelToken`]. Cancelling the token
//! drops every task scheduled with it, so work tied to an object's lifetime
//! can never fire after the object is gone. There is no per-task cancel.
//!
//! # Invariants
//!
//! - Tasks pop in due-time order; ties pop in scheduling order.
//! - A task never pops before its due time.
//! - A task whose token was cancelled never pops.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag for a group of scheduled tasks.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a live (not cancelled) token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every task scheduled with this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct Scheduled<T> {
    due: Duration,
    seq: u64,
    token: CancelToken,
    task: T,
}

/// Queue of one-shot tasks ordered by due time.
pub struct TaskQueue<T> {
    pending: Vec<Scheduled<T>>,
    next_seq: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    /// Schedule `task` to become due `delay` after `now`.
    pub fn schedule(&mut self, now: Duration, delay: Duration, token: &CancelToken, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Scheduled {
            due: now.saturating_add(delay),
            seq,
            token: token.clone(),
            task,
        });
    }

    /// Remove and return the earliest task due at or before `now`, with its
    /// due time.
    ///
    /// Work a task schedules in turn should be timed from the returned due
    /// time, not from `now`, so a host that advances in large steps sees the
    /// same sequence as one that advances frame by frame.
    ///
    /// Cancelled tasks are discarded along the way.
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, T)> {
        self.purge_cancelled();
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due <= now)
            .min_by_key(|(_, s)| (s.due, s.seq))
            .map(|(idx, _)| idx)?;
        let scheduled = self.pending.swap_remove(idx);
        Some((scheduled.due, scheduled.task))
    }

    /// Due time of the earliest live task, if any.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.pending
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .map(|s| s.due)
            .min()
    }

    /// Drop every task whose token was cancelled.
    pub fn purge_cancelled(&mut self) {
        self.pending.retain(|s| !s.token.is_cancelled());
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .count()
    }

    /// Whether no live tasks remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("live", &self.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn nothing_pops_early() {
        let token = CancelToken::new();
        let mut queue = TaskQueue::new();
        queue.schedule(ms(0), ms(400), &token, "teardown");
        assert_eq!(queue.pop_due(ms(399)), None);
        assert_eq!(queue.pop_due(ms(400)), Some((ms(400), "teardown")));
        assert!(queue.is_empty());
    }

    #[test]
    fn pops_in_due_order_then_schedule_order() {
        let token = CancelToken::new();
        let mut queue = TaskQueue::new();
        queue.schedule(ms(0), ms(300), &token, "late");
        queue.schedule(ms(0), ms(0), &token, "first");
        queue.schedule(ms(0), ms(0), &token, "second");
        assert_eq!(queue.next_due(), Some(ms(0)));
        assert_eq!(queue.pop_due(ms(1000)), Some((ms(0), "first")));
        assert_eq!(queue.pop_due(ms(1000)), Some((ms(0), "second")));
        assert_eq!(queue.pop_due(ms(1000)), Some((ms(300), "late")));
        assert_eq!(queue.pop_due(ms(1000)), None);
    }

    #[test]
    fn cancel_drops_only_that_lifetime() {
        let old = CancelToken::new();
        let new = CancelToken::new();
        let mut queue = TaskQueue::new();
        queue.schedule(ms(0), ms(10), &old, 1);
        queue.schedule(ms(0), ms(10), &new, 2);
        old.cancel();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(ms(10)), Some((ms(10), 2)));
        assert_eq!(queue.pop_due(ms(10)), None);
    }

    #[test]
    fn clone_shares_cancellation() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn next_due_ignores_cancelled() {
        let dead = CancelToken::new();
        let live = CancelToken::new();
        let mut queue = TaskQueue::new();
        queue.schedule(ms(0), ms(5), &dead, ());
        queue.schedule(ms(0), ms(50), &live, ());
        dead.cancel();
        assert_eq!(queue.next_due(), Some(ms(50)));
    }

    #[test]
    fn late_pop_reports_original_due_time() {
        let token = CancelToken::new();
        let mut queue = TaskQueue::new();
        queue.schedule(ms(100), ms(300), &token, "close");
        assert_eq!(queue.pop_due(ms(5000)), Some((ms(400), "close")));
    }

    #[test]
    fn due_time_saturates() {
        let token = CancelToken::new();
        let mut queue = TaskQueue::new();
        queue.schedule(Duration::MAX, ms(1), &token, ());
        assert_eq!(queue.next_due(), Some(Duration::MAX));
    }
}
