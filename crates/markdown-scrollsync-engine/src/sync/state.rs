use std::time::{Duration, Instant};

/// Identifies one scheduled instruction so a stale timer can never fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

/// An instruction waiting for its rate-limit or debounce deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<T> {
    pub token: TimerToken,
    pub due: Instant,
    pub payload: T,
}

/// The "programmatic scroll in flight" flag with its clear deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettleGuard {
    clears_at: Option<Instant>,
}

impl SettleGuard {
    /// Raise the flag until `now + settle`. Re-arming extends the window.
    pub fn arm(&mut self, now: Instant, settle: Duration) {
        self.clears_at = Some(now + settle);
    }

    /// Whether the flag is still raised at `now`; clears it once elapsed.
    pub fn is_active(&mut self, now: Instant) -> bool {
        match self.clears_at {
            Some(at) if now < at => true,
            Some(_) => {
                self.clears_at = None;
                false
            }
            None => false,
        }
    }

    pub fn clears_at(&self) -> Option<Instant> {
        self.clears_at
    }
}

/// Per-direction synchronisation record, owned by exactly one side.
///
/// `last_synced_line` is a source-line concept and survives re-renders.
/// At most one instruction is pending; scheduling another cancels it first.
#[derive(Debug, Clone)]
pub struct SyncState<T> {
    last_synced_line: Option<u32>,
    last_sync_at: Option<Instant>,
    guard: SettleGuard,
    pending: Option<Pending<T>>,
    next_token: u64,
}

impl<T> Default for SyncState<T> {
    fn default() -> Self {
        Self {
            last_synced_line: None,
            last_sync_at: None,
            guard: SettleGuard::default(),
            pending: None,
            next_token: 0,
        }
    }
}

impl<T> SyncState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_synced_line(&self) -> Option<u32> {
        self.last_synced_line
    }

    pub fn last_sync_at(&self) -> Option<Instant> {
        self.last_sync_at
    }

    /// Note that `line` was synchronised at `now`.
    pub fn record_sync(&mut self, line: u32, now: Instant) {
        self.last_synced_line = Some(line);
        self.last_sync_at = Some(now);
    }

    pub fn pending(&self) -> Option<&Pending<T>> {
        self.pending.as_ref()
    }

    /// Replace any pending instruction with `payload`, due at `due`.
    pub fn schedule(&mut self, due: Instant, payload: T) -> TimerToken {
        self.cancel_pending();
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.pending = Some(Pending {
            token,
            due,
            payload,
        });
        token
    }

    pub fn cancel_pending(&mut self) -> Option<Pending<T>> {
        self.pending.take()
    }

    /// Take the pending instruction if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<Pending<T>> {
        match &self.pending {
            Some(p) if p.due <= now => self.pending.take(),
            _ => None,
        }
    }

    /// Mark a self-triggered scroll as settling until `now + settle`.
    pub fn begin_programmatic_scroll(&mut self, now: Instant, settle: Duration) {
        self.guard.arm(now, settle);
    }

    pub fn programmatic_scroll_active(&mut self, now: Instant) -> bool {
        self.guard.is_active(now)
    }

    /// Earliest instant at which this state needs attention again.
    pub fn next_deadline(&self) -> Option<Instant> {
        let pending = self.pending.as_ref().map(|p| p.due);
        match (pending, self.guard.clears_at()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
