use std::time::{Duration, Instant};

/// What caused a position change on the emitting side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A direct cursor move. Never dropped, only delayed.
    Cursor,
    /// A viewport scroll. Debounced: only the last of a burst is sent.
    Scroll,
}

/// When an admitted instruction may go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Now,
    At(Instant),
}

/// Timing shared by both synchronisation directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Minimum spacing between two instructions in one direction.
    pub min_sync_interval: Duration,
    /// Quiet period a scroll burst must observe before its last position is sent.
    pub scroll_debounce: Duration,
    /// How long self-triggered visibility signals are ignored after a reveal.
    pub settle_delay: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            min_sync_interval: Duration::from_millis(100),
            scroll_debounce: Duration::from_millis(40),
            settle_delay: Duration::from_millis(300),
        }
    }
}

impl SyncPolicy {
    /// Decide when an instruction produced at `now` may be emitted.
    ///
    /// Cursor moves go out immediately unless the previous instruction is
    /// younger than the minimum interval, in which case they wait for the floor.
    /// Scroll moves always wait for the debounce delay and never before the floor.
    pub fn admit(&self, last_sync_at: Option<Instant>, now: Instant, origin: Origin) -> Admission {
        let floor = last_sync_at.map(|at| at + self.min_sync_interval);
        match origin {
            Origin::Cursor => match floor {
                Some(floor) if now < floor => Admission::At(floor),
                _ => Admission::Now,
            },
            Origin::Scroll => {
                let due = now + self.scroll_debounce;
                Admission::At(floor.map_or(due, |floor| floor.max(due)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_cursor_move_goes_out_immediately() {
        let t0 = Instant::now();
        assert_eq!(SyncPolicy::default().admit(None, t0, Origin::Cursor), Admission::Now);
    }

    #[test]
    fn cursor_inside_window_waits_for_floor() {
        let t0 = Instant::now();
        let policy = SyncPolicy::default();
        assert_eq!(
            policy.admit(Some(t0), t0 + ms(30), Origin::Cursor),
            Admission::At(t0 + ms(100))
        );
        assert_eq!(policy.admit(Some(t0), t0 + ms(100), Origin::Cursor), Admission::Now);
    }

    #[test]
    fn scroll_is_debounced_and_respects_floor() {
        let t0 = Instant::now();
        let policy = SyncPolicy::default();
        assert_eq!(policy.admit(None, t0, Origin::Scroll), Admission::At(t0 + ms(40)));
        assert_eq!(
            policy.admit(Some(t0), t0 + ms(10), Origin::Scroll),
            Admission::At(t0 + ms(100))
        );
        assert_eq!(
            policy.admit(Some(t0), t0 + ms(90), Origin::Scroll),
            Admission::At(t0 + ms(130))
        );
    }
}
