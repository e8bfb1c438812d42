//! # Synchronisation Controllers
//!
//! Two controllers keep the source and the rendered view aligned, one per
//! direction. Each side owns its own [`SyncState`]; the sides only talk through
//! the ordered transport, never through shared state.
//!
//! - **`source`**: cursor and viewport changes become one reveal instruction.
//! - **`render`**: visibility observations become one silent set-position
//!   instruction, suppressed while a self-triggered reveal is settling.
//! - **`policy`**: rate limiting and debouncing shared by both.
//! - **`state`**: last synced line, timestamps, settle guard and the single
//!   cancellable pending instruction.
//!
//! All operations take `now` explicitly; hosts drive timers by calling `poll`
//! no later than `next_deadline`.

pub mod policy;
pub mod render;
pub mod source;
pub mod state;

pub use policy::{Admission, Origin, SyncPolicy};
pub use render::{FocusBand, RenderToSource, RevealTarget, SetPosition};
pub use source::{Reveal, SourceToRender};
pub use state::{Pending, SettleGuard, SyncState, TimerToken};
