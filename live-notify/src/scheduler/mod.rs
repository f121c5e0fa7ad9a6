//! Poll scheduling.
//!
//! The [`Scheduler`] runs one sequential poll loop: make sure a credential is
//! held, fetch a batched live snapshot (refreshing the credential at most once
//! on rejection), diff it against the live set and announce every channel that
//! went live. Cycles never overlap and no error ends the loop; only
//! cancellation does.

mod service;

pub use service::{CycleOutcome, Scheduler, SchedulerConfig, SchedulerState};
