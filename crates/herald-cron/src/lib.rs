// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron scheduler for the Herald feed curator.
//!
//! One timer task per enabled plugin fires the runtime's guarded fetch on a
//! standard 5-field cron expression evaluated in UTC. Timers can be added,
//! replaced, and removed while the service runs.

pub mod scheduler;
pub mod trigger;

pub use scheduler::Scheduler;
pub use trigger::FetchTrigger;
