// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Herald service composition and CLI commands.
//!
//! The `herald` binary is a thin clap front end over this library; the
//! [`service::ServiceController`] is also driven directly by integration tests.

pub mod commands;
pub mod compose;
pub mod markers;
pub mod reload;
pub mod service;
pub mod shutdown;

pub use service::{ServiceController, StopOutcome};
