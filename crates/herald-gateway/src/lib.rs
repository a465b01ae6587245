// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface of the Herald feed curator.
//!
//! Serves health and status checks, plugin listing and manual reload, a
//! paginated headline API, and the curated RSS 2.0 feed at `/feed.xml`.

pub mod feed;
pub mod handlers;
pub mod server;

pub use feed::render_feed;
pub use server::{GatewayState, StatusFn, bind, router, serve};
