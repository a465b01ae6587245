// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the stored entities.

pub mod credentials;
pub mod headlines;
pub mod plugin_state;
