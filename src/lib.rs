// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Multi-participant media liveness harness.
//!
//! Every participant gets its own browser process with a file backed fake
//! camera. The participants join the same room through the web UI, then the
//! harness polls the `video` elements of every page until all of them show
//! live media or the deadline passes.

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod browser;
pub mod error;
pub mod http;
pub mod join;
pub mod liveness;
pub mod participant;
pub mod scenario;
pub mod session;
pub mod settings;
pub mod sources;

pub use error::{Error, Result};
