// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types shared between the tcp2udp engine and the tools which
//! configure and observe it.

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod cfg;
pub mod ip;
pub mod port;
pub mod stat;

pub use cfg::*;
pub use ip::*;
pub use port::*;
pub use stat::*;

/// The overall version of the API. Anytime a type in this crate is
/// added, removed, or modified, this number should increment. The
/// control plane uses it to verify it was compiled against the same
/// definitions as the datapath it is talking to.
pub const API_VERSION: u64 = 1;

/// Major version of the tcp2udp package.
pub const MAJOR_VERSION: u64 = 0;
