// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A per-packet TCP to UDP transcoder.
//!
//! Frames carrying TCP to an enabled destination port are rewritten in
//! place into UDP datagrams: the front of the TCP header becomes a UDP
//! header followed by a 2-byte offset to the real payload, the IP
//! protocol is switched to UDP, and both checksums are repaired
//! incrementally. Everything else is passed through untouched.
//!
//! The engine is `no_std`. Enable the `std` feature for printing.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![allow(non_snake_case)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[macro_use]
extern crate alloc;

pub use tcp2udp_api as api;

pub mod engine;

#[cfg(any(feature = "std", test))]
pub mod print;

/// Return value with `bit` set.
pub const fn bit_on(bit: u8) -> u8 {
    0x1 << bit
}
