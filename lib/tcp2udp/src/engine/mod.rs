// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The transcoding engine.
//!
//! Parsing is layered bottom up: [`packet`] provides the bounds-checked
//! cursor, the protocol modules parse one header each on top of it,
//! and [`hook`] drives a whole frame through them into the
//! [`transcode`] rewrite.
pub mod checksum;
pub mod ether;
pub mod headers;
pub mod hook;
pub mod ip4;
pub mod ip6;
pub mod packet;
pub mod port_table;
pub mod recv;
pub mod stat;
pub mod tcp;
pub mod transcode;
pub mod udp;

pub use hook::Disposition;
pub use hook::PassReason;
pub use hook::Transcoder;
pub use hook::Verdict;
pub use port_table::PortArray;
pub use port_table::PortTable;
