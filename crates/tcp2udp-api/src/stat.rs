// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use serde::Deserialize;
use serde::Serialize;

/// A point-in-time copy of the transcoder's packet counters.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct StatsSnapshot {
    /// Frames rewritten from TCP to UDP.
    pub transcoded: u64,
    /// Frames whose headers failed to parse or were truncated.
    pub pass_malformed: u64,
    /// Frames carrying neither IPv4 nor IPv6.
    pub pass_ether_type: u64,
    /// IP packets not carrying TCP.
    pub pass_protocol: u64,
    /// TCP segments split across IPv4 fragments.
    pub pass_fragment: u64,
    /// TCP segments destined to a port not enabled for transcoding.
    pub pass_port_disabled: u64,
}

impl StatsSnapshot {
    /// Total number of frames seen.
    pub fn total(&self) -> u64 {
        self.transcoded + self.passed()
    }

    /// Total number of frames passed through unmodified.
    pub fn passed(&self) -> u64 {
        self.pass_malformed
            + self.pass_ether_type
            + self.pass_protocol
            + self.pass_fragment
            + self.pass_port_disabled
    }
}
