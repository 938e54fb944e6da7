// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The flag value which marks a destination port as enabled for
/// transcoding. Any other value means disabled.
pub const PORT_ENABLED: u16 = 1;

/// The flag value written when a port is disabled.
pub const PORT_DISABLED: u16 = 0;

/// The number of entries in a dense port table: one per 16-bit port.
pub const PORT_TABLE_ENTRIES: usize = 1 << 16;

/// Port `0` in a configuration asks for a randomly chosen port from
/// the ephemeral range `[EPHEMERAL_PORT_MIN, EPHEMERAL_PORT_MAX]`.
pub const DYNAMIC_PORT: u16 = 0;
pub const EPHEMERAL_PORT_MIN: u16 = 32768;
pub const EPHEMERAL_PORT_MAX: u16 = 65535;

/// The admission state of a destination port.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub enum PortState {
    Enabled,
    #[default]
    Disabled,
}

impl PortState {
    /// Interpret a raw table flag. Only [`PORT_ENABLED`] means
    /// enabled; everything else is treated as disabled.
    pub fn from_flag(flag: u16) -> Self {
        if flag == PORT_ENABLED { Self::Enabled } else { Self::Disabled }
    }

    pub fn flag(self) -> u16 {
        match self {
            Self::Enabled => PORT_ENABLED,
            Self::Disabled => PORT_DISABLED,
        }
    }
}

impl Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_one_is_enabled() {
        assert_eq!(PortState::from_flag(PORT_ENABLED), PortState::Enabled);
        for flag in [0, 2, 0x100, u16::MAX] {
            assert_eq!(PortState::from_flag(flag), PortState::Disabled);
        }
        assert_eq!(PortState::Enabled.flag(), PORT_ENABLED);
        assert_eq!(PortState::Disabled.flag(), PORT_DISABLED);
    }
}
