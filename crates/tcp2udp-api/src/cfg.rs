// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Transcoder configuration.

use crate::port::DYNAMIC_PORT;
use alloc::string::String;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// The configuration of a transcoder instance.
///
/// ```toml
/// # Enable transcoding of TCP traffic destined to these ports. A
/// # port of 0 asks for a random ephemeral port.
/// ports = [8443, 0]
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Destination ports to enable.
    #[serde(default)]
    pub ports: Vec<u16>,
}

impl Config {
    /// The number of ports which will be chosen at random when this
    /// configuration is applied.
    pub fn dynamic_ports(&self) -> usize {
        self.ports.iter().filter(|p| **p == DYNAMIC_PORT).count()
    }

    /// Verify the configuration names each static port only once.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = Vec::with_capacity(self.ports.len());
        for port in self.ports.iter().copied() {
            if port == DYNAMIC_PORT {
                continue;
            }

            if seen.contains(&port) {
                return Err(format!("duplicate port: {port}"));
            }
            seen.push(port);
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_toml() {
        let cfg: Config = toml::from_str("ports = [8443, 0, 9000]").unwrap();
        assert_eq!(cfg.ports, vec![8443, 0, 9000]);
        assert_eq!(cfg.dynamic_ports(), 1);
        cfg.validate().unwrap();
    }

    #[test]
    fn empty_config() {
        let cfg: Config = toml::from_str("").unwrap();
        assert!(cfg.ports.is_empty());
    }

    #[test]
    fn reject_unknown_fields() {
        assert!(toml::from_str::<Config>("port = 1").is_err());
    }

    #[test]
    fn duplicate_ports() {
        let cfg = Config { ports: vec![80, 0, 0, 80] };
        assert_eq!(cfg.validate(), Err("duplicate port: 80".into()));
    }
}
