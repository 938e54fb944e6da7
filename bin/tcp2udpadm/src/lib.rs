// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! tcp2udp administration library.
//!
//! Loads port configurations and replays packet captures through the
//! transcoder, the same way the datapath would see them.

pub mod pcap;

use rand::Rng;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tcp2udp::engine::Disposition;
use tcp2udp::engine::PortArray;
use tcp2udp::engine::Transcoder;
use tcp2udp::engine::port_table::PortTableError;
use tcp2udp_api::Config;
use tcp2udp_api::EPHEMERAL_PORT_MAX;
use tcp2udp_api::EPHEMERAL_PORT_MIN;
use thiserror::Error;

pub const MAJOR_VERSION: u64 = tcp2udp_api::MAJOR_VERSION;

#[derive(Debug, Error)]
pub enum AdmError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad config: {0}")]
    Config(String),

    #[error("failed to parse capture: {0}")]
    Pcap(String),

    #[error("unsupported link type {0}, only Ethernet is supported")]
    Linktype(i32),

    #[error("failed to build port table: {0}")]
    PortTable(#[from] PortTableError),
}

impl AdmError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Parse a TOML port configuration.
pub fn parse_config(text: &str) -> Result<Config, AdmError> {
    let cfg: Config =
        toml::from_str(text).map_err(|e| AdmError::Config(e.to_string()))?;
    cfg.validate().map_err(AdmError::Config)?;
    Ok(cfg)
}

/// Read and parse a TOML port configuration file.
pub fn load_config(path: &Path) -> Result<Config, AdmError> {
    let text = fs::read_to_string(path).map_err(|e| AdmError::io(path, e))?;
    parse_config(&text)
}

/// Choose a random port from the ephemeral range.
pub fn random_port(rng: &mut impl Rng) -> u16 {
    rng.random_range(EPHEMERAL_PORT_MIN..=EPHEMERAL_PORT_MAX)
}

/// Build a port table from `cfg`, choosing dynamic ports at random.
///
/// Returns the table along with the resolved ports, in config order.
pub fn port_table(cfg: &Config) -> Result<(PortArray, Vec<u16>), AdmError> {
    let ports = PortArray::new();
    let mut rng = rand::rng();
    let resolved = ports.apply_config(cfg, || random_port(&mut rng))?;
    Ok((ports, resolved))
}

/// Run every frame through `xcoder`, in place, returning what became
/// of each.
pub fn replay(
    xcoder: &Transcoder<PortArray>,
    frames: &mut [pcap::Frame],
) -> Vec<Disposition> {
    frames
        .iter_mut()
        .map(|frame| xcoder.process_detailed(&mut frame.data))
        .collect()
}
