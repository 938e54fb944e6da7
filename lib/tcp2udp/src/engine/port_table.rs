// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The port admission table.
//!
//! Transcoding is keyed on the TCP destination port, in host order.
//! A port is admitted only when its table entry is present and equal
//! to [`PORT_ENABLED`]. A missing entry, or any other value, means the
//! frame is passed through untouched.
//!
//! The datapath only ever reads the table, through [`PortTable`]. The
//! control plane writes it through whatever concrete type it owns,
//! usually a [`PortArray`].

use crate::api::Config;
use crate::api::DYNAMIC_PORT;
use crate::api::PORT_DISABLED;
use crate::api::PORT_ENABLED;
use crate::api::PORT_TABLE_ENTRIES;
use crate::api::PortState;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use core::sync::atomic::AtomicU16;
use core::sync::atomic::Ordering;

/// Read access to a port admission table.
pub trait PortTable {
    /// Return the flag stored for `port`, if there is an entry.
    fn lookup(&self, port: u16) -> Option<u16>;
}

/// Is `port` enabled for transcoding in `table`?
pub fn is_enabled<T: PortTable + ?Sized>(table: &T, port: u16) -> bool {
    table.lookup(port) == Some(PORT_ENABLED)
}

impl<T: PortTable + ?Sized> PortTable for &T {
    fn lookup(&self, port: u16) -> Option<u16> {
        (**self).lookup(port)
    }
}

impl<T: PortTable + ?Sized> PortTable for Box<T> {
    fn lookup(&self, port: u16) -> Option<u16> {
        (**self).lookup(port)
    }
}

impl<T: PortTable + ?Sized> PortTable for Arc<T> {
    fn lookup(&self, port: u16) -> Option<u16> {
        (**self).lookup(port)
    }
}

/// A sparse table. Ports without an entry are disabled.
impl PortTable for BTreeMap<u16, u16> {
    fn lookup(&self, port: u16) -> Option<u16> {
        self.get(&port).copied()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PortTableError {
    /// Not enough free ports were left to satisfy the dynamic
    /// requests of a config.
    Exhausted { requested: usize },
    BadConfig(String),
}

impl Display for PortTableError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exhausted { requested } => {
                write!(f, "could not find {requested} free dynamic ports")
            }
            Self::BadConfig(msg) => write!(f, "bad config: {msg}"),
        }
    }
}

impl core::error::Error for PortTableError {}

/// The number of random picks made per dynamic port before giving up.
const DYNAMIC_PORT_ATTEMPTS: usize = 64;

/// A dense table with a flag for every port.
///
/// Every entry is an [`AtomicU16`], so the table can be shared between
/// any number of datapath readers and a control plane writer without
/// locking. A reader racing a write sees either the old flag or the
/// new one.
pub struct PortArray {
    flags: Box<[AtomicU16]>,
}

impl PortArray {
    /// Create a table with every port disabled.
    pub fn new() -> Self {
        let flags = (0..PORT_TABLE_ENTRIES)
            .map(|_| AtomicU16::new(PORT_DISABLED))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { flags }
    }

    fn entry(&self, port: u16) -> Option<&AtomicU16> {
        self.flags.get(usize::from(port))
    }

    /// Store a raw flag for `port`, returning the previous flag.
    pub fn set(&self, port: u16, flag: u16) -> u16 {
        match self.entry(port) {
            Some(entry) => entry.swap(flag, Ordering::Relaxed),
            None => PORT_DISABLED,
        }
    }

    pub fn enable(&self, port: u16) -> PortState {
        PortState::from_flag(self.set(port, PORT_ENABLED))
    }

    pub fn disable(&self, port: u16) -> PortState {
        PortState::from_flag(self.set(port, PORT_DISABLED))
    }

    pub fn state(&self, port: u16) -> PortState {
        PortState::from_flag(self.lookup(port).unwrap_or(PORT_DISABLED))
    }

    /// Disable every port.
    pub fn clear(&self) {
        for entry in self.flags.iter() {
            entry.store(PORT_DISABLED, Ordering::Relaxed);
        }
    }

    /// Return every enabled port, in ascending order.
    pub fn enabled_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.flags.iter().enumerate().filter_map(|(port, entry)| {
            if entry.load(Ordering::Relaxed) == PORT_ENABLED {
                u16::try_from(port).ok()
            } else {
                None
            }
        })
    }

    /// Enable every port named in `cfg`, returning them in config
    /// order.
    ///
    /// Each [`DYNAMIC_PORT`] entry is resolved by calling `pick` until
    /// it returns a port that is neither already enabled nor named
    /// statically in the config. Nothing is enabled unless the whole
    /// config could be resolved.
    pub fn apply_config<F>(
        &self,
        cfg: &Config,
        mut pick: F,
    ) -> Result<Vec<u16>, PortTableError>
    where
        F: FnMut() -> u16,
    {
        cfg.validate().map_err(PortTableError::BadConfig)?;

        let mut resolved = Vec::with_capacity(cfg.ports.len());
        let taken = |port: u16, resolved: &[u16]| {
            port == DYNAMIC_PORT
                || is_enabled(self, port)
                || cfg.ports.contains(&port)
                || resolved.contains(&port)
        };

        for port in cfg.ports.iter().copied() {
            if port != DYNAMIC_PORT {
                resolved.push(port);
                continue;
            }

            let found = (0..DYNAMIC_PORT_ATTEMPTS)
                .map(|_| pick())
                .find(|candidate| !taken(*candidate, &resolved));

            match found {
                Some(candidate) => resolved.push(candidate),
                None => {
                    return Err(PortTableError::Exhausted {
                        requested: cfg.dynamic_ports(),
                    });
                }
            }
        }

        for port in resolved.iter().copied() {
            self.enable(port);
        }

        Ok(resolved)
    }
}

impl Default for PortArray {
    fn default() -> Self {
        Self::new()
    }
}

impl PortTable for PortArray {
    fn lookup(&self, port: u16) -> Option<u16> {
        self.entry(port).map(|entry| entry.load(Ordering::Relaxed))
    }
}

impl fmt::Debug for PortArray {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.enabled_ports()).finish()
    }
}
