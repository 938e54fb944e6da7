// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Ethernet frames.

use super::headers::RawHeader;
use super::packet::PacketRead;
use super::packet::ReadErr;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_ARP: u16 = 0x0806;
pub const ETHER_TYPE_VLAN: u16 = 0x8100;
pub const ETHER_TYPE_IPV6: u16 = 0x86DD;

pub const ETHER_ADDR_LEN: usize = 6;

pub const ETHER_HDR_SZ: usize = EtherHdrRaw::SIZE;

#[derive(
    Clone, Copy, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum EtherType {
    Ipv4,
    Arp,
    Vlan,
    Ipv6,
    Unknown(u16),
}

impl From<u16> for EtherType {
    fn from(raw: u16) -> Self {
        match raw {
            ETHER_TYPE_IPV4 => Self::Ipv4,
            ETHER_TYPE_ARP => Self::Arp,
            ETHER_TYPE_VLAN => Self::Vlan,
            ETHER_TYPE_IPV6 => Self::Ipv6,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(et: EtherType) -> Self {
        match et {
            EtherType::Ipv4 => ETHER_TYPE_IPV4,
            EtherType::Arp => ETHER_TYPE_ARP,
            EtherType::Vlan => ETHER_TYPE_VLAN,
            EtherType::Ipv6 => ETHER_TYPE_IPV6,
            EtherType::Unknown(raw) => raw,
        }
    }
}

impl Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}", u16::from(*self))
    }
}

/// We are never really interested in internal representation of
/// [`EtherType`].
impl Debug for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[derive(
    Clone, Copy, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct EtherAddr {
    bytes: [u8; ETHER_ADDR_LEN],
}

impl EtherAddr {
    pub fn bytes(&self) -> [u8; ETHER_ADDR_LEN] {
        self.bytes
    }
}

impl From<[u8; ETHER_ADDR_LEN]> for EtherAddr {
    fn from(bytes: [u8; ETHER_ADDR_LEN]) -> Self {
        Self { bytes }
    }
}

impl FromStr for EtherAddr {
    type Err = String;

    fn from_str(val: &str) -> Result<Self, Self::Err> {
        let octets = val
            .split(':')
            .map(|s| u8::from_str_radix(s, 16).or(Err(format!("bad octet: {s}"))))
            .collect::<Result<Vec<u8>, _>>()?;

        let bytes: [u8; ETHER_ADDR_LEN] = octets.as_slice().try_into().map_err(
            |_| format!("incorrect number of bytes: {}", octets.len()),
        )?;

        Ok(Self { bytes })
    }
}

impl Display for EtherAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d, e, g] = self.bytes;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl Debug for EtherAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EtherAddr {{ {self} }}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EtherMeta {
    pub dst: EtherAddr,
    pub src: EtherAddr,
    pub ether_type: EtherType,
}

impl EtherMeta {
    /// Parse the Ethernet header at the reader's position and move
    /// past it.
    pub fn parse<'a, R: PacketRead<'a>>(
        rdr: &mut R,
    ) -> Result<Self, EtherHdrError> {
        let raw = EtherHdrRaw::raw_zc(rdr)?;
        Ok(Self::from(raw))
    }
}

impl From<&EtherHdrRaw> for EtherMeta {
    fn from(raw: &EtherHdrRaw) -> Self {
        Self {
            dst: EtherAddr::from(raw.dst),
            src: EtherAddr::from(raw.src),
            ether_type: EtherType::from(u16::from_be_bytes(raw.ether_type)),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EtherHdrError {
    ReadError { error: ReadErr },
}

impl From<ReadErr> for EtherHdrError {
    fn from(error: ReadErr) -> Self {
        Self::ReadError { error }
    }
}

impl Display for EtherHdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ReadError { error } => write!(f, "{error}"),
        }
    }
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct EtherHdrRaw {
    pub dst: [u8; ETHER_ADDR_LEN],
    pub src: [u8; ETHER_ADDR_LEN],
    pub ether_type: [u8; 2],
}

impl RawHeader for EtherHdrRaw {}
