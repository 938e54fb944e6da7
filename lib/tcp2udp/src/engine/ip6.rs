// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv6 headers.
//!
//! Only the fixed header is parsed. A next header value other than
//! TCP, extension headers included, is left for the caller to reject.

use super::headers::RawHeader;
use super::packet::PacketRead;
use super::packet::ReadErr;
use crate::api::Protocol;
use core::fmt;
use core::fmt::Display;
use core::net::Ipv6Addr;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV6_HDR_VER_MASK: u8 = 0xF0;
pub const IPV6_HDR_VER_SHIFT: u8 = 4;
pub const IPV6_HDR_SZ: usize = Ipv6HdrRaw::SIZE;
pub const IPV6_VERSION: u8 = 6;

pub const IPV6_NEXT_HDR_OFF: usize = 6;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv6Meta {
    /// Offset of the header from the start of the frame.
    pub hdr_off: usize,
    pub payload_len: u16,
    pub next_hdr: Protocol,
    pub hop_limit: u8,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
}

impl Ipv6Meta {
    pub fn parse<'a, R: PacketRead<'a>>(
        rdr: &mut R,
    ) -> Result<Self, Ipv6HdrError> {
        let hdr_off = rdr.pos();
        let raw = Ipv6HdrRaw::peek_zc(rdr)?;

        let vsn = (raw.vsn_class_flow[0] & IPV6_HDR_VER_MASK)
            >> IPV6_HDR_VER_SHIFT;
        if vsn != IPV6_VERSION {
            return Err(Ipv6HdrError::BadVersion { vsn });
        }

        rdr.seek(IPV6_HDR_SZ)?;

        Ok(Self {
            hdr_off,
            payload_len: u16::from_be_bytes(raw.payload_len),
            next_hdr: Protocol::from(raw.next_hdr),
            hop_limit: raw.hop_limit,
            src: Ipv6Addr::from(raw.src),
            dst: Ipv6Addr::from(raw.dst),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ipv6HdrError {
    BadVersion { vsn: u8 },
    ReadError { error: ReadErr },
}

impl From<ReadErr> for Ipv6HdrError {
    fn from(error: ReadErr) -> Self {
        Self::ReadError { error }
    }
}

impl Display for Ipv6HdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadVersion { vsn } => write!(f, "bad version: {vsn}"),
            Self::ReadError { error } => write!(f, "{error}"),
        }
    }
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct Ipv6HdrRaw {
    pub vsn_class_flow: [u8; 4],
    pub payload_len: [u8; 2],
    pub next_hdr: u8,
    pub hop_limit: u8,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

impl RawHeader for Ipv6HdrRaw {}

impl Default for Ipv6HdrRaw {
    fn default() -> Self {
        Self {
            vsn_class_flow: [0x60, 0x00, 0x00, 0x00],
            payload_len: [0x0; 2],
            next_hdr: u8::from(Protocol::TCP),
            hop_limit: 255,
            src: [0x0; 16],
            dst: [0x0; 16],
        }
    }
}
