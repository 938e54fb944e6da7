// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! UDP headers.
//!
//! The transcoder never parses UDP; it only writes the header. Parsing
//! is used on the receive side, to find the datagrams the transcoder
//! produced.

use super::headers::RawHeader;
use super::packet::PacketRead;
use super::packet::ReadErr;
use core::fmt;
use core::fmt::Display;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const UDP_HDR_SZ: usize = UdpHdrRaw::SIZE;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UdpMeta {
    /// Offset of the header from the start of the frame.
    pub hdr_off: usize,
    pub src: u16,
    pub dst: u16,
    /// The length field: header plus payload.
    pub len: u16,
    pub csum: [u8; 2],
}

impl UdpMeta {
    pub fn parse<'a, R: PacketRead<'a>>(
        rdr: &mut R,
    ) -> Result<Self, UdpHdrError> {
        let hdr_off = rdr.pos();
        let raw = UdpHdrRaw::peek_zc(rdr)?;

        let len = u16::from_be_bytes(raw.length);
        if usize::from(len) < UDP_HDR_SZ {
            return Err(UdpHdrError::BadLength { len });
        }

        rdr.seek(UDP_HDR_SZ)?;

        Ok(Self {
            hdr_off,
            src: u16::from_be_bytes(raw.src_port),
            dst: u16::from_be_bytes(raw.dst_port),
            len,
            csum: raw.csum,
        })
    }

    /// The number of payload bytes the length field declares.
    pub fn pay_len(&self) -> usize {
        usize::from(self.len) - UDP_HDR_SZ
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UdpHdrError {
    BadLength { len: u16 },
    ReadError { error: ReadErr },
}

impl From<ReadErr> for UdpHdrError {
    fn from(error: ReadErr) -> Self {
        Self::ReadError { error }
    }
}

impl Display for UdpHdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadLength { len } => write!(f, "bad length: {len}"),
            Self::ReadError { error } => write!(f, "{error}"),
        }
    }
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone,
    Debug,
    Default,
    FromBytes,
    IntoBytes,
    KnownLayout,
    Immutable,
    Unaligned,
)]
pub struct UdpHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub length: [u8; 2],
    pub csum: [u8; 2],
}

impl RawHeader for UdpHdrRaw {}
