// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Header abstractions shared by the individual protocol modules.

use super::ip4::Ipv4Meta;
use super::ip6::Ipv6Meta;
use super::packet::PacketRead;
use super::packet::ReadErr;
use super::packet::WriteError;
use crate::api::Protocol;
use core::mem::size_of;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// A raw header.
///
/// A raw header is the most basic representation of a given header
/// type: a `#[repr(C)]` overlay of the base header bytes, in network
/// order, with no validation of any field. Options and extensions are
/// not part of the raw header.
///
/// Raw headers are unaligned, so viewing a byte slice as one can only
/// fail for lack of bytes.
pub trait RawHeader:
    FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned + Sized
{
    /// The size of the base header in bytes.
    const SIZE: usize = size_of::<Self>();

    /// Read a zerocopy view of the raw header at the current position
    /// of `rdr`, moving the position past it.
    fn raw_zc<'a, R: PacketRead<'a>>(rdr: &mut R) -> Result<&'a Self, ReadErr> {
        let bytes = rdr.slice(Self::SIZE)?;
        Self::ref_from_bytes(bytes).map_err(|_| ReadErr::BadLayout)
    }

    /// Read a zerocopy view of the raw header at the current position
    /// of `rdr`, leaving the position where it is.
    fn peek_zc<'a, R: PacketRead<'a>>(rdr: &R) -> Result<&'a Self, ReadErr> {
        let bytes = rdr.peek(Self::SIZE)?;
        Self::ref_from_bytes(bytes).map_err(|_| ReadErr::BadLayout)
    }

    /// View the front of `dst` as a mutable raw header.
    fn raw_mut_zc(dst: &mut [u8]) -> Result<&mut Self, WriteError> {
        let available = dst.len();
        Self::mut_from_prefix(dst).map(|(hdr, _rest)| hdr).map_err(|_| {
            WriteError::NotEnoughBytes { available, needed: Self::SIZE }
        })
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum IpType {
    Ipv4,
    Ipv6,
}

/// The parsed L3 header a TCP segment arrived in.
///
/// Exactly one of the two is ever present for a given frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IpMeta {
    Ip4(Ipv4Meta),
    Ip6(Ipv6Meta),
}

impl IpMeta {
    pub fn ip_type(&self) -> IpType {
        match self {
            Self::Ip4(_) => IpType::Ipv4,
            Self::Ip6(_) => IpType::Ipv6,
        }
    }

    /// The upper-layer protocol carried directly by this header.
    pub fn proto(&self) -> Protocol {
        match self {
            Self::Ip4(ip4) => ip4.proto,
            Self::Ip6(ip6) => ip6.next_hdr,
        }
    }

    /// The number of bytes the header declares to follow it: the
    /// length of the upper-layer segment.
    pub fn ulp_len(&self) -> Option<u16> {
        match self {
            Self::Ip4(ip4) => ip4.pay_len(),
            Self::Ip6(ip6) => Some(ip6.payload_len),
        }
    }
}
