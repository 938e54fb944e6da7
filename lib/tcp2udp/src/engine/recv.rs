// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Receive-side decoding of transcoded datagrams.
//!
//! A transcoded datagram's UDP payload starts with a 2-byte
//! big-endian offset. The original TCP payload starts that many bytes
//! into the UDP payload; everything before it is the offset field
//! itself followed by stale TCP header bytes.

use super::ether::EtherMeta;
use super::ether::EtherType;
use super::headers::IpMeta;
use super::ip4::Ipv4Meta;
use super::ip6::Ipv6Meta;
use super::packet::PacketRead;
use super::packet::PacketReader;
use super::packet::ParseError;
use super::udp::UdpMeta;
use crate::api::Protocol;
use core::fmt;
use core::fmt::Display;

/// The size of the offset field leading the UDP payload.
pub const PAY_OFF_SZ: usize = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecvError {
    /// The UDP payload is too short to hold the offset field.
    Truncated { len: usize },
    /// The offset points into the offset field or past the payload.
    BadOffset { off: u16, len: usize },
    /// The frame could not be parsed down to its UDP payload.
    Parse(ParseError),
}

impl From<ParseError> for RecvError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated { len } => {
                write!(f, "payload of {len} bytes has no offset field")
            }
            Self::BadOffset { off, len } => {
                write!(f, "offset {off} outside payload of {len} bytes")
            }
            Self::Parse(err) => write!(f, "{err}"),
        }
    }
}

/// Read the payload offset leading the UDP payload `dgram`.
pub fn pay_off(dgram: &[u8]) -> Result<u16, RecvError> {
    match dgram {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(RecvError::Truncated { len: dgram.len() }),
    }
}

/// Return the original TCP payload carried in the UDP payload `dgram`.
pub fn transcoded_payload(dgram: &[u8]) -> Result<&[u8], RecvError> {
    let len = dgram.len();
    let off = pay_off(dgram)?;

    if usize::from(off) < PAY_OFF_SZ {
        return Err(RecvError::BadOffset { off, len });
    }

    dgram.get(usize::from(off)..).ok_or(RecvError::BadOffset { off, len })
}

/// A transcoded frame, decoded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decoded<'a> {
    pub ip: IpMeta,
    pub udp: UdpMeta,
    /// The payload offset read from the datagram.
    pub pay_off: u16,
    /// The original TCP payload.
    pub payload: &'a [u8],
}

/// Decode a full Ethernet frame holding a transcoded datagram.
///
/// The UDP length bounds the payload, so any Ethernet padding is
/// dropped. A frame shorter than its UDP length is an error.
pub fn decode_frame(frame: &[u8]) -> Result<Decoded<'_>, RecvError> {
    let mut rdr = PacketReader::new(frame);
    let ether = EtherMeta::parse(&mut rdr).map_err(ParseError::from)?;

    let ip = match ether.ether_type {
        EtherType::Ipv4 => {
            IpMeta::Ip4(Ipv4Meta::parse(&mut rdr).map_err(ParseError::from)?)
        }
        EtherType::Ipv6 => {
            IpMeta::Ip6(Ipv6Meta::parse(&mut rdr).map_err(ParseError::from)?)
        }
        et => {
            return Err(ParseError::UnsupportedEtherType(u16::from(et)).into());
        }
    };

    if ip.proto() != Protocol::UDP {
        return Err(ParseError::UnsupportedProtocol(ip.proto()).into());
    }

    let udp = UdpMeta::parse(&mut rdr).map_err(ParseError::from)?;
    let dgram = rdr.slice(udp.pay_len()).map_err(ParseError::from)?;
    let payload = transcoded_payload(dgram)?;

    Ok(Decoded { ip, udp, pay_off: pay_off(dgram)?, payload })
}
