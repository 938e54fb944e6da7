// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv4 headers.

use super::headers::RawHeader;
use super::packet::PacketRead;
use super::packet::ReadErr;
use crate::api::Protocol;
use core::fmt;
use core::fmt::Display;
use core::net::Ipv4Addr;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV4_HDR_LEN_MASK: u8 = 0x0F;
pub const IPV4_HDR_VER_MASK: u8 = 0xF0;
pub const IPV4_HDR_VER_SHIFT: u8 = 4;
pub const IPV4_HDR_SZ: usize = Ipv4HdrRaw::SIZE;
pub const IPV4_VERSION: u8 = 4;
pub const IPV4_MORE_FRAGS: u16 = 0x2000;
pub const IPV4_FRAG_OFF_MASK: u16 = 0x1FFF;

pub const IPV4_PROTO_OFF: usize = 9;
pub const IPV4_CSUM_OFF: usize = 10;

/// The parts of an IPv4 header the transcoder needs to know about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv4Meta {
    /// Offset of the header from the start of the frame.
    pub hdr_off: usize,
    /// Header length in bytes, options included.
    pub hdr_len: usize,
    pub total_len: u16,
    /// Fragment offset, in 8-byte units.
    pub frag_off: u16,
    pub more_frags: bool,
    pub ttl: u8,
    pub proto: Protocol,
    pub csum: [u8; 2],
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Meta {
    /// Parse the IPv4 header at the reader's position, options
    /// included, and move past it.
    ///
    /// The fixed header is read first to learn the header length. The
    /// reader only moves once the full header, options and all, has
    /// been found to lie inside the frame.
    pub fn parse<'a, R: PacketRead<'a>>(
        rdr: &mut R,
    ) -> Result<Self, Ipv4HdrError> {
        let hdr_off = rdr.pos();
        let raw = Ipv4HdrRaw::peek_zc(rdr)?;

        let vsn = (raw.ver_hdr_len & IPV4_HDR_VER_MASK) >> IPV4_HDR_VER_SHIFT;
        if vsn != IPV4_VERSION {
            return Err(Ipv4HdrError::BadVersion { vsn });
        }

        let hdr_len_bytes = (raw.ver_hdr_len & IPV4_HDR_LEN_MASK) * 4;
        if usize::from(hdr_len_bytes) < IPV4_HDR_SZ {
            return Err(Ipv4HdrError::HeaderTruncated { hdr_len_bytes });
        }

        let total_len = u16::from_be_bytes(raw.total_len);

        // The total length is only checked against the header length
        // here. How it relates to the rest of the frame is up to the
        // layer above.
        if total_len < u16::from(hdr_len_bytes) {
            return Err(Ipv4HdrError::BadTotalLen { total_len });
        }

        rdr.seek(usize::from(hdr_len_bytes))?;
        let frag = u16::from_be_bytes(raw.frag_and_flags);

        Ok(Self {
            hdr_off,
            hdr_len: usize::from(hdr_len_bytes),
            total_len,
            frag_off: frag & IPV4_FRAG_OFF_MASK,
            more_frags: frag & IPV4_MORE_FRAGS != 0,
            ttl: raw.ttl,
            proto: Protocol::from(raw.proto),
            csum: raw.csum,
            src: Ipv4Addr::from(raw.src),
            dst: Ipv4Addr::from(raw.dst),
        })
    }

    /// Is this packet one piece of a fragmented datagram?
    pub fn is_fragment(&self) -> bool {
        self.more_frags || self.frag_off != 0
    }

    /// The length of the upper-layer segment: everything the total
    /// length covers past the header.
    pub fn pay_len(&self) -> Option<u16> {
        u16::try_from(self.hdr_len)
            .ok()
            .and_then(|hdr_len| self.total_len.checked_sub(hdr_len))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ipv4HdrError {
    BadTotalLen { total_len: u16 },
    BadVersion { vsn: u8 },
    HeaderTruncated { hdr_len_bytes: u8 },
    ReadError { error: ReadErr },
}

impl From<ReadErr> for Ipv4HdrError {
    fn from(error: ReadErr) -> Self {
        Self::ReadError { error }
    }
}

impl Display for Ipv4HdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadTotalLen { total_len } => {
                write!(f, "bad total length: {total_len}")
            }
            Self::BadVersion { vsn } => write!(f, "bad version: {vsn}"),
            Self::HeaderTruncated { hdr_len_bytes } => {
                write!(f, "header length too small: {hdr_len_bytes}")
            }
            Self::ReadError { error } => write!(f, "{error}"),
        }
    }
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl RawHeader for Ipv4HdrRaw {}

impl Default for Ipv4HdrRaw {
    fn default() -> Self {
        Self {
            ver_hdr_len: 0x45,
            dscp_ecn: 0x0,
            total_len: [0x0; 2],
            ident: [0x0; 2],
            frag_and_flags: [0x40, 0x0],
            ttl: 64,
            proto: u8::from(Protocol::TCP),
            csum: [0x0; 2],
            src: [0x0; 4],
            dst: [0x0; 4],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::packet::PacketReader;
    use zerocopy::IntoBytes;

    fn hdr(ver_hdr_len: u8, total_len: u16) -> Ipv4HdrRaw {
        Ipv4HdrRaw {
            ver_hdr_len,
            total_len: total_len.to_be_bytes(),
            src: [10, 0, 0, 99],
            dst: [52, 10, 128, 69],
            ..Default::default()
        }
    }

    #[test]
    fn parse_no_opts() {
        let raw = hdr(0x45, 60);
        let mut bytes = raw.as_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA; 40]);
        let mut rdr = PacketReader::new(&bytes);
        let meta = Ipv4Meta::parse(&mut rdr).unwrap();
        assert_eq!(meta.hdr_off, 0);
        assert_eq!(meta.hdr_len, IPV4_HDR_SZ);
        assert_eq!(meta.total_len, 60);
        assert_eq!(meta.pay_len(), Some(40));
        assert_eq!(meta.proto, Protocol::TCP);
        assert_eq!(meta.src, Ipv4Addr::new(10, 0, 0, 99));
        assert_eq!(meta.dst, Ipv4Addr::new(52, 10, 128, 69));
        // Don't Fragment alone is not a fragment.
        assert!(!meta.is_fragment());
        assert_eq!(rdr.pos(), IPV4_HDR_SZ);
    }

    #[test]
    fn parse_opts() {
        // Two words of options.
        let raw = hdr(0x47, 28);
        let mut bytes = raw.as_bytes().to_vec();
        bytes.extend_from_slice(&[0x01; 8]);
        let mut rdr = PacketReader::new(&bytes);
        let meta = Ipv4Meta::parse(&mut rdr).unwrap();
        assert_eq!(meta.hdr_len, 28);
        assert_eq!(meta.pay_len(), Some(0));
        assert_eq!(rdr.pos(), 28);
    }

    #[test]
    fn opts_past_end_of_frame() {
        let raw = hdr(0x4F, 60);
        let bytes = raw.as_bytes().to_vec();
        let mut rdr = PacketReader::new(&bytes);
        assert_eq!(
            Ipv4Meta::parse(&mut rdr),
            Err(Ipv4HdrError::ReadError {
                error: ReadErr::NotEnoughBytes { available: 20, needed: 60 }
            })
        );
        assert_eq!(rdr.pos(), 0);
    }

    #[test]
    fn bad_headers() {
        let cases = [
            (hdr(0x65, 20), Ipv4HdrError::BadVersion { vsn: 6 }),
            (hdr(0x44, 20), Ipv4HdrError::HeaderTruncated { hdr_len_bytes: 16 }),
            (hdr(0x45, 19), Ipv4HdrError::BadTotalLen { total_len: 19 }),
        ];

        for (raw, expected) in cases {
            let bytes = raw.as_bytes();
            let mut rdr = PacketReader::new(bytes);
            assert_eq!(Ipv4Meta::parse(&mut rdr), Err(expected));
            assert_eq!(rdr.pos(), 0);
        }
    }

    #[test]
    fn parse_at_offset() {
        let mut bytes = vec![0u8; 14];
        bytes.extend_from_slice(hdr(0x45, 20).as_bytes());
        let mut rdr = PacketReader::new(&bytes);
        rdr.seek(14).unwrap();
        let meta = Ipv4Meta::parse(&mut rdr).unwrap();
        assert_eq!(meta.hdr_off, 14);
        assert_eq!(rdr.pos(), 34);
    }

    #[test]
    fn fragment_fields() {
        for (bits, off, more) in
            [([0x20, 0x00], 0, true), ([0x00, 0xB9], 0xB9, false), ([0x3F, 0xFF], 0x1FFF, true)]
        {
            let mut raw = hdr(0x45, 20);
            raw.frag_and_flags = bits;
            let bytes = raw.as_bytes().to_vec();
            let meta = Ipv4Meta::parse(&mut PacketReader::new(&bytes)).unwrap();
            assert_eq!(meta.frag_off, off);
            assert_eq!(meta.more_frags, more);
            assert!(meta.is_fragment());
        }
    }
}
