// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! TCP headers.

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

pub const TCP_HDR_OFFSET_MASK: u8 = 0xF0;
pub const TCP_HDR_OFFSET_SHIFT: u8 = 4;
pub const TCP_HDR_SZ: usize = TcpHdrRaw::SIZE;

/// Byte offset of the sequence number. The transcoded header's UDP
/// length field starts here.
pub const TCP_SEQ_OFF: usize = 4;
pub const TCP_CSUM_OFF: usize = 16;

pub mod TcpFlags {
    pub const FIN: u8 = crate::bit_on(0);
    pub const SYN: u8 = crate::bit_on(1);
    pub const RST: u8 = crate::bit_on(2);
    pub const PSH: u8 = crate::bit_on(3);
    pub const ACK: u8 = crate::bit_on(4);
    pub const URG: u8 = crate::bit_on(5);
    pub const ECE: u8 = crate::bit_on(6);
    pub const CWR: u8 = crate::bit_on(7);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TcpMeta {
    /// Offset of the header from the start of the frame.
    pub hdr_off: usize,
    /// Header length in bytes, options included.
    pub hdr_len: usize,
    pub src: u16,
    pub dst: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    pub window_size: u16,
    pub csum: [u8; 2],
}

impl TcpMeta {
    /// Parse the TCP header at the reader's position, options
    /// included, and move past it.
    ///
    /// Like IPv4, this reads the fixed header to learn the data
    /// offset, then checks the option-extended header against the end
    /// of the frame before moving.
    pub fn parse<'a, R: PacketRead<'a>>(
        rdr: &mut R,
    ) -> Result<Self, TcpHdrError> {
        let hdr_off = rdr.pos();
        let raw = TcpHdrRaw::peek_zc(rdr)?;

        let offset = (raw.offset & TCP_HDR_OFFSET_MASK) >> TCP_HDR_OFFSET_SHIFT;
        let hdr_len = usize::from(offset) * 4;

        if hdr_len < TCP_HDR_SZ {
            return Err(TcpHdrError::BadOffset { offset });
        }

        rdr.seek(hdr_len)
            .map_err(|error| TcpHdrError::TruncatedOptions { error })?;

        Ok(Self {
            hdr_off,
            hdr_len,
            src: u16::from_be_bytes(raw.src_port),
            dst: u16::from_be_bytes(raw.dst_port),
            seq: u32::from_be_bytes(raw.seq),
            ack: u32::from_be_bytes(raw.ack),
            flags: raw.flags,
            window_size: u16::from_be_bytes(raw.window_size),
            csum: raw.csum,
        })
    }

    pub fn options_len(&self) -> usize {
        self.hdr_len - TCP_HDR_SZ
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        (self.flags & flag) != 0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TcpHdrError {
    /// The data offset implies a header smaller than the fixed header.
    BadOffset { offset: u8 },
    /// The fixed header is not all there.
    ReadError { error: ReadErr },
    /// The data offset implies options running off the frame.
    TruncatedOptions { error: ReadErr },
}

impl From<ReadErr> for TcpHdrError {
    fn from(error: ReadErr) -> Self {
        Self::ReadError { error }
    }
}

impl Display for TcpHdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadOffset { offset } => {
                write!(f, "bad data offset: {offset}")
            }
            Self::ReadError { error } => write!(f, "{error}"),
            Self::TruncatedOptions { error } => {
                write!(f, "truncated options: {error}")
            }
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
pub struct TcpHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub seq: [u8; 4],
    pub ack: [u8; 4],
    pub offset: u8,
    pub flags: u8,
    pub window_size: [u8; 2],
    pub csum: [u8; 2],
    pub urg: [u8; 2],
}

impl RawHeader for TcpHdrRaw {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::packet::PacketReader;

    #[rustfmt::skip]
    const SYN_OPTIONS: [u8; 20] = [
        // MSS
        0x02, 0x04, 0x05, 0xB4,
        // SACK permitted
        0x04, 0x02,
        // Timestamps
        0x08, 0x0A, 0x09, 0xB4, 0x2A, 0xA9, 0x00, 0x00, 0x00, 0x00,
        // No-op
        0x01,
        // Window Scale
        0x03, 0x03, 0x01,
    ];

    fn base_bytes(hdr_len: usize) -> [u8; TCP_HDR_SZ] {
        #[rustfmt::skip]
        let bytes = [
            // source
            0xC0, 0x02,
            // dest
            0x00, 0x50,
            // seq
            0x95, 0xAC, 0xAC, 0xB6,
            // ack
            0x00, 0x00, 0x00, 0x00,
            // offset
            ((hdr_len / 4) as u8) << TCP_HDR_OFFSET_SHIFT,
            // flags
            0x02,
            // window
            0xFA, 0xF0,
            // checksum
            0x12, 0x34,
            // URG pointer
            0x00, 0x00,
        ];
        bytes
    }

    #[test]
    fn parse_no_opts() {
        let bytes = base_bytes(TCP_HDR_SZ);
        let mut rdr = PacketReader::new(&bytes);
        let tcp = TcpMeta::parse(&mut rdr).unwrap();
        assert_eq!(tcp.src, 49154);
        assert_eq!(tcp.dst, 80);
        assert_eq!(tcp.seq, 2511121590);
        assert_eq!(tcp.hdr_len, TCP_HDR_SZ);
        assert_eq!(tcp.options_len(), 0);
        assert_eq!(tcp.csum, [0x12, 0x34]);
        assert!(tcp.has_flag(TcpFlags::SYN));
        assert!(!tcp.has_flag(TcpFlags::ACK));
        assert_eq!(rdr.pos(), TCP_HDR_SZ);
    }

    #[test]
    fn parse_opts() {
        let hdr_len = TCP_HDR_SZ + SYN_OPTIONS.len();
        let mut bytes = base_bytes(hdr_len).to_vec();
        bytes.extend_from_slice(&SYN_OPTIONS);
        bytes.extend_from_slice(b"payload");

        let mut rdr = PacketReader::new(&bytes);
        let tcp = TcpMeta::parse(&mut rdr).unwrap();
        assert_eq!(tcp.hdr_len, 40);
        assert_eq!(tcp.options_len(), 20);
        assert_eq!(rdr.pos(), 40);
    }

    #[test]
    fn parse_opts_truncated() {
        // Claim an extra word of options the frame doesn't have.
        let hdr_len = TCP_HDR_SZ + SYN_OPTIONS.len() + 4;
        let mut bytes = base_bytes(hdr_len).to_vec();
        bytes.extend_from_slice(&SYN_OPTIONS);

        let mut rdr = PacketReader::new(&bytes);
        let err = TcpMeta::parse(&mut rdr)
            .expect_err("expected to fail parsing malformed TCP header");
        assert_eq!(
            err,
            TcpHdrError::TruncatedOptions {
                error: ReadErr::NotEnoughBytes { available: 40, needed: 44 }
            }
        );
        assert_eq!(rdr.pos(), 0);
    }

    #[test]
    fn offset_below_minimum() {
        for doff in 0..5 {
            let bytes = base_bytes(doff * 4);
            let mut rdr = PacketReader::new(&bytes);
            assert_eq!(
                TcpMeta::parse(&mut rdr),
                Err(TcpHdrError::BadOffset { offset: doff as u8 })
            );
        }
    }
}
