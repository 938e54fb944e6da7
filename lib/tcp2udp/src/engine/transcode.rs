// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The TCP to UDP rewrite.
//!
//! The first ten bytes of the TCP header are overwritten with a UDP
//! header and a 2-byte big-endian payload offset:
//!
//! ```text
//! before: | sport | dport | seq           | ack   ...  | ... | csum | ... | opts | payload
//! after:  | sport | dport | len   | csum  | off   ...  | ... stale TCP bytes ... | payload
//!          0       2       4       6       8       10                           off + 8
//! ```
//!
//! The ports stay where they are. The offset counts from the end of the
//! UDP header to the start of the payload, so a receiver finds the
//! payload at `off` bytes into the UDP payload. The stale bytes
//! between the offset field and the payload are covered by the UDP
//! length and checksum, just as the whole TCP header was covered by
//! the TCP checksum.
//!
//! # Checksums
//!
//! The UDP checksum is derived from the TCP checksum by incremental
//! update (RFC 1624). It differs from the TCP checksum in exactly
//! three places:
//!
//! * The pseudo-header protocol word goes from TCP to UDP. The
//!   pseudo-header length is the same value for both.
//!
//! * Bytes 4..10 go from the sequence number and the top half of the
//!   acknowledgement number to the UDP length, a zero checksum, and
//!   the payload offset.
//!
//! * The TCP checksum at bytes 16..18 was summed as zero. It is now
//!   one of the stale bytes and is summed as is.
//!
//! The IPv4 header checksum only needs the protocol word patched. IPv6
//! has no header checksum.
//!
//! The TCP checksum must be complete, not a partial checksum left for
//! offload hardware to finish.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
use super::headers::IpMeta;
use super::headers::IpType;
use super::headers::RawHeader;
use super::hook::PassReason;
use super::ip4::IPV4_HDR_SZ;
use super::ip4::Ipv4HdrRaw;
use super::ip6::IPV6_HDR_SZ;
use super::ip6::Ipv6HdrRaw;
use super::packet::PacketRead;
use super::packet::PacketReader;
use super::packet::ParseError;
use super::packet::WriteError;
use super::packet::WriteResult;
use super::packet::slice_mut;
use super::port_table::PortTable;
use super::port_table::is_enabled;
use super::tcp::TcpMeta;
use super::udp::UDP_HDR_SZ;
use super::udp::UdpHdrRaw;
use crate::api::PROTO_TCP;
use crate::api::PROTO_UDP;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const TRANSCODED_HDR_SZ: usize = TranscodedHdrRaw::SIZE;

/// The header written over the front of a transcoded TCP header.
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
pub struct TranscodedHdrRaw {
    pub udp: UdpHdrRaw,
    /// Bytes from the end of the UDP header to the payload.
    pub pay_off: [u8; 2],
}

impl RawHeader for TranscodedHdrRaw {}

/// What the transcoder did to a frame.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TranscodeInfo {
    pub ip_type: IpType,
    /// Offset of the (former) TCP header from the start of the frame.
    pub tcp_off: usize,
    pub tcp_hdr_len: usize,
    pub src_port: u16,
    pub dst_port: u16,
    pub udp_len: u16,
    pub pay_off: u16,
    pub udp_csum: [u8; 2],
}

#[derive(Clone, Copy, Debug)]
enum IpRewrite {
    V4 { hdr_off: usize, csum: [u8; 2] },
    V6 { hdr_off: usize },
}

enum IpHdrMut<'a> {
    V4(&'a mut Ipv4HdrRaw, [u8; 2]),
    V6(&'a mut Ipv6HdrRaw),
}

/// Every byte a transcode writes, worked out ahead of time.
#[derive(Clone, Copy, Debug)]
struct Rewrite {
    info: TranscodeInfo,
    ip: IpRewrite,
}

/// Transcode the TCP segment at `tcp_off` of `pkt` in place.
///
/// The segment is parsed and admitted, and every new header value is
/// computed, before a single byte is written. On `Err` the frame is
/// exactly as it was.
pub fn transcode<P: PortTable + ?Sized>(
    pkt: &mut [u8],
    ip: &IpMeta,
    tcp_off: usize,
    ports: &P,
) -> Result<TranscodeInfo, PassReason> {
    let rewrite = plan(pkt, ip, tcp_off, ports)?;
    rewrite.apply(pkt).map_err(PassReason::Write)?;
    Ok(rewrite.info)
}

fn plan<P: PortTable + ?Sized>(
    pkt: &[u8],
    ip: &IpMeta,
    tcp_off: usize,
    ports: &P,
) -> Result<Rewrite, PassReason> {
    let mut rdr = PacketReader::new(pkt);
    rdr.seek(tcp_off).map_err(ParseError::from)?;
    let tcp = TcpMeta::parse(&mut rdr).map_err(ParseError::from)?;

    if !is_enabled(ports, tcp.dst) {
        return Err(PassReason::PortDisabled { port: tcp.dst });
    }

    // The UDP length covers everything the TCP length did. For IPv4
    // that is the total length less the header and its options.
    let udp_len = match ip.ulp_len() {
        Some(len) if usize::from(len) >= tcp.hdr_len => len,
        len => {
            return Err(PassReason::BadUlpLen {
                ulp_len: len.unwrap_or(0),
                tcp_hdr_len: tcp.hdr_len,
            });
        }
    };

    let pay_off = u16::try_from(tcp.hdr_len - UDP_HDR_SZ).map_err(|_| {
        PassReason::BadUlpLen { ulp_len: udp_len, tcp_hdr_len: tcp.hdr_len }
    })?;

    let ip_rewrite = match ip {
        IpMeta::Ip4(ip4) => {
            let mut csum = Checksum::from(HeaderChecksum::wrap(ip4.csum));
            csum.replace(&[ip4.ttl, PROTO_TCP], &[ip4.ttl, PROTO_UDP]);
            IpRewrite::V4 {
                hdr_off: ip4.hdr_off,
                csum: HeaderChecksum::from(csum).bytes(),
            }
        }
        IpMeta::Ip6(ip6) => IpRewrite::V6 { hdr_off: ip6.hdr_off },
    };

    Ok(Rewrite {
        info: TranscodeInfo {
            ip_type: ip.ip_type(),
            tcp_off,
            tcp_hdr_len: tcp.hdr_len,
            src_port: tcp.src,
            dst_port: tcp.dst,
            udp_len,
            pay_off,
            udp_csum: udp_csum(&tcp, udp_len, pay_off),
        },
        ip: ip_rewrite,
    })
}

/// Derive the UDP checksum of the transcoded segment from its TCP
/// checksum.
fn udp_csum(tcp: &TcpMeta, udp_len: u16, pay_off: u16) -> [u8; 2] {
    let seq = tcp.seq.to_be_bytes();
    let ack = tcp.ack.to_be_bytes();
    let len = udp_len.to_be_bytes();
    let off = pay_off.to_be_bytes();

    let mut csum = Checksum::from(HeaderChecksum::wrap(tcp.csum));
    csum.replace(&[0, PROTO_TCP], &[0, PROTO_UDP]);
    csum.replace(
        &[seq[0], seq[1], seq[2], seq[3], ack[0], ack[1]],
        &[len[0], len[1], 0, 0, off[0], off[1]],
    );
    csum.add_bytes(&tcp.csum);
    HeaderChecksum::from(csum).udp_bytes()
}

impl Rewrite {
    fn apply(&self, pkt: &mut [u8]) -> WriteResult<()> {
        let available = pkt.len();
        let (head, seg) = pkt.split_at_mut_checked(self.info.tcp_off).ok_or(
            WriteError::NotEnoughBytes { available, needed: self.info.tcp_off },
        )?;

        let ip = match self.ip {
            IpRewrite::V4 { hdr_off, csum } => IpHdrMut::V4(
                Ipv4HdrRaw::raw_mut_zc(slice_mut(head, hdr_off, IPV4_HDR_SZ)?)?,
                csum,
            ),
            IpRewrite::V6 { hdr_off } => IpHdrMut::V6(
                Ipv6HdrRaw::raw_mut_zc(slice_mut(head, hdr_off, IPV6_HDR_SZ)?)?,
            ),
        };
        let hdr = TranscodedHdrRaw::raw_mut_zc(seg)?;

        // Every view is in hand; nothing below can fail.
        match ip {
            IpHdrMut::V4(ip4, csum) => {
                ip4.proto = PROTO_UDP;
                ip4.csum = csum;
            }
            IpHdrMut::V6(ip6) => ip6.next_hdr = PROTO_UDP,
        }

        hdr.udp.length = self.info.udp_len.to_be_bytes();
        hdr.udp.csum = self.info.udp_csum;
        hdr.pay_off = self.info.pay_off.to_be_bytes();
        Ok(())
    }
}
