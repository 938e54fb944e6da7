// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Reference checksums, computed from scratch.
//!
//! Two independent references are offered: a full one's complement sum
//! over the pseudo-header and segment, and smoltcp's own checksum
//! verification.

use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::IpAddress;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::Ipv6Packet;
use smoltcp::wire::TcpPacket;
use smoltcp::wire::UdpPacket;
use std::net::IpAddr;
use tcp2udp::api::Protocol;
use tcp2udp::engine::checksum::Checksum;
use tcp2udp::engine::checksum::HeaderChecksum;
use tcp2udp::engine::ether::ETHER_HDR_SZ;
use tcp2udp::engine::ether::ETHER_TYPE_IPV4;
use tcp2udp::engine::ether::ETHER_TYPE_IPV6;
use tcp2udp::engine::ip6::IPV6_HDR_SZ;

/// Where the IP and upper-layer parts of a frame are.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameLayout {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub l3_off: usize,
    pub l3_hdr_len: usize,
    pub proto: Protocol,
    pub l4_off: usize,
    /// Length of the upper-layer segment as the IP header declares it.
    pub l4_len: usize,
}

impl FrameLayout {
    pub fn l3_hdr<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[self.l3_off..self.l4_off]
    }

    pub fn l4<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[self.l4_off..self.l4_off + self.l4_len]
    }
}

/// Find the layers of an Ethernet frame holding IPv4 or IPv6.
pub fn layout(frame: &[u8]) -> FrameLayout {
    let l3_off = ETHER_HDR_SZ;
    let ip = &frame[l3_off..];

    match u16::from_be_bytes([frame[12], frame[13]]) {
        ETHER_TYPE_IPV4 => {
            let hdr_len = usize::from(ip[0] & 0x0F) * 4;
            let total_len = usize::from(u16::from_be_bytes([ip[2], ip[3]]));
            let src: [u8; 4] = ip[12..16].try_into().unwrap();
            let dst: [u8; 4] = ip[16..20].try_into().unwrap();
            FrameLayout {
                src: IpAddr::from(src),
                dst: IpAddr::from(dst),
                l3_off,
                l3_hdr_len: hdr_len,
                proto: Protocol::from(ip[9]),
                l4_off: l3_off + hdr_len,
                l4_len: total_len - hdr_len,
            }
        }

        ETHER_TYPE_IPV6 => {
            let pay_len = usize::from(u16::from_be_bytes([ip[4], ip[5]]));
            let src: [u8; 16] = ip[8..24].try_into().unwrap();
            let dst: [u8; 16] = ip[24..40].try_into().unwrap();
            FrameLayout {
                src: IpAddr::from(src),
                dst: IpAddr::from(dst),
                l3_off,
                l3_hdr_len: IPV6_HDR_SZ,
                proto: Protocol::from(ip[6]),
                l4_off: l3_off + IPV6_HDR_SZ,
                l4_len: pay_len,
            }
        }

        et => panic!("not an IP frame: 0x{et:04X}"),
    }
}

/// The pseudo-header bytes for an upper-layer segment of `len` bytes.
pub fn pseudo_hdr(
    src: IpAddr,
    dst: IpAddr,
    proto: Protocol,
    len: usize,
) -> Vec<u8> {
    let mut bytes = vec![];
    match (src, dst) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => {
            bytes.extend_from_slice(&src.octets());
            bytes.extend_from_slice(&dst.octets());
            bytes.extend_from_slice(&[0, u8::from(proto)]);
            bytes.extend_from_slice(&(len as u16).to_be_bytes());
        }

        (IpAddr::V6(src), IpAddr::V6(dst)) => {
            bytes.extend_from_slice(&src.octets());
            bytes.extend_from_slice(&dst.octets());
            bytes.extend_from_slice(&(len as u32).to_be_bytes());
            bytes.extend_from_slice(&[0, 0, 0, u8::from(proto)]);
        }

        _ => panic!("mixed address families"),
    }
    bytes
}

/// The checksum of `seg`, which must have its checksum field zeroed.
pub fn l4_csum(
    src: IpAddr,
    dst: IpAddr,
    proto: Protocol,
    seg: &[u8],
) -> HeaderChecksum {
    let mut csum = Checksum::compute(&pseudo_hdr(src, dst, proto, seg.len()));
    csum.add_bytes(seg);
    HeaderChecksum::from(csum)
}

/// Recompute the UDP checksum of a frame from scratch, ignoring the
/// value currently in it.
pub fn udp_csum(frame: &[u8]) -> [u8; 2] {
    let lay = layout(frame);
    let mut dgram = lay.l4(frame).to_vec();
    dgram[6..8].copy_from_slice(&[0, 0]);
    l4_csum(lay.src, lay.dst, Protocol::UDP, &dgram).udp_bytes()
}

/// Recompute the IPv4 header checksum of a frame from scratch.
pub fn ipv4_hdr_csum(frame: &[u8]) -> [u8; 2] {
    let lay = layout(frame);
    let mut hdr = lay.l3_hdr(frame).to_vec();
    hdr[10..12].copy_from_slice(&[0, 0]);
    HeaderChecksum::from(Checksum::compute(&hdr)).bytes()
}

fn smoltcp_l4(frame: &[u8]) -> (IpAddress, IpAddress, Vec<u8>) {
    let eth = EthernetFrame::new_checked(frame).unwrap();
    match eth.ethertype() {
        EthernetProtocol::Ipv4 => {
            let ip = Ipv4Packet::new_checked(eth.payload()).unwrap();
            assert!(ip.verify_checksum(), "bad IPv4 header checksum");
            (ip.src_addr().into(), ip.dst_addr().into(), ip.payload().to_vec())
        }

        EthernetProtocol::Ipv6 => {
            let ip = Ipv6Packet::new_checked(eth.payload()).unwrap();
            (ip.src_addr().into(), ip.dst_addr().into(), ip.payload().to_vec())
        }

        et => panic!("not an IP frame: {et:?}"),
    }
}

/// Verify the IP and UDP checksums of a frame with smoltcp.
pub fn smoltcp_verify_udp(frame: &[u8]) -> bool {
    let (src, dst, l4) = smoltcp_l4(frame);
    let udp = UdpPacket::new_checked(&l4[..]).unwrap();
    udp.verify_checksum(&src, &dst)
}

/// Verify the IP and TCP checksums of a frame with smoltcp.
pub fn smoltcp_verify_tcp(frame: &[u8]) -> bool {
    let (src, dst, l4) = smoltcp_l4(frame);
    let tcp = TcpPacket::new_checked(&l4[..]).unwrap();
    tcp.verify_checksum(&src, &dst)
}
