// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.
//!
//! Frames are built from scratch with correct checksums, and the
//! checksum oracles here always recompute over the full bytes. None of
//! it goes through the incremental checksum path under test.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod oracle;
pub mod pcap;

pub use tcp2udp::api::Protocol;
pub use tcp2udp::engine::Disposition;
pub use tcp2udp::engine::PassReason;
pub use tcp2udp::engine::PortArray;
pub use tcp2udp::engine::PortTable;
pub use tcp2udp::engine::Transcoder;
pub use tcp2udp::engine::Verdict;
pub use tcp2udp::engine::ether::ETHER_HDR_SZ;
pub use tcp2udp::engine::ip4::IPV4_HDR_SZ;
pub use tcp2udp::engine::ip6::IPV6_HDR_SZ;
pub use tcp2udp::engine::tcp::TCP_HDR_SZ;
pub use tcp2udp::engine::tcp::TcpFlags;
pub use tcp2udp::engine::udp::UDP_HDR_SZ;

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use tcp2udp::engine::checksum::Checksum;
use tcp2udp::engine::checksum::HeaderChecksum;
use tcp2udp::engine::ether::ETHER_TYPE_ARP;
use tcp2udp::engine::ether::ETHER_TYPE_IPV4;
use tcp2udp::engine::ether::ETHER_TYPE_IPV6;
use tcp2udp::engine::ether::EtherHdrRaw;
use tcp2udp::engine::ip4::Ipv4HdrRaw;
use tcp2udp::engine::ip6::Ipv6HdrRaw;
use tcp2udp::engine::tcp::TCP_HDR_OFFSET_SHIFT;
use tcp2udp::engine::tcp::TcpHdrRaw;
use tcp2udp::engine::udp::UdpHdrRaw;
use zerocopy::IntoBytes;

pub const GUEST_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xFA, 0xFA, 0x37];
pub const GW_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xFF, 0x77, 0x77];

pub const CLIENT_IP4: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
pub const SERVER_IP4: Ipv4Addr = Ipv4Addr::new(52, 10, 128, 69);
pub const CLIENT_IP6: Ipv6Addr =
    Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0x5);
pub const SERVER_IP6: Ipv6Addr =
    Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x45);

/// The TCP options a Linux client sends on a data segment: two no-ops
/// and a timestamp.
pub const TS_OPTS: [u8; 12] = [
    0x01, 0x01, 0x08, 0x0A, 0x00, 0x2B, 0x1F, 0x61, 0x77, 0x12, 0x9C, 0x40,
];

/// Build a port table with `ports` enabled.
pub fn ports_map(ports: &[u16]) -> BTreeMap<u16, u16> {
    ports.iter().map(|p| (*p, 1)).collect()
}

/// Everything needed to build an Ethernet frame carrying IP.
#[derive(Clone, Debug)]
pub struct FrameSpec {
    pub src: IpAddr,
    pub dst: IpAddr,
    /// IPv4 options. Ignored for IPv6. Padded to a multiple of four.
    pub ip_opts: Vec<u8>,
    pub ttl: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    /// TCP options. Padded to a multiple of four.
    pub tcp_opts: Vec<u8>,
    pub payload: Vec<u8>,
    /// Zero bytes appended past the end of the IP packet.
    pub eth_pad: usize,
}

impl FrameSpec {
    pub fn v4() -> Self {
        Self {
            src: IpAddr::V4(CLIENT_IP4),
            dst: IpAddr::V4(SERVER_IP4),
            ip_opts: vec![],
            ttl: 64,
            src_port: 44490,
            dst_port: 8443,
            seq: 2511121667,
            ack: 754208397,
            flags: TcpFlags::ACK | TcpFlags::PSH,
            tcp_opts: vec![],
            payload: b"GET / HTTP/1.1\r\n\r\n".to_vec(),
            eth_pad: 0,
        }
    }

    pub fn v6() -> Self {
        Self {
            src: IpAddr::V6(CLIENT_IP6),
            dst: IpAddr::V6(SERVER_IP6),
            ..Self::v4()
        }
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn tcp_opts(mut self, opts: &[u8]) -> Self {
        self.tcp_opts = opts.to_vec();
        self
    }

    pub fn ip_opts(mut self, opts: &[u8]) -> Self {
        self.ip_opts = opts.to_vec();
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn eth_pad(mut self, pad: usize) -> Self {
        self.eth_pad = pad;
        self
    }

    fn padded(opts: &[u8]) -> Vec<u8> {
        let mut opts = opts.to_vec();
        while opts.len() % 4 != 0 {
            // End of option list.
            opts.push(0x00);
        }
        opts
    }

    /// The TCP header length, options included.
    pub fn tcp_hdr_len(&self) -> usize {
        TCP_HDR_SZ + Self::padded(&self.tcp_opts).len()
    }

    /// The TCP segment with a checksum filled in.
    pub fn tcp_segment(&self) -> Vec<u8> {
        let opts = Self::padded(&self.tcp_opts);
        let hdr = TcpHdrRaw {
            src_port: self.src_port.to_be_bytes(),
            dst_port: self.dst_port.to_be_bytes(),
            seq: self.seq.to_be_bytes(),
            ack: self.ack.to_be_bytes(),
            offset: (((TCP_HDR_SZ + opts.len()) / 4) as u8)
                << TCP_HDR_OFFSET_SHIFT,
            flags: self.flags,
            window_size: 64436u16.to_be_bytes(),
            csum: [0; 2],
            urg: [0; 2],
        };

        let mut seg = hdr.as_bytes().to_vec();
        seg.extend_from_slice(&opts);
        seg.extend_from_slice(&self.payload);
        let csum = oracle::l4_csum(self.src, self.dst, Protocol::TCP, &seg);
        seg[16..18].copy_from_slice(&csum.bytes());
        seg
    }

    /// Build the Ethernet frame carrying TCP.
    pub fn build(&self) -> Vec<u8> {
        let seg = self.tcp_segment();
        self.wrap_ip(Protocol::TCP, &seg)
    }

    /// Wrap an upper-layer segment in IP and Ethernet headers.
    pub fn wrap_ip(&self, proto: Protocol, seg: &[u8]) -> Vec<u8> {
        let mut frame = match (self.src, self.dst) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => {
                let mut frame = eth_hdr(ETHER_TYPE_IPV4);
                let opts = Self::padded(&self.ip_opts);
                let hdr_len = IPV4_HDR_SZ + opts.len();
                let mut ip = Ipv4HdrRaw {
                    ver_hdr_len: 0x40 | (hdr_len / 4) as u8,
                    total_len: ((hdr_len + seg.len()) as u16).to_be_bytes(),
                    ident: 0x0063u16.to_be_bytes(),
                    ttl: self.ttl,
                    proto: u8::from(proto),
                    src: src.octets(),
                    dst: dst.octets(),
                    ..Default::default()
                };
                let mut csum = Checksum::compute(ip.as_bytes());
                csum.add_bytes(&opts);
                ip.csum = HeaderChecksum::from(csum).bytes();
                frame.extend_from_slice(ip.as_bytes());
                frame.extend_from_slice(&opts);
                frame
            }

            (IpAddr::V6(src), IpAddr::V6(dst)) => {
                let mut frame = eth_hdr(ETHER_TYPE_IPV6);
                let ip = Ipv6HdrRaw {
                    payload_len: (seg.len() as u16).to_be_bytes(),
                    next_hdr: u8::from(proto),
                    hop_limit: self.ttl,
                    src: src.octets(),
                    dst: dst.octets(),
                    ..Default::default()
                };
                frame.extend_from_slice(ip.as_bytes());
                frame
            }

            _ => panic!("mixed address families"),
        };

        frame.extend_from_slice(seg);
        frame.extend(std::iter::repeat_n(0u8, self.eth_pad));
        frame
    }

    /// Build an Ethernet frame carrying a plain UDP datagram.
    pub fn build_udp(&self) -> Vec<u8> {
        let hdr = UdpHdrRaw {
            src_port: self.src_port.to_be_bytes(),
            dst_port: self.dst_port.to_be_bytes(),
            length: ((UDP_HDR_SZ + self.payload.len()) as u16).to_be_bytes(),
            csum: [0; 2],
        };
        let mut dgram = hdr.as_bytes().to_vec();
        dgram.extend_from_slice(&self.payload);
        let csum = oracle::l4_csum(self.src, self.dst, Protocol::UDP, &dgram);
        dgram[6..8].copy_from_slice(&csum.udp_bytes());
        self.wrap_ip(Protocol::UDP, &dgram)
    }

    /// Offset of the TCP (or UDP) header in the built frame.
    pub fn l4_off(&self) -> usize {
        match self.src {
            IpAddr::V4(_) => {
                ETHER_HDR_SZ + IPV4_HDR_SZ + Self::padded(&self.ip_opts).len()
            }
            IpAddr::V6(_) => ETHER_HDR_SZ + IPV6_HDR_SZ,
        }
    }
}

fn eth_hdr(ether_type: u16) -> Vec<u8> {
    let eth = EtherHdrRaw {
        dst: GW_MAC,
        src: GUEST_MAC,
        ether_type: ether_type.to_be_bytes(),
    };
    eth.as_bytes().to_vec()
}

/// A gratuitous ARP request from the guest.
pub fn arp_frame() -> Vec<u8> {
    let mut frame = eth_hdr(ETHER_TYPE_ARP);
    // Ethernet, IPv4, hlen, plen, request
    frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01]);
    frame.extend_from_slice(&GUEST_MAC);
    frame.extend_from_slice(&CLIENT_IP4.octets());
    frame.extend_from_slice(&[0; 6]);
    frame.extend_from_slice(&CLIENT_IP4.octets());
    frame
}
