// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The per-frame entry point.
//!
//! A frame moves through these states:
//!
//! ```text
//! Start -> EthernetParsed -> { Ipv4Parsed | Ipv6Parsed } -> TcpDetected
//!                                                              |
//!                                            Transcoded <------+------> PassThrough
//! ```
//!
//! A parse failure, an unsupported EtherType or protocol, an IPv4
//! fragment, or a refusal by the transcoder ends in `PassThrough`
//! with the frame untouched. Only `Transcoded` frames have been modified. Both verdicts
//! let the frame continue on its way.

use super::ether::EtherMeta;
use super::ether::EtherType;
use super::headers::IpMeta;
use super::ip4::Ipv4Meta;
use super::ip6::Ipv6Meta;
use super::packet::PacketRead;
use super::packet::PacketReader;
use super::packet::ParseError;
use super::packet::WriteError;
use super::port_table::PortTable;
use super::stat::TranscodeStats;
use super::transcode::TranscodeInfo;
use super::transcode::transcode;
use crate::api::Protocol;
use crate::api::StatsSnapshot;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// Traffic-control action: stop classifying and let the frame go.
pub const TC_ACT_OK: i32 = 0;

/// Traffic-control action: continue with the next action.
pub const TC_ACT_PIPE: i32 = 3;

/// The datapath's answer for a frame.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Verdict {
    /// The frame was not modified.
    Pass,
    /// The frame was transcoded; let later actions see the UDP form.
    Continue,
}

impl Verdict {
    pub fn tc_action(self) -> i32 {
        match self {
            Self::Pass => TC_ACT_OK,
            Self::Continue => TC_ACT_PIPE,
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Continue => "CONTINUE",
        };
        write!(f, "{s}")
    }
}

/// Why a frame was passed through untouched.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PassReason {
    /// A header was truncated or invalid.
    Malformed(ParseError),
    /// The frame carries neither IPv4 nor IPv6.
    EtherType(u16),
    /// The IP packet does not carry TCP.
    Protocol(Protocol),
    /// The TCP segment is split across IPv4 fragments.
    Fragment { offset: u16, more: bool },
    /// The TCP destination port is not enabled.
    PortDisabled { port: u16 },
    /// The IP header declares fewer bytes than the TCP header has.
    BadUlpLen { ulp_len: u16, tcp_hdr_len: usize },
    /// The rewritten headers could not be placed in the frame.
    Write(WriteError),
}

impl From<ParseError> for PassReason {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedEtherType(et) => Self::EtherType(et),
            ParseError::UnsupportedProtocol(proto) => Self::Protocol(proto),
            ParseError::Fragment { offset, more } => {
                Self::Fragment { offset, more }
            }
            err => Self::Malformed(err),
        }
    }
}

impl Display for PassReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed: {err}"),
            Self::EtherType(et) => write!(f, "EtherType 0x{et:04X}"),
            Self::Protocol(proto) => write!(f, "protocol {proto}"),
            Self::Fragment { offset, more } => {
                write!(f, "IPv4 fragment (offset {offset}, more {more})")
            }
            Self::PortDisabled { port } => write!(f, "port {port} disabled"),
            Self::BadUlpLen { ulp_len, tcp_hdr_len } => write!(
                f,
                "IP payload length {ulp_len} < TCP header length {tcp_hdr_len}"
            ),
            Self::Write(err) => write!(f, "write: {err}"),
        }
    }
}

/// The full outcome of running a frame through the hook.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    Transcoded(TranscodeInfo),
    PassThrough(PassReason),
}

impl Disposition {
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Transcoded(_) => Verdict::Continue,
            Self::PassThrough(_) => Verdict::Pass,
        }
    }
}

/// Parse the frame down to its TCP header.
///
/// Returns the IP header and the offset of the TCP header.
pub fn parse_to_tcp(pkt: &[u8]) -> Result<(IpMeta, usize), ParseError> {
    let mut rdr = PacketReader::new(pkt);
    let ether = EtherMeta::parse(&mut rdr)?;

    let ip = match ether.ether_type {
        EtherType::Ipv4 => IpMeta::Ip4(Ipv4Meta::parse(&mut rdr)?),
        EtherType::Ipv6 => IpMeta::Ip6(Ipv6Meta::parse(&mut rdr)?),
        et => return Err(ParseError::UnsupportedEtherType(u16::from(et))),
    };

    if ip.proto() != Protocol::TCP {
        return Err(ParseError::UnsupportedProtocol(ip.proto()));
    }

    if let IpMeta::Ip4(ip4) = &ip {
        if ip4.is_fragment() {
            return Err(ParseError::Fragment {
                offset: ip4.frag_off,
                more: ip4.more_frags,
            });
        }
    }

    Ok((ip, rdr.pos()))
}

/// Run one frame through the hook.
pub fn process<P: PortTable + ?Sized>(pkt: &mut [u8], ports: &P) -> Disposition {
    let (ip, tcp_off) = match parse_to_tcp(pkt) {
        Ok(parsed) => parsed,
        Err(err) => return Disposition::PassThrough(PassReason::from(err)),
    };

    match transcode(pkt, &ip, tcp_off, ports) {
        Ok(info) => Disposition::Transcoded(info),
        Err(reason) => Disposition::PassThrough(reason),
    }
}

/// A port table paired with the counters of every frame it has seen.
///
/// A `Transcoder` is shared by reference between all the threads
/// processing frames. The port table is consulted without locking; how
/// it is updated is up to the table.
#[derive(Debug)]
pub struct Transcoder<P> {
    ports: P,
    stats: TranscodeStats,
}

impl<P: PortTable> Transcoder<P> {
    pub fn new(ports: P) -> Self {
        Self { ports, stats: TranscodeStats::new() }
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    /// Process `pkt`, possibly rewriting it, and return its verdict.
    pub fn process(&self, pkt: &mut [u8]) -> Verdict {
        self.process_detailed(pkt).verdict()
    }

    /// Process `pkt` and return the full disposition.
    pub fn process_detailed(&self, pkt: &mut [u8]) -> Disposition {
        let disp = process(pkt, &self.ports);
        self.stats.record(&disp);
        disp
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::ether::EtherHdrRaw;
    use crate::engine::ether::ETHER_TYPE_ARP;
    use crate::engine::ether::ETHER_TYPE_IPV4;
    use crate::engine::ip4::Ipv4HdrRaw;
    use crate::engine::packet::ReadErr;
    use crate::engine::tcp::TcpHdrError;
    use crate::engine::tcp::TcpHdrRaw;
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;
    use zerocopy::IntoBytes;

    fn frame(ether_type: u16, proto: Protocol, tcp: &TcpHdrRaw) -> Vec<u8> {
        let eth = EtherHdrRaw {
            dst: [0xA8, 0x40, 0x25, 0xFF, 0x00, 0x01],
            src: [0xA8, 0x40, 0x25, 0xFF, 0x00, 0x02],
            ether_type: ether_type.to_be_bytes(),
        };
        let ip = Ipv4HdrRaw {
            total_len: 40u16.to_be_bytes(),
            proto: u8::from(proto),
            ..Default::default()
        };
        let mut bytes = eth.as_bytes().to_vec();
        bytes.extend_from_slice(ip.as_bytes());
        bytes.extend_from_slice(tcp.as_bytes());
        bytes
    }

    fn tcp(dst: u16, doff: u8) -> TcpHdrRaw {
        TcpHdrRaw {
            src_port: 1234u16.to_be_bytes(),
            dst_port: dst.to_be_bytes(),
            offset: doff << 4,
            ..Default::default()
        }
    }

    #[test]
    fn verdict_codes() {
        assert_eq!(Verdict::Pass.tc_action(), 0);
        assert_eq!(Verdict::Continue.tc_action(), 3);
    }

    #[test]
    fn not_ip() {
        let ports: BTreeMap<u16, u16> = [(80, 1)].into_iter().collect();
        let mut pkt = frame(ETHER_TYPE_ARP, Protocol::TCP, &tcp(80, 5));
        let orig = pkt.clone();
        assert_eq!(
            process(&mut pkt, &ports),
            Disposition::PassThrough(PassReason::EtherType(ETHER_TYPE_ARP))
        );
        assert_eq!(pkt, orig);
    }

    #[test]
    fn not_tcp() {
        let ports: BTreeMap<u16, u16> = [(80, 1)].into_iter().collect();
        let mut pkt = frame(ETHER_TYPE_IPV4, Protocol::UDP, &tcp(80, 5));
        let orig = pkt.clone();
        assert_eq!(
            process(&mut pkt, &ports),
            Disposition::PassThrough(PassReason::Protocol(Protocol::UDP))
        );
        assert_eq!(pkt, orig);
    }

    #[test]
    fn ipv4_fragments_pass() {
        let ports: BTreeMap<u16, u16> = [(80, 1)].into_iter().collect();
        let xcoder = Transcoder::new(&ports);
        // Byte offset of the IPv4 flags and fragment offset.
        let frag = 14 + 6;

        for (bits, offset, more) in
            [([0x00, 0xB9], 0xB9, false), ([0x20, 0x00], 0, true)]
        {
            let mut pkt = frame(ETHER_TYPE_IPV4, Protocol::TCP, &tcp(80, 5));
            pkt[frag..frag + 2].copy_from_slice(&bits);
            let orig = pkt.clone();
            assert_eq!(
                xcoder.process_detailed(&mut pkt),
                Disposition::PassThrough(PassReason::Fragment { offset, more })
            );
            assert_eq!(pkt, orig);
        }
        assert_eq!(xcoder.stats().pass_fragment, 2);

        // Don't Fragment on its own is an ordinary packet.
        let mut pkt = frame(ETHER_TYPE_IPV4, Protocol::TCP, &tcp(80, 5));
        assert_eq!(xcoder.process(&mut pkt), Verdict::Continue);
    }

    #[test]
    fn doff_past_end_of_frame() {
        let ports: BTreeMap<u16, u16> = [(80, 1)].into_iter().collect();
        let xcoder = Transcoder::new(ports);
        let mut pkt = frame(ETHER_TYPE_IPV4, Protocol::TCP, &tcp(80, 15));
        let orig = pkt.clone();

        assert_eq!(
            xcoder.process_detailed(&mut pkt),
            Disposition::PassThrough(PassReason::Malformed(ParseError::Tcp(
                TcpHdrError::TruncatedOptions {
                    error: ReadErr::NotEnoughBytes { available: 20, needed: 60 }
                }
            )))
        );
        assert_eq!(pkt, orig);
        assert_eq!(xcoder.stats().pass_malformed, 1);
    }

    #[test]
    fn empty_and_runt_frames() {
        let ports = BTreeMap::<u16, u16>::new();
        let xcoder = Transcoder::new(&ports);
        for len in [0, 1, 13, 14, 20, 33] {
            let mut pkt = vec![0u8; len];
            assert_eq!(xcoder.process(&mut pkt), Verdict::Pass);
        }
        assert_eq!(xcoder.stats().passed(), 6);
    }
}
