// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Integration tests.
//!
//! Frames are built from scratch, run through the hook, and the result
//! is checked against checksums recomputed in full and against
//! smoltcp's view of the same bytes.

use common::oracle;
use common::*;
use itertools::iproduct;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tcp2udp::engine::packet::ParseError;
use tcp2udp::engine::packet::ReadErr;
use tcp2udp::engine::ip4::IPV4_CSUM_OFF;
use tcp2udp::engine::ip4::IPV4_PROTO_OFF;
use tcp2udp::engine::recv::decode_frame;
use tcp2udp::engine::tcp::TCP_CSUM_OFF;
use tcp2udp::engine::tcp::TCP_SEQ_OFF;
use tcp2udp::engine::tcp::TcpHdrError;
use tcp2udp::engine::transcode::TRANSCODED_HDR_SZ;
use tcp2udp_test_utils as common;

// Run `frame` through a hook with `port` enabled and verify everything
// a transcoded frame must satisfy. Returns the transcoded frame.
fn transcode_and_verify(spec: &FrameSpec, port: u16) -> Vec<u8> {
    let orig = spec.build();
    assert!(oracle::smoltcp_verify_tcp(&orig), "bad input frame");

    let ports = ports_map(&[port]);
    let xcoder = Transcoder::new(&ports);
    let mut frame = orig.clone();
    let disp = xcoder.process_detailed(&mut frame);

    let info = match disp {
        Disposition::Transcoded(info) => info,
        disp => panic!("expected transcode: {disp:?}"),
    };

    let lay = oracle::layout(&frame);
    let tcp_hdr_len = spec.tcp_hdr_len();
    assert_eq!(lay.proto, Protocol::UDP);
    assert_eq!(info.tcp_off, spec.l4_off());
    assert_eq!(info.tcp_hdr_len, tcp_hdr_len);
    assert_eq!(usize::from(info.udp_len), lay.l4_len);
    assert_eq!(usize::from(info.pay_off), tcp_hdr_len - UDP_HDR_SZ);

    // Only the IP protocol and checksum, and the seq/ack bytes under
    // the new UDP length, checksum and offset may change.
    for (i, (a, b)) in orig.iter().zip(frame.iter()).enumerate() {
        let in_ip = if lay.src.is_ipv4() {
            let off = i.wrapping_sub(lay.l3_off);
            off == IPV4_PROTO_OFF
                || off == IPV4_CSUM_OFF
                || off == IPV4_CSUM_OFF + 1
        } else {
            i >= lay.l3_off && i < lay.l4_off
        };
        let in_hdr = i >= lay.l4_off + TCP_SEQ_OFF
            && i < lay.l4_off + TRANSCODED_HDR_SZ;
        if a != b {
            assert!(in_ip || in_hdr, "byte {i} changed: {a:#x} -> {b:#x}");
        }
    }

    let dgram = lay.l4(&frame);
    assert_eq!(&dgram[0..2], &spec.src_port.to_be_bytes());
    assert_eq!(&dgram[2..4], &spec.dst_port.to_be_bytes());
    assert_eq!(&dgram[4..6], &info.udp_len.to_be_bytes());
    assert_eq!(&dgram[6..8], &oracle::udp_csum(&frame));
    assert_eq!(&dgram[8..10], &info.pay_off.to_be_bytes());
    // The old TCP checksum is left behind as covered data.
    assert_eq!(
        &dgram[TCP_CSUM_OFF..TCP_CSUM_OFF + 2],
        &lay.l4(&orig)[TCP_CSUM_OFF..TCP_CSUM_OFF + 2]
    );
    if lay.src.is_ipv4() {
        let hdr = lay.l3_hdr(&frame);
        assert_eq!(
            &hdr[IPV4_CSUM_OFF..IPV4_CSUM_OFF + 2],
            &oracle::ipv4_hdr_csum(&frame)
        );
    }
    assert!(oracle::smoltcp_verify_udp(&frame));

    let decoded = decode_frame(&frame).unwrap();
    assert_eq!(decoded.payload, &spec.payload[..]);
    assert_eq!(decoded.pay_off, info.pay_off);

    frame
}

// IPv4/TCP to an enabled port with 12 bytes of TCP options, a total
// length of 100, and a 20 byte IP header.
#[test]
fn ipv4_doff_8() {
    let spec = FrameSpec::v4().tcp_opts(&TS_OPTS).payload(&[0xAB; 48]);
    let orig = spec.build();
    assert_eq!(&orig[16..18], &100u16.to_be_bytes());

    let frame = transcode_and_verify(&spec, 8443);
    let ip_off = ETHER_HDR_SZ;
    let udp_off = ip_off + IPV4_HDR_SZ;
    assert_eq!(frame[ip_off + IPV4_PROTO_OFF], 17);
    assert_eq!(&frame[udp_off + 4..udp_off + 6], &80u16.to_be_bytes());
    assert_eq!(&frame[udp_off + 8..udp_off + 10], &24u16.to_be_bytes());
}

#[test]
fn ipv4_disabled_port() {
    let spec = FrameSpec::v4().tcp_opts(&TS_OPTS).dst_port(8080);
    let orig = spec.build();
    let ports = ports_map(&[8443]);
    let xcoder = Transcoder::new(&ports);

    let mut frame = orig.clone();
    assert_eq!(xcoder.process(&mut frame), Verdict::Pass);
    assert_eq!(frame, orig);
    assert_eq!(xcoder.stats().pass_port_disabled, 1);
}

#[test]
fn zero_flag_is_disabled() {
    let spec = FrameSpec::v4();
    let mut ports = ports_map(&[]);
    ports.insert(spec.dst_port, 0);
    let mut frame = spec.build();
    let orig = frame.clone();
    assert_eq!(Transcoder::new(&ports).process(&mut frame), Verdict::Pass);
    assert_eq!(frame, orig);
}

#[test]
fn doff_past_end_of_buffer() {
    let spec = FrameSpec::v4();
    let mut frame = spec.build();
    // Claim 60 bytes of TCP header; the frame has 20 plus an 18 byte
    // payload after the IP header.
    frame[spec.l4_off() + 12] = 0xF0;
    let orig = frame.clone();

    let ports = ports_map(&[spec.dst_port]);
    let xcoder = Transcoder::new(&ports);
    let disp = xcoder.process_detailed(&mut frame);
    assert_eq!(
        disp,
        Disposition::PassThrough(PassReason::Malformed(ParseError::Tcp(
            TcpHdrError::TruncatedOptions {
                error: ReadErr::NotEnoughBytes { available: 38, needed: 60 },
            }
        )))
    );
    assert_eq!(disp.verdict(), Verdict::Pass);
    assert_eq!(frame, orig);
}

#[test]
fn ipv6_with_options() {
    let spec = FrameSpec::v6().tcp_opts(&TS_OPTS).payload(b"hello over v6");
    let frame = transcode_and_verify(&spec, 8443);
    assert_eq!(frame[ETHER_HDR_SZ + 6], 17);
}

#[test]
fn ipv4_with_ip_options() {
    // Router alert, then padding.
    let spec = FrameSpec::v4().ip_opts(&[0x94, 0x04, 0x00, 0x00, 0x01]);
    assert_eq!(spec.l4_off(), ETHER_HDR_SZ + IPV4_HDR_SZ + 8);
    transcode_and_verify(&spec, 8443);
}

#[test]
fn ethernet_padding_is_ignored() {
    // A runt segment padded out to the 60 byte Ethernet minimum.
    let spec = FrameSpec::v4().payload(b"").eth_pad(6);
    let frame = transcode_and_verify(&spec, 8443);
    assert_eq!(&frame[frame.len() - 6..], &[0; 6]);
}

#[test]
fn sweep_options_and_payloads() {
    let families = [FrameSpec::v4(), FrameSpec::v6()];
    let opt_lens = (0..=40).step_by(4);
    let pay_lens = [0, 1, 2, 3, 17, 512, 1379];
    let pads = [0, 7];

    for (base, opt_len, pay_len, pad) in
        iproduct!(families.iter(), opt_lens, pay_lens, pads)
    {
        let opts = vec![0x01; opt_len];
        let payload: Vec<u8> = (0..pay_len).map(|i| (i * 7) as u8).collect();
        let spec = base
            .clone()
            .tcp_opts(&opts)
            .payload(&payload)
            .eth_pad(pad);
        transcode_and_verify(&spec, spec.dst_port);
    }
}

// The sequence and acknowledgement numbers are overwritten, so their
// values must not matter to the result.
#[test]
fn sweep_seq_and_ack() {
    let values = [0, 1, 0xFFFF, 0x0001_0000, 0x8000_0000, 0xFFFF_FFFE, u32::MAX];

    for (base, seq, ack) in
        iproduct!([FrameSpec::v4(), FrameSpec::v6()].iter(), values, values)
    {
        let mut spec = base.clone().tcp_opts(&TS_OPTS);
        spec.seq = seq;
        spec.ack = ack;
        transcode_and_verify(&spec, spec.dst_port);
    }
}

// A transcoded checksum that sums to zero must go out as all ones,
// since a zero UDP checksum means none was computed. The sum depends
// only on seq, the top of ack, the UDP length and the offset, and
// this seq lands on zero with the default ack and 12 option bytes.
#[test]
fn udp_csum_zero_is_sent_as_all_ones() {
    let mut spec = FrameSpec::v4().tcp_opts(&TS_OPTS);
    spec.seq = 0xD360;
    let frame = transcode_and_verify(&spec, spec.dst_port);

    let lay = oracle::layout(&frame);
    let dgram = lay.l4(&frame);
    assert_eq!(&dgram[6..8], &[0xFF, 0xFF]);
    assert_eq!(&dgram[6..8], &oracle::udp_csum(&frame));
    assert!(oracle::smoltcp_verify_udp(&frame));
}

#[test]
fn sweep_ports() {
    for port in [0, 1, 80, 443, 32768, 65534, u16::MAX] {
        let mut spec = FrameSpec::v4().dst_port(port);
        spec.src_port = port.wrapping_add(1);
        transcode_and_verify(&spec, port);
    }
}

#[test]
fn non_tcp_passes_untouched() {
    let ports = ports_map(&[8443]);
    let xcoder = Transcoder::new(&ports);

    let mut udp = FrameSpec::v4().build_udp();
    let orig = udp.clone();
    assert_eq!(
        xcoder.process_detailed(&mut udp),
        Disposition::PassThrough(PassReason::Protocol(Protocol::UDP))
    );
    assert_eq!(udp, orig);

    let mut arp = arp_frame();
    let orig = arp.clone();
    assert_eq!(xcoder.process(&mut arp), Verdict::Pass);
    assert_eq!(arp, orig);

    let snap = xcoder.stats();
    assert_eq!(snap.pass_protocol, 1);
    assert_eq!(snap.pass_ether_type, 1);
    assert_eq!(snap.transcoded, 0);
}

#[test]
fn transcoded_frame_is_not_transcoded_again() {
    let spec = FrameSpec::v4().tcp_opts(&TS_OPTS);
    let mut frame = transcode_and_verify(&spec, spec.dst_port);
    let once = frame.clone();

    let ports = ports_map(&[spec.dst_port]);
    let disp = Transcoder::new(&ports).process_detailed(&mut frame);
    assert_eq!(
        disp,
        Disposition::PassThrough(PassReason::Protocol(Protocol::UDP))
    );
    assert_eq!(frame, once);
}

#[test]
fn every_truncation_passes_untouched() {
    let spec = FrameSpec::v6().tcp_opts(&TS_OPTS);
    let full = spec.build();
    let ports = ports_map(&[spec.dst_port]);
    let xcoder = Transcoder::new(&ports);

    // Cutting into the headers always passes. Cutting only into the
    // payload still transcodes: nothing past the TCP header is read.
    let hdrs_end = spec.l4_off() + spec.tcp_hdr_len();
    for len in 0..full.len() {
        let mut frame = full[..len].to_vec();
        let verdict = xcoder.process(&mut frame);
        if len < hdrs_end {
            assert_eq!(verdict, Verdict::Pass, "len {len}");
            assert_eq!(frame, full[..len]);
        } else {
            assert_eq!(verdict, Verdict::Continue, "len {len}");
        }
    }
}

#[test]
fn concurrent_readers_and_control_plane() {
    let ports = Arc::new(PortArray::new());
    let xcoder = Arc::new(Transcoder::new(Arc::clone(&ports)));
    let spec = FrameSpec::v4().tcp_opts(&TS_OPTS);
    let orig = spec.build();
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..2000 {
                ports.enable(spec.dst_port);
                ports.disable(spec.dst_port);
            }
            done.store(true, Ordering::Relaxed);
        });

        for _ in 0..4 {
            s.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let mut frame = orig.clone();
                    match xcoder.process(&mut frame) {
                        Verdict::Pass => assert_eq!(frame, orig),
                        Verdict::Continue => {
                            assert!(oracle::smoltcp_verify_udp(&frame));
                        }
                    }
                }
            });
        }
    });

    let snap = xcoder.stats();
    assert_eq!(snap.total(), snap.transcoded + snap.pass_port_disabled);
    assert_eq!(ports.enabled_ports().count(), 0);
}

#[test]
fn pcap_replay() {
    let frames = [
        FrameSpec::v4().tcp_opts(&TS_OPTS).build(),
        arp_frame(),
        FrameSpec::v6().build(),
        FrameSpec::v4().dst_port(22).build(),
        FrameSpec::v4().build_udp(),
    ];

    let mut cap = pcap::PcapBuilder::new();
    for frame in &frames {
        cap.add_pkt(frame);
    }

    let ports = ports_map(&[8443]);
    let xcoder = Transcoder::new(&ports);
    let verdicts = pcap::frames(cap.bytes())
        .into_iter()
        .map(|mut frame| xcoder.process(&mut frame))
        .collect::<Vec<_>>();

    use Verdict::*;
    assert_eq!(verdicts, vec![Continue, Pass, Continue, Pass, Pass]);
    assert_eq!(xcoder.stats().transcoded, 2);
}
