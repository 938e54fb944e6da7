// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use criterion::measurement::Measurement;
use criterion::measurement::WallTime;
use itertools::iproduct;
use tcp2udp_test_utils::FrameSpec;
use tcp2udp_test_utils::TS_OPTS;
use tcp2udp_test_utils::arp_frame;

/// Additional labelling information for [`Measurement`]s for
/// pretty-printing and grouping.
pub trait MeasurementInfo: Measurement {
    fn label() -> &'static str;
}

impl MeasurementInfo for WallTime {
    fn label() -> &'static str {
        "wallclock"
    }
}

/// The port every benchmark frame is sent to, and the only one the
/// benchmark port table enables.
pub const BENCH_PORT: u16 = 8443;

/// A family of related frames to time the hook against.
pub trait BenchPacket {
    /// Label the family in a human-friendly manner.
    fn packet_label(&self) -> String;

    /// Return a list of discrete scenarios.
    fn test_cases(&self) -> Vec<Box<dyn BenchPacketInstance>>;
}

/// An individual frame to time.
pub trait BenchPacketInstance {
    fn instance_name(&self) -> String;

    /// Generate a single frame.
    fn generate(&self) -> Vec<u8>;
}

#[derive(Clone, Copy, Debug)]
pub enum IpVersion {
    V4,
    V6,
}

/// Frames the hook rewrites, across IP versions and segment sizes.
pub struct Transcoded;

#[derive(Clone, Debug)]
pub struct TranscodedInstance {
    ip: IpVersion,
    tcp_opts: bool,
    payload_len: usize,
}

impl BenchPacket for Transcoded {
    fn packet_label(&self) -> String {
        "Transcoded".into()
    }

    fn test_cases(&self) -> Vec<Box<dyn BenchPacketInstance>> {
        iproduct!([IpVersion::V4, IpVersion::V6], [false, true], [0, 64, 1400])
            .map(|(ip, tcp_opts, payload_len)| {
                Box::new(TranscodedInstance { ip, tcp_opts, payload_len })
                    as Box<dyn BenchPacketInstance>
            })
            .collect()
    }
}

impl BenchPacketInstance for TranscodedInstance {
    fn instance_name(&self) -> String {
        let opts = if self.tcp_opts { "opts" } else { "no-opts" };
        format!("{:?}-{opts}-{}B", self.ip, self.payload_len)
    }

    fn generate(&self) -> Vec<u8> {
        let spec = match self.ip {
            IpVersion::V4 => FrameSpec::v4(),
            IpVersion::V6 => FrameSpec::v6(),
        };
        let opts: &[u8] = if self.tcp_opts { &TS_OPTS } else { &[] };
        let payload = vec![0xA5; self.payload_len];
        spec.dst_port(BENCH_PORT).tcp_opts(opts).payload(&payload).build()
    }
}

/// Frames the hook leaves alone, each bailing at a different layer.
pub struct Passed;

#[derive(Clone, Copy, Debug)]
pub enum PassedInstance {
    Arp,
    Udp,
    PortDisabled,
}

impl BenchPacket for Passed {
    fn packet_label(&self) -> String {
        "Passed".into()
    }

    fn test_cases(&self) -> Vec<Box<dyn BenchPacketInstance>> {
        [PassedInstance::Arp, PassedInstance::Udp, PassedInstance::PortDisabled]
            .into_iter()
            .map(|v| Box::new(v) as Box<dyn BenchPacketInstance>)
            .collect()
    }
}

impl BenchPacketInstance for PassedInstance {
    fn instance_name(&self) -> String {
        format!("{self:?}")
    }

    fn generate(&self) -> Vec<u8> {
        match self {
            Self::Arp => arp_frame(),
            Self::Udp => FrameSpec::v4().dst_port(BENCH_PORT).build_udp(),
            Self::PortDisabled => FrameSpec::v4().dst_port(22).build(),
        }
    }
}
