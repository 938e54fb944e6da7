// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Per-disposition frame counters.
//!
//! Counters are updated from any number of datapath threads at once,
//! so they are plain relaxed atomics. A [`StatsSnapshot`] taken while
//! frames are in flight is not a consistent cut across counters.

use super::hook::Disposition;
use super::hook::PassReason;
use crate::api::StatsSnapshot;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;

#[derive(Debug, Default)]
pub struct TranscodeStats {
    transcoded: AtomicU64,
    pass_malformed: AtomicU64,
    pass_ether_type: AtomicU64,
    pass_protocol: AtomicU64,
    pass_fragment: AtomicU64,
    pass_port_disabled: AtomicU64,
}

impl TranscodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, disp: &Disposition) {
        let ctr = match disp {
            Disposition::Transcoded(_) => &self.transcoded,
            Disposition::PassThrough(reason) => self.pass_counter(reason),
        };
        ctr.fetch_add(1, Ordering::Relaxed);
    }

    fn pass_counter(&self, reason: &PassReason) -> &AtomicU64 {
        match reason {
            PassReason::EtherType(_) => &self.pass_ether_type,
            PassReason::Protocol(_) => &self.pass_protocol,
            PassReason::Fragment { .. } => &self.pass_fragment,
            PassReason::PortDisabled { .. } => &self.pass_port_disabled,
            PassReason::Malformed(_)
            | PassReason::BadUlpLen { .. }
            | PassReason::Write(_) => &self.pass_malformed,
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transcoded: self.transcoded.load(Ordering::Relaxed),
            pass_malformed: self.pass_malformed.load(Ordering::Relaxed),
            pass_ether_type: self.pass_ether_type.load(Ordering::Relaxed),
            pass_protocol: self.pass_protocol.load(Ordering::Relaxed),
            pass_fragment: self.pass_fragment.load(Ordering::Relaxed),
            pass_port_disabled: self
                .pass_port_disabled
                .load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for ctr in [
            &self.transcoded,
            &self.pass_malformed,
            &self.pass_ether_type,
            &self.pass_protocol,
            &self.pass_fragment,
            &self.pass_port_disabled,
        ] {
            ctr.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Protocol;
    use crate::engine::packet::ParseError;
    use crate::engine::packet::ReadErr;

    #[test]
    fn counts_by_reason() {
        let stats = TranscodeStats::new();
        let reasons = [
            PassReason::EtherType(0x0806),
            PassReason::Protocol(Protocol::UDP),
            PassReason::Protocol(Protocol::ICMP),
            PassReason::PortDisabled { port: 22 },
            PassReason::Fragment { offset: 185, more: false },
            PassReason::Malformed(ParseError::BadRead(ReadErr::EndOfPacket)),
            PassReason::BadUlpLen { ulp_len: 10, tcp_hdr_len: 20 },
        ];
        for reason in reasons {
            stats.record(&Disposition::PassThrough(reason));
        }

        let snap = stats.snapshot();
        assert_eq!(snap.transcoded, 0);
        assert_eq!(snap.pass_ether_type, 1);
        assert_eq!(snap.pass_protocol, 2);
        assert_eq!(snap.pass_port_disabled, 1);
        assert_eq!(snap.pass_fragment, 1);
        assert_eq!(snap.pass_malformed, 2);
        assert_eq!(snap.total(), 7);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
