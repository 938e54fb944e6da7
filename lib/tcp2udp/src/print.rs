// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print engine state in human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both tcp2udpadm and integration tests.

use crate::api::StatsSnapshot;
use crate::engine::Disposition;
use crate::engine::headers::IpType;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a [`StatsSnapshot`].
pub fn print_stats(stats: &StatsSnapshot) -> std::io::Result<()> {
    print_stats_into(&mut std::io::stdout(), stats)
}

/// Print a [`StatsSnapshot`] into a given writer.
pub fn print_stats_into(
    writer: &mut impl Write,
    stats: &StatsSnapshot,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "DISPOSITION\tFRAMES")?;
    writeln!(t, "transcoded\t{}", stats.transcoded)?;
    writeln!(t, "pass (malformed)\t{}", stats.pass_malformed)?;
    writeln!(t, "pass (EtherType)\t{}", stats.pass_ether_type)?;
    writeln!(t, "pass (protocol)\t{}", stats.pass_protocol)?;
    writeln!(t, "pass (fragment)\t{}", stats.pass_fragment)?;
    writeln!(t, "pass (port disabled)\t{}", stats.pass_port_disabled)?;
    write_hr(&mut t)?;
    writeln!(t, "total\t{}", stats.total())?;
    t.flush()
}

/// Print the enabled ports.
pub fn print_ports(ports: impl IntoIterator<Item = u16>) -> std::io::Result<()> {
    print_ports_into(&mut std::io::stdout(), ports)
}

/// Print the enabled ports into a given writer.
pub fn print_ports_into(
    writer: &mut impl Write,
    ports: impl IntoIterator<Item = u16>,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "PORT\tSTATE")?;
    for port in ports {
        writeln!(t, "{port}\tENABLED")?;
    }
    t.flush()
}

/// Print one line per frame describing what the hook did with it.
pub fn print_dispositions_into<'a>(
    writer: &mut impl Write,
    disps: impl IntoIterator<Item = (usize, &'a Disposition)>,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "FRAME\tVERDICT\tIP\tPORTS\tUDP LEN\tOFFSET\tREASON")?;
    for (idx, disp) in disps {
        match disp {
            Disposition::Transcoded(info) => {
                let ip = match info.ip_type {
                    IpType::Ipv4 => "IPv4",
                    IpType::Ipv6 => "IPv6",
                };
                writeln!(
                    t,
                    "{idx}\t{}\t{ip}\t{}:{}\t{}\t{}\t",
                    disp.verdict(),
                    info.src_port,
                    info.dst_port,
                    info.udp_len,
                    info.pay_off,
                )?;
            }
            Disposition::PassThrough(reason) => {
                writeln!(t, "{idx}\t{}\t\t\t\t\t{reason}", disp.verdict())?;
            }
        }
    }
    t.flush()
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<40}", "-")
}
