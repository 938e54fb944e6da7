// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use std::io;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use slog::Drain;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;
use tabwriter::TabWriter;

use tcp2udp::api::API_VERSION;
use tcp2udp::api::Config;
use tcp2udp::engine::Transcoder;
use tcp2udp::engine::recv::decode_frame;
use tcp2udp::print::print_dispositions_into;
use tcp2udp::print::print_ports;
use tcp2udp::print::print_stats;
use tcp2udpadm::MAJOR_VERSION;
use tcp2udpadm::pcap;

/// Rewrite TCP segments as UDP datagrams, offline.
#[derive(Debug, Parser)]
#[command(version=tcp2udp_pkg_version())]
enum Command {
    /// Replay an Ethernet capture through the transcoder and write
    /// the resulting frames.
    Transcode {
        /// A TOML file listing the ports to transcode.
        #[arg(short, long, conflicts_with = "port")]
        config: Option<PathBuf>,

        /// A destination port to transcode. May be repeated; 0 picks a
        /// random ephemeral port.
        #[arg(short, long)]
        port: Vec<u16>,

        /// Print what happened to each frame.
        #[arg(short, long)]
        verbose: bool,

        /// Print the final counters as JSON.
        #[arg(long)]
        json: bool,

        input: PathBuf,
        output: PathBuf,
    },

    /// Recover the application payload of each transcoded frame in a
    /// capture.
    Decode { input: PathBuf },

    /// Resolve a port configuration and print the enabled ports.
    ShowConfig { config: PathBuf },

    /// Print the API version.
    Version,
}

fn tcp2udp_pkg_version() -> String {
    format!("{MAJOR_VERSION}.{API_VERSION}.{}", env!("CARGO_PKG_VERSION"))
}

fn init_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("component" => "tcp2udpadm"))
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    let log = init_logger();

    match cmd {
        Command::Transcode { config, port, verbose, json, input, output } => {
            let cfg = match config {
                Some(path) => tcp2udpadm::load_config(&path)?,
                None if port.is_empty() => {
                    bail!("either --config or at least one --port is required")
                }
                None => Config { ports: port },
            };

            let (ports, resolved) = tcp2udpadm::port_table(&cfg)?;
            info!(log, "port table ready"; "ports" => ?resolved);

            let mut cap = pcap::read_file(&input)?;
            let truncated =
                cap.frames.iter().filter(|f| f.is_truncated()).count();
            if truncated > 0 {
                warn!(log, "capture holds truncated frames";
                    "count" => truncated);
            }

            let xcoder = Transcoder::new(ports);
            let disps = tcp2udpadm::replay(&xcoder, &mut cap.frames);
            for (idx, disp) in disps.iter().enumerate() {
                debug!(log, "frame processed";
                    "frame" => idx, "verdict" => %disp.verdict());
            }

            pcap::write_file(&output, &cap)?;
            info!(log, "wrote capture";
                "path" => %output.display(), "frames" => cap.frames.len());

            if verbose {
                print_dispositions_into(
                    &mut io::stdout(),
                    disps.iter().enumerate(),
                )?;
                println!();
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&xcoder.stats())?);
            } else {
                print_stats(&xcoder.stats())?;
            }
        }

        Command::Decode { input } => {
            let cap = pcap::read_file(&input)?;
            let mut t = TabWriter::new(io::stdout());
            writeln!(t, "FRAME\tPORTS\tOFFSET\tPAYLOAD\tERROR")?;
            for (idx, frame) in cap.frames.iter().enumerate() {
                match decode_frame(&frame.data) {
                    Ok(dec) => writeln!(
                        t,
                        "{idx}\t{}:{}\t{}\t{}\t",
                        dec.udp.src,
                        dec.udp.dst,
                        dec.pay_off,
                        dec.payload.len(),
                    )?,
                    Err(e) => {
                        debug!(log, "frame not decoded";
                            "frame" => idx, "error" => %e);
                        writeln!(t, "{idx}\t\t\t\t{e}")?;
                    }
                }
            }
            t.flush()?;
        }

        Command::ShowConfig { config } => {
            let cfg = tcp2udpadm::load_config(&config)?;
            let (ports, _) = tcp2udpadm::port_table(&cfg)
                .with_context(|| format!("resolving {}", config.display()))?;
            print_ports(ports.enabled_ports())?;
        }

        Command::Version => {
            println!("tcp2udp {}", tcp2udp_pkg_version());
            println!("API version: {API_VERSION}");
        }
    }

    Ok(())
}
