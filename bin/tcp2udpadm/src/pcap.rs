// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Reading and writing legacy pcap files.

use super::AdmError;
use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use pcap_parser::pcap::parse_pcap_frame;
use pcap_parser::pcap::parse_pcap_frame_be;
use pcap_parser::pcap::parse_pcap_header;
use std::fs;
use std::path::Path;

const MAGIC_USEC: u32 = 0xa1b2c3d4;
const MAGIC_NSEC: u32 = 0xa1b23c4d;

/// The unit of a frame's sub-second timestamp.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Resolution {
    #[default]
    Micro,
    Nano,
}

impl Resolution {
    fn magic(self) -> u32 {
        match self {
            Self::Micro => MAGIC_USEC,
            Self::Nano => MAGIC_NSEC,
        }
    }
}

/// A single captured frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub ts_sec: u32,
    /// Sub-second part of the timestamp, in the capture's
    /// [`Resolution`].
    pub ts_frac: u32,
    /// The length of the frame on the wire, which may exceed the
    /// number of bytes captured.
    pub origlen: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn is_truncated(&self) -> bool {
        (self.data.len() as u64) < u64::from(self.origlen)
    }
}

#[derive(Clone, Debug)]
pub struct Capture {
    pub snaplen: u32,
    pub resolution: Resolution,
    pub frames: Vec<Frame>,
}

/// Parse an in-memory capture. Only Ethernet captures are accepted.
pub fn read(bytes: &[u8]) -> Result<Capture, AdmError> {
    let (mut rest, hdr) = parse_pcap_header(bytes)
        .map_err(|e| AdmError::Pcap(format!("bad header: {e:?}")))?;

    if hdr.network != Linktype::ETHERNET {
        return Err(AdmError::Linktype(hdr.network.0));
    }

    let be = hdr.is_bigendian();
    let mut frames = vec![];
    while !rest.is_empty() {
        let res = if be {
            parse_pcap_frame_be(rest)
        } else {
            parse_pcap_frame(rest)
        };

        let (next, block) = res.map_err(|e| {
            AdmError::Pcap(format!("bad frame {}: {e:?}", frames.len()))
        })?;

        frames.push(Frame {
            ts_sec: block.ts_sec,
            ts_frac: block.ts_usec,
            origlen: block.origlen,
            data: block.data.to_vec(),
        });
        rest = next;
    }

    let resolution = if hdr.is_nanosecond_precision() {
        Resolution::Nano
    } else {
        Resolution::Micro
    };

    Ok(Capture { snaplen: hdr.snaplen, resolution, frames })
}

/// Read a capture file from disk.
pub fn read_file(path: &Path) -> Result<Capture, AdmError> {
    let bytes = fs::read(path).map_err(|e| AdmError::io(path, e))?;
    read(&bytes)
}

/// Serialize a capture, little-endian, keeping its timestamp
/// resolution.
pub fn write(cap: &Capture) -> Result<Vec<u8>, AdmError> {
    let mut hdr = PcapHeader {
        magic_number: cap.resolution.magic(),
        version_major: 2,
        version_minor: 4,
        thiszone: 0,
        sigfigs: 0,
        snaplen: cap.snaplen,
        network: Linktype::ETHERNET,
    };

    let mut out = hdr
        .to_vec()
        .map_err(|e| AdmError::Pcap(format!("header: {e:?}")))?;

    for (idx, frame) in cap.frames.iter().enumerate() {
        let caplen = u32::try_from(frame.data.len()).map_err(|_| {
            AdmError::Pcap(format!("frame {idx} is too large"))
        })?;

        let mut block = LegacyPcapBlock {
            ts_sec: frame.ts_sec,
            ts_usec: frame.ts_frac,
            caplen,
            origlen: frame.origlen.max(caplen),
            data: &frame.data,
        };

        let bytes = block
            .to_vec()
            .map_err(|e| AdmError::Pcap(format!("frame {idx}: {e:?}")))?;
        out.extend_from_slice(&bytes);
    }

    Ok(out)
}

/// Write a capture file to disk.
pub fn write_file(path: &Path, cap: &Capture) -> Result<(), AdmError> {
    let bytes = write(cap)?;
    fs::write(path, bytes).map_err(|e| AdmError::io(path, e))
}
