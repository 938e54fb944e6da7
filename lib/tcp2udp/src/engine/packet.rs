// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types for reading network packets.
//!
//! A [`PacketReader`] is a cursor over the bytes of a single frame.
//! Every header parser pulls its bytes through [`PacketRead`], which
//! checks the request against the end of the frame on every call.
//! There is no other way for a parser to reach the packet bytes.

use super::ether::EtherHdrError;
use super::ip4::Ipv4HdrError;
use super::ip6::Ipv6HdrError;
use super::tcp::TcpHdrError;
use super::udp::UdpHdrError;
use crate::api::Protocol;
use core::fmt;
use core::fmt::Display;
use core::result;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadErr {
    /// The bytes could not be viewed as the requested header type.
    BadLayout,
    /// The read started at the end of the packet.
    EndOfPacket,
    /// The read starts inside the packet but runs off its end.
    NotEnoughBytes { available: usize, needed: usize },
}

impl Display for ReadErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadLayout => write!(f, "bad layout"),
            Self::EndOfPacket => write!(f, "end of packet"),
            Self::NotEnoughBytes { available, needed } => {
                write!(f, "not enough bytes: {available} < {needed}")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteError {
    BadLayout,
    NotEnoughBytes { available: usize, needed: usize },
}

impl Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadLayout => write!(f, "bad layout"),
            Self::NotEnoughBytes { available, needed } => {
                write!(f, "not enough bytes: {available} < {needed}")
            }
        }
    }
}

pub type ReadResult<T> = result::Result<T, ReadErr>;
pub type WriteResult<T> = result::Result<T, WriteError>;

/// Everything that can stop a frame from being parsed up to its
/// transport header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    BadRead(ReadErr),
    Ether(EtherHdrError),
    Ipv4(Ipv4HdrError),
    Ipv6(Ipv6HdrError),
    Tcp(TcpHdrError),
    Udp(UdpHdrError),
    UnsupportedEtherType(u16),
    UnsupportedProtocol(Protocol),
    /// A TCP segment split across IPv4 fragments. Only the first
    /// fragment holds the TCP header, and none holds the whole segment.
    Fragment { offset: u16, more: bool },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadRead(e) => write!(f, "read: {e}"),
            Self::Ether(e) => write!(f, "Ethernet: {e}"),
            Self::Ipv4(e) => write!(f, "IPv4: {e}"),
            Self::Ipv6(e) => write!(f, "IPv6: {e}"),
            Self::Tcp(e) => write!(f, "TCP: {e}"),
            Self::Udp(e) => write!(f, "UDP: {e}"),
            Self::UnsupportedEtherType(et) => {
                write!(f, "unsupported EtherType: 0x{et:04X}")
            }
            Self::UnsupportedProtocol(proto) => {
                write!(f, "unsupported protocol: {proto}")
            }
            Self::Fragment { offset, more } => {
                write!(f, "fragment: offset {offset}, more {more}")
            }
        }
    }
}

impl From<ReadErr> for ParseError {
    fn from(err: ReadErr) -> Self {
        Self::BadRead(err)
    }
}

impl From<EtherHdrError> for ParseError {
    fn from(err: EtherHdrError) -> Self {
        Self::Ether(err)
    }
}

impl From<Ipv4HdrError> for ParseError {
    fn from(err: Ipv4HdrError) -> Self {
        Self::Ipv4(err)
    }
}

impl From<Ipv6HdrError> for ParseError {
    fn from(err: Ipv6HdrError) -> Self {
        Self::Ipv6(err)
    }
}

impl From<TcpHdrError> for ParseError {
    fn from(err: TcpHdrError) -> Self {
        Self::Tcp(err)
    }
}

impl From<UdpHdrError> for ParseError {
    fn from(err: UdpHdrError) -> Self {
        Self::Udp(err)
    }
}

/// A trait for reading bytes from packets.
///
/// All operations start from the current position. Only `seek()` and
/// `slice()` move it, and only forward. A failed operation never
/// moves the position.
pub trait PacketRead<'a> {
    /// Return the current position in the packet.
    fn pos(&self) -> usize;

    /// Seek forwards from the current position by `amount`.
    ///
    /// # Errors
    ///
    /// If the seek would move beyond the end of the packet, then a
    /// [`ReadErr`] is returned and the position is unchanged.
    fn seek(&mut self, amount: usize) -> ReadResult<()>;

    /// Return the `len` bytes starting at the current position
    /// without moving it.
    fn peek(&self, len: usize) -> ReadResult<&'a [u8]>;

    /// Return the `len` bytes starting at the current position and
    /// move the position past them.
    ///
    /// # Errors
    ///
    /// If `self` cannot satisfy this request a `ReadErr` is returned
    /// and the position is unchanged.
    fn slice<'b>(&'b mut self, len: usize) -> ReadResult<&'a [u8]>;
}

/// A forward-only cursor over a single contiguous frame.
#[derive(Debug)]
pub struct PacketReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// The number of bytes between the current position and the end
    /// of the packet.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Return the range `[pos, pos + len)`, or an error if any part
    /// of it lies past the end of the packet.
    fn span(&self, len: usize) -> ReadResult<(usize, usize)> {
        let available = self.remaining();

        if available == 0 && len > 0 {
            return Err(ReadErr::EndOfPacket);
        }

        if len > available {
            return Err(ReadErr::NotEnoughBytes { available, needed: len });
        }

        Ok((self.pos, self.pos + len))
    }
}

impl<'a> PacketRead<'a> for PacketReader<'a> {
    fn pos(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, amount: usize) -> ReadResult<()> {
        let (_, end) = self.span(amount)?;
        self.pos = end;
        Ok(())
    }

    fn peek(&self, len: usize) -> ReadResult<&'a [u8]> {
        let (start, end) = self.span(len)?;
        let bytes: &'a [u8] = self.bytes;
        bytes.get(start..end).ok_or(ReadErr::BadLayout)
    }

    fn slice<'b>(&'b mut self, len: usize) -> ReadResult<&'a [u8]> {
        let ret = self.peek(len)?;
        self.pos += len;
        Ok(ret)
    }
}

/// Return the mutable bytes `[off, off + len)` of `bytes`.
pub fn slice_mut(
    bytes: &mut [u8],
    off: usize,
    len: usize,
) -> WriteResult<&mut [u8]> {
    let available = bytes.len().saturating_sub(off);
    if len > available {
        return Err(WriteError::NotEnoughBytes { available, needed: len });
    }

    bytes.get_mut(off..off + len).ok_or(WriteError::BadLayout)
}
