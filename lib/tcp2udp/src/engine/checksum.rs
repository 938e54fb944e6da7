// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The internet checksum.
//!
//! [`Checksum`] is a rolling one's complement sum. It can be built up
//! from scratch over a series of byte ranges, or seeded from the
//! checksum already stored in a header and then incrementally updated
//! by subtracting the bytes being replaced and adding their
//! replacements. [`HeaderChecksum`] is the finalized form: the one's
//! complement of the sum, as stored in the header.
//!
//! # Endianness
//!
//! The checksum is never byte-swapped. Every pair of bytes, the
//! stored checksum included, is summed as a native-endian `u16`
//! (`from_ne_bytes`) and the result is written back with
//! `to_ne_bytes`. Since the input bytes are in network order, the
//! output lands in network order too. RFC 1071 §1.B covers why this
//! works on either kind of host.
//!
//! # Odd lengths
//!
//! A trailing odd byte is summed as though it were followed by a zero
//! byte. Callers which sum a region in several pieces must split it on
//! even offsets; only the final piece may have an odd length.
//!
//! # Relevant RFCs
//!
//! * 1071 Computing the Internet Checksum
//!
//! * 1141 Incremental Updating of the Internet Checksum
//!
//! * 1624 Computation of the Internet Checksum via Incremental Update

/// The checksum value as it is contained in a network header: the
/// one's complement of a one's complement sum.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }

    /// Wrap the checksum bytes read from a header.
    ///
    /// NOTE: This could just as well be a `From<[u8; 2]>`
    /// implementation, but "wrap" makes it clear that the bytes are
    /// already in their complemented header form.
    pub fn wrap(hc: [u8; 2]) -> Self {
        Self { inner: hc }
    }

    /// Return the bytes to transmit in a UDP header.
    ///
    /// A UDP checksum of zero means "no checksum", so a computed zero
    /// is sent as its one's complement equivalent, `0xFFFF`.
    pub fn udp_bytes(&self) -> [u8; 2] {
        if self.inner == [0, 0] { [0xFF, 0xFF] } else { self.inner }
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        Self { inner: (!csum.finalize()).to_ne_bytes() }
    }
}

/// A rolling one's complement checksum calculation.
///
/// Carries are accumulated in the upper half of a `u32` and only
/// folded back in when the sum is finalized.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    /// Create a new rolling checksum, starting with the passed in
    /// `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self { inner: csum_add(0, bytes) }
    }

    /// Update the sum by adding the contents of `bytes`.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_add(self.inner, bytes);
    }

    /// Update the sum by subtracting the contents of `bytes`.
    pub fn sub_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_sub(self.inner, bytes);
    }

    /// Replace the contribution of `old` with that of `new`, where
    /// both occupy the same (even) offset in the checksummed data.
    ///
    /// This is equation 3 of RFC 1624: `HC' = ~(~HC + ~m + m')`.
    pub fn replace(&mut self, old: &[u8], new: &[u8]) {
        self.sub_bytes(old);
        self.add_bytes(new);
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }

        (self.inner & 0xFFFF) as u16
    }
}

impl From<HeaderChecksum> for Checksum {
    /// Convert a header's checksum bytes back into a rolling sum.
    fn from(hc: HeaderChecksum) -> Self {
        Self { inner: (!u16::from_ne_bytes(hc.bytes())) as u32 }
    }
}

impl From<u32> for Checksum {
    fn from(csum: u32) -> Self {
        Self { inner: csum }
    }
}

impl core::ops::Add for Checksum {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let mut sum = Self { inner: self.inner };
        sum += other;
        sum
    }
}

impl core::ops::AddAssign for Checksum {
    fn add_assign(&mut self, mut other: Self) {
        // Fold both sides first so the u32 accumulator cannot
        // overflow no matter how many sums are combined.
        let lhs = self.finalize() as u32;
        self.inner = lhs + other.finalize() as u32;
    }
}

fn csum_add(mut csum: u32, bytes: &[u8]) -> u32 {
    let mut words = bytes.chunks_exact(2);

    for w in &mut words {
        csum = fold_carry(csum + u16::from_ne_bytes([w[0], w[1]]) as u32);
    }

    if let [last] = words.remainder() {
        csum = fold_carry(csum + u16::from_ne_bytes([*last, 0]) as u32);
    }

    csum
}

fn csum_sub(mut csum: u32, bytes: &[u8]) -> u32 {
    let mut words = bytes.chunks_exact(2);

    for w in &mut words {
        csum = fold_carry(csum + (!u16::from_ne_bytes([w[0], w[1]])) as u32);
    }

    if let [last] = words.remainder() {
        csum = fold_carry(csum + (!u16::from_ne_bytes([*last, 0])) as u32);
    }

    csum
}

// Keep the accumulator from overflowing on very large inputs (a
// jumbo frame has more than 2^16 words). This leaves the value
// congruent mod 0xFFFF and never turns a non-zero sum into zero.
#[inline]
fn fold_carry(csum: u32) -> u32 {
    if csum > 0xFFFF_0000 { (csum >> 16) + (csum & 0xFFFF) } else { csum }
}
