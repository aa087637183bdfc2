// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use rand::{CryptoRng, RngCore};
use std::fmt::Debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 32-byte AES-256 key.
///
/// Used both for envelope encryption keys and as PRNG seeds for mask
/// derivation. The bytes are wiped from memory when the key is dropped.
///
/// A key of all zeroes acts as a sentinel in per-peer tables, standing in
/// for "no key at this slot" (the engine's own slot and dead peers).
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AesKey([u8; 32]);

impl AesKey {
    /// Number of bytes in a key.
    pub const SIZE: usize = 32;

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Sample a fresh key from a cryptographic RNG.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; Self::SIZE];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The all-zero sentinel key occupying unused table slots.
    pub fn sentinel() -> Self {
        Self([0u8; Self::SIZE])
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AesKey").field(&"[redacted]").finish()
    }
}
