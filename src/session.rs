// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::messages::PairOfPublicKeys;
use sha2::{Digest, Sha256};

/// Opaque 32-byte identifier naming one protocol run.
///
/// Every client derives the same id from the share-keys request, so it can
/// serve as a domain separator in mask derivation without any extra round
/// trip. The id is not secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId([u8; 32]);

impl SessionId {
    /// Number of bytes in a session id.
    pub const SIZE: usize = 32;

    /// Build a session id from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the session id for a run from the full list of advertised
    /// public-key pairs, in client-id order. Dropped clients contribute
    /// their (empty) entries as well, so all surviving clients agree on the
    /// digest input.
    pub fn derive(pairs_of_public_keys: &[PairOfPublicKeys]) -> Self {
        let mut hasher = Sha256::new();
        for pair in pairs_of_public_keys {
            hasher.update((pair.enc_pk.len() as u64).to_le_bytes());
            hasher.update(&pair.enc_pk);
            hasher.update((pair.prng_pk.len() as u64).to_le_bytes());
            hasher.update(&pair.prng_pk);
        }
        Self(hasher.finalize().into())
    }

    /// The raw bytes of the id.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Print a short prefix; the full value is rarely useful in logs.
        write!(
            f,
            "SessionId({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}
