// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::errors::{InternalError, Result};
use sharks::Sharks;
use std::fmt::Debug;
use tracing::error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One share of a secret under a (t, n) threshold scheme.
///
/// The client core only carries and compares shares; reconstruction happens
/// on the server once enough shares have been revealed in Round 3. Shares of
/// still-secret keys are as sensitive as the keys themselves, so the bytes
/// are wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ShamirShare(Vec<u8>);

impl ShamirShare {
    /// Wrap raw share bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// An empty placeholder share.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// The raw share bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for ShamirShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShamirShare")
            .field("len", &self.0.len())
            .field("bytes", &"[redacted]")
            .finish()
    }
}

/// Split `secret` into `share_count` shares, any `threshold` of which
/// reconstruct it.
///
/// Share `i` of the result belongs to client id `i`; the underlying GF(2^8)
/// x-coordinate is `i + 1`. The field size caps `share_count` at 255, which
/// the client configuration enforces up front.
pub(crate) fn split_secret(
    secret: &[u8],
    threshold: u32,
    share_count: u32,
) -> Result<Vec<ShamirShare>> {
    let threshold: u8 = threshold.try_into().map_err(|_| {
        error!("Shamir threshold {} exceeds the field size", threshold);
        InternalError::InternalInvariantFailed
    })?;
    if share_count > 255 {
        error!("Shamir share count {} exceeds the field size", share_count);
        return Err(InternalError::InternalInvariantFailed);
    }

    let sharks = Sharks(threshold);
    Ok(sharks
        .dealer(secret)
        .take(share_count as usize)
        .map(|share| ShamirShare(Vec::from(&share)))
        .collect())
}
