// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Wire messages exchanged with the aggregation server.
//!
//! The wrapper types mirror the on-the-wire field names; they carry `serde`
//! derives so any schema-stable, length-delimited encoding can be layered on
//! by the transport. The one format this crate does own is the plaintext of
//! a key-share envelope, [`PairOfKeyShares`], which uses a tagged,
//! length-prefixed byte layout so that the decrypted buffer can be wiped
//! deterministically after parsing.

use crate::{
    crypto::ShamirShare,
    errors::{CallerError, Result},
    utils::ParseBytes,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::error;
use zeroize::Zeroize;

/// A client's two advertised X25519 public keys.
///
/// An entry with both fields empty denotes a client that dropped out before
/// advertising.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PairOfPublicKeys {
    /// Public key under which envelope-encryption keys are agreed.
    pub enc_pk: Vec<u8>,
    /// Public key under which pairwise mask seeds are agreed.
    pub prng_pk: Vec<u8>,
}

impl PairOfPublicKeys {
    /// True for the placeholder entry of a dropped client.
    pub fn is_empty(&self) -> bool {
        self.enc_pk.is_empty() && self.prng_pk.is_empty()
    }
}

/// One packed masked vector inside a masked-input response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedInputVector {
    /// The vector's packed byte representation.
    pub encoded_vector: Vec<u8>,
}

/// One entry of an unmasking response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseOrPrfShare {
    /// A share of the peer's pairwise-mask secret key, revealed for peers
    /// that dropped after masks were committed.
    NoiseSkShare(Vec<u8>),
    /// A share of the peer's self-mask seed, revealed for surviving peers.
    PrfSkShare(Vec<u8>),
    /// Nothing to reveal for this slot (peer dropped before Round 2's masks
    /// included it).
    Empty,
}

/// Messages sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientToServerMessage {
    /// The client is leaving the session.
    Abort {
        /// Human-readable reason, mirrored in the aborted state's error
        /// message.
        diagnostic_info: String,
    },
    /// Round 0: the client's advertised public keys.
    AdvertiseKeys {
        /// Both public keys, in one pair.
        pair_of_public_keys: PairOfPublicKeys,
    },
    /// Round 1: one encrypted key-share envelope per client slot.
    ShareKeysResponse {
        /// Indexed by client id; empty bytes at this client's own slot and
        /// at slots of clients already dead.
        encrypted_key_shares: Vec<Vec<u8>>,
    },
    /// Round 2: the masked input.
    MaskedInputResponse {
        /// One packed masked vector per configured vector name.
        vectors: HashMap<String, MaskedInputVector>,
    },
    /// Round 3: the requested shares.
    UnmaskingResponse {
        /// Indexed by client id.
        noise_or_prf_key_shares: Vec<NoiseOrPrfShare>,
    },
}

/// Messages received by the client from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerToClientMessage {
    /// The server is ending this client's participation.
    Abort {
        /// True when the client's contribution is already fully accounted
        /// for and the session ends successfully for it.
        early_success: bool,
        /// Optional human-readable reason.
        diagnostic_info: Option<String>,
    },
    /// Round 1: every client's advertised keys.
    ShareKeysRequest {
        /// Indexed by client id; an empty pair marks a client that dropped
        /// in Round 0.
        pairs_of_public_keys: Vec<PairOfPublicKeys>,
    },
    /// Round 2: the collected key-share envelopes addressed to this client.
    MaskedInputRequest {
        /// Indexed by the *sending* client's id; empty bytes denote a
        /// dropped peer.
        encrypted_key_shares: Vec<Vec<u8>>,
    },
    /// Round 3: which clients dropped after committing masks.
    UnmaskingRequest {
        /// Ids of clients that died during Round 2, after their pairwise
        /// masks were already included in other clients' submissions.
        dead_3_client_ids: Vec<u32>,
    },
}

const SHARE_PAIR_TAG: &[u8] = b"Key Share Pair";

/// The plaintext of one key-share envelope: a peer's shares of its
/// pairwise-mask secret and of its self-mask seed, both addressed to this
/// client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOfKeyShares {
    noise_sk_share: ShamirShare,
    prf_sk_share: ShamirShare,
}

impl PairOfKeyShares {
    /// Bundle two shares for one recipient.
    pub fn new(noise_sk_share: ShamirShare, prf_sk_share: ShamirShare) -> Self {
        Self {
            noise_sk_share,
            prf_sk_share,
        }
    }

    /// The share of the peer's pairwise-mask secret key.
    pub fn noise_sk_share(&self) -> &ShamirShare {
        &self.noise_sk_share
    }

    /// The share of the peer's self-mask seed.
    pub fn prf_sk_share(&self) -> &ShamirShare {
        &self.prf_sk_share
    }

    /// Serialize for encryption.
    ///
    /// Format: `tag | noise len (8 bytes LE) | noise | prf len | prf`.
    pub fn into_bytes(self) -> Vec<u8> {
        [
            SHARE_PAIR_TAG,
            &self.noise_sk_share.as_bytes().len().to_le_bytes(),
            self.noise_sk_share.as_bytes(),
            &self.prf_sk_share.as_bytes().len().to_le_bytes(),
            self.prf_sk_share.as_bytes(),
        ]
        .concat()
    }

    /// Parse a decrypted envelope.
    ///
    /// The input buffer is wiped before returning, whether or not parsing
    /// succeeded; the shares are the only surviving copy.
    pub fn try_from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut parser = ParseBytes::new(bytes);

        let mut parse = || -> Result<PairOfKeyShares> {
            let actual_tag = parser.take_bytes(SHARE_PAIR_TAG.len())?;
            if actual_tag != SHARE_PAIR_TAG {
                Err(CallerError::DeserializationFailed)?
            }

            let noise_len = parser.take_len()?;
            let noise_sk_share = ShamirShare::from_bytes(parser.take_bytes(noise_len)?.to_vec());

            let prf_len = parser.take_len()?;
            let prf_sk_share = ShamirShare::from_bytes(parser.take_bytes(prf_len)?.to_vec());

            if !parser.is_exhausted() {
                Err(CallerError::DeserializationFailed)?
            }

            Ok(PairOfKeyShares {
                noise_sk_share,
                prf_sk_share,
            })
        };

        let result = parse();

        // During parsing, the share bytes were copied into zeroizing
        // carriers. Delete the original copy.
        parser.zeroize();

        if result.is_err() {
            error!(
                "Failed to deserialize a key-share pair. Expected format:
                    {:?} | noise_sk_share | prf_sk_share
                where the last two elements are each prepended by an 8 byte
                little-endian encoded usize describing their length",
                SHARE_PAIR_TAG
            );
        }
        result
    }
}
