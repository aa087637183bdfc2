// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Cryptographic building blocks for the secure aggregation client.
//!
//! The primitives here are specified by behavioral contract: AES-256-GCM
//! authenticated envelopes with a random nonce prepended to the ciphertext,
//! a deterministic AES-256-CTR pseudorandom stream behind the
//! [`AesPrngFactory`] seam, X25519 key agreement with HKDF-SHA-256 key
//! derivation, and a carrier type for Shamir shares.

mod agreement;
mod gcm;
mod key;
mod prng;
mod shamir;

pub(crate) use agreement::{KeyAgreementPair, ENCRYPTION_KEY_INFO, PRNG_SEED_INFO};
pub use gcm::{AesGcmEncryption, AuthFailure};
pub use key::AesKey;
pub use prng::{AesCtrPrngFactory, AesPrngFactory, PrngDomain, SecurePrng};
pub(crate) use shamir::split_secret;
pub use shamir::ShamirShare;
