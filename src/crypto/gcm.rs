// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    crypto::AesKey,
    errors::{InternalError, Result},
};
use aes_gcm::{aead::Aead, Aes256Gcm, Key, KeyInit, Nonce};
use rand::{CryptoRng, RngCore};

/// Number of bytes in the random nonce prepended to each ciphertext.
const NONCE_SIZE: usize = 12;

/// A peer's envelope failed authentication.
///
/// This is deliberately not an [`InternalError`]: a bad envelope is a
/// data-layer event, recovered locally by marking the sending peer dead.
/// It must never abort the protocol session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure;

/// AES-256-GCM authenticated encryption for key-share envelopes.
///
/// The wire format is `nonce (12 bytes) || ciphertext-and-tag`, with a fresh
/// random nonce per call.
pub struct AesGcmEncryption;

impl AesGcmEncryption {
    /// Encrypt `plaintext` under `key` with a fresh random nonce.
    pub fn encrypt<R: RngCore + CryptoRng>(
        key: &AesKey,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let mut nonce = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| InternalError::InternalInvariantFailed)?;

        let mut envelope = nonce.to_vec();
        envelope.extend(ciphertext);
        Ok(envelope)
    }

    /// Decrypt an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// Any short input or tag mismatch yields [`AuthFailure`].
    pub fn decrypt(key: &AesKey, envelope: &[u8]) -> std::result::Result<Vec<u8>, AuthFailure> {
        if envelope.len() < NONCE_SIZE {
            return Err(AuthFailure);
        }
        let (nonce, ciphertext) = envelope.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthFailure)
    }
}
