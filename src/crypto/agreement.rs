// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    crypto::AesKey,
    errors::{CallerError, InternalError, Result},
};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use tracing::error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// HKDF info string for deriving pairwise envelope-encryption keys.
pub(crate) const ENCRYPTION_KEY_INFO: &[u8] = b"secagg pairwise encryption key";
/// HKDF info string for deriving pairwise mask seeds.
pub(crate) const PRNG_SEED_INFO: &[u8] = b"secagg pairwise prng seed";

/// An X25519 key pair used to agree on a symmetric key with each peer.
///
/// Two independent pairs are advertised per client, one per derived-key
/// purpose, so the encryption keys and the mask seeds come from unrelated
/// shared secrets.
pub(crate) struct KeyAgreementPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for KeyAgreementPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyAgreementPair")
            .field("secret", &"[redacted]")
            .field("public", &self.public)
            .finish()
    }
}

impl KeyAgreementPair {
    /// Sample a fresh key pair.
    pub(crate) fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half, as advertised to the server.
    pub(crate) fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// The secret half, for threshold sharing. Handle with care.
    pub(crate) fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Agree on a symmetric key with the peer that advertised `peer_public`.
    ///
    /// Both endpoints derive the same key: the Diffie-Hellman shared secret
    /// is symmetric and the HKDF info string depends only on the purpose.
    pub(crate) fn derive_key(&self, peer_public: &[u8], info: &[u8]) -> Result<AesKey> {
        let peer_public: [u8; 32] = peer_public.try_into().map_err(|_| {
            error!(
                "Peer public key has wrong length: expected 32 bytes, got {}",
                peer_public.len()
            );
            CallerError::DeserializationFailed
        })?;
        let shared = self.secret.diffie_hellman(&PublicKey::from(peer_public));

        let mut key_bytes = Zeroizing::new([0u8; 32]);
        Hkdf::<Sha256>::new(None, shared.as_bytes())
            .expand(info, &mut *key_bytes)
            .map_err(|_| InternalError::InternalInvariantFailed)?;
        Ok(AesKey::from_bytes(*key_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn both_endpoints_derive_the_same_keys() {
        let rng = &mut init_testing();
        let ours = KeyAgreementPair::generate(rng);
        let theirs = KeyAgreementPair::generate(rng);

        let our_view = ours
            .derive_key(&theirs.public_bytes(), PRNG_SEED_INFO)
            .unwrap();
        let their_view = theirs
            .derive_key(&ours.public_bytes(), PRNG_SEED_INFO)
            .unwrap();
        assert_eq!(our_view, their_view);
    }

    #[test]
    fn purposes_yield_unrelated_keys() {
        let rng = &mut init_testing();
        let ours = KeyAgreementPair::generate(rng);
        let theirs = KeyAgreementPair::generate(rng);

        let enc = ours
            .derive_key(&theirs.public_bytes(), ENCRYPTION_KEY_INFO)
            .unwrap();
        let prng = ours
            .derive_key(&theirs.public_bytes(), PRNG_SEED_INFO)
            .unwrap();
        assert_ne!(enc, prng);
    }

    #[test]
    fn malformed_peer_key_is_rejected() {
        let rng = &mut init_testing();
        let ours = KeyAgreementPair::generate(rng);
        assert!(ours.derive_key(b"too short", PRNG_SEED_INFO).is_err());
    }
}
