// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{crypto::AesKey, session::SessionId};
use aes::Aes256;
use ctr::{
    cipher::{KeyIvInit, StreamCipher},
    Ctr128LE,
};
use sha2::{Digest, Sha256};

type Aes256CtrLe = Ctr128LE<Aes256>;

/// A 16-byte domain separator for one pseudorandom stream.
///
/// The domain binds a stream to the session, the vector name, and the vector
/// length, so no two vectors ever reuse keystream material under the same
/// seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrngDomain([u8; 16]);

impl PrngDomain {
    /// Domain separator for the mask stream of one named vector.
    pub fn for_vector(session_id: &SessionId, name: &str, length: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(session_id.as_bytes());
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update((length as u64).to_le_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        let mut domain = [0u8; 16];
        domain.copy_from_slice(&digest[..16]);
        Self(domain)
    }

    /// The raw domain bytes, used as the CTR initialization vector.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// A deterministic, seed-keyed pseudorandom stream.
pub trait SecurePrng {
    /// Fill `dest` with the next bytes of the stream.
    fn fill_bytes(&mut self, dest: &mut [u8]);

    /// The next 8 stream bytes, interpreted little-endian.
    fn rand_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }
}

/// Factory seam for mask-stream generators.
///
/// The protocol engine only ever sees this trait, so tests can substitute a
/// fake stream and alternative constructions stay pluggable.
pub trait AesPrngFactory {
    /// Build the stream for `seed` within `domain`.
    fn make_prng(&self, seed: &AesKey, domain: PrngDomain) -> Box<dyn SecurePrng>;
}

/// The production [`AesPrngFactory`]: AES-256 in counter mode with a
/// little-endian counter, keyed by the seed, with the domain bytes as the
/// initialization vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesCtrPrngFactory;

impl AesPrngFactory for AesCtrPrngFactory {
    fn make_prng(&self, seed: &AesKey, domain: PrngDomain) -> Box<dyn SecurePrng> {
        Box::new(AesCtrPrng::new(seed, domain))
    }
}

/// AES-256-CTR keystream generator.
struct AesCtrPrng {
    cipher: Aes256CtrLe,
}

impl AesCtrPrng {
    fn new(seed: &AesKey, domain: PrngDomain) -> Self {
        // Key and IV lengths are fixed by the types above, so construction
        // cannot fail.
        let cipher = Aes256CtrLe::new(seed.as_bytes().into(), domain.as_bytes().into());
        Self { cipher }
    }
}

impl SecurePrng for AesCtrPrng {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
        self.cipher.apply_keystream(dest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::from_bytes(*b"session id number, 32 bytes long")
    }

    fn seed(fill: u8) -> AesKey {
        AesKey::from_bytes([fill; 32])
    }

    #[test]
    fn streams_are_deterministic() {
        let domain = PrngDomain::for_vector(&session(), "test", 4);
        let factory = AesCtrPrngFactory;

        let mut first = factory.make_prng(&seed(7), domain);
        let mut second = factory.make_prng(&seed(7), domain);
        for _ in 0..100 {
            assert_eq!(first.rand_u64(), second.rand_u64());
        }
    }

    #[test]
    fn streams_differ_across_seeds_and_domains() {
        let domain = PrngDomain::for_vector(&session(), "test", 4);
        let other_domain = PrngDomain::for_vector(&session(), "test2", 4);
        let factory = AesCtrPrngFactory;

        let mut base = factory.make_prng(&seed(7), domain);
        let mut other_seed = factory.make_prng(&seed(8), domain);
        let mut other_dom = factory.make_prng(&seed(7), other_domain);

        let reference: Vec<u64> = (0..16).map(|_| base.rand_u64()).collect();
        assert_ne!(
            reference,
            (0..16).map(|_| other_seed.rand_u64()).collect::<Vec<_>>()
        );
        assert_ne!(
            reference,
            (0..16).map(|_| other_dom.rand_u64()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn fill_bytes_matches_rand_u64() {
        let domain = PrngDomain::for_vector(&session(), "test", 4);
        let factory = AesCtrPrngFactory;

        let mut by_words = factory.make_prng(&seed(3), domain);
        let mut by_bytes = factory.make_prng(&seed(3), domain);

        let mut buffer = [0u8; 24];
        by_bytes.fill_bytes(&mut buffer);
        for chunk in buffer.chunks(8) {
            let expected = u64::from_le_bytes(chunk.try_into().unwrap());
            assert_eq!(by_words.rand_u64(), expected);
        }
    }

    #[test]
    fn domain_binds_name_and_length() {
        let by_name = PrngDomain::for_vector(&session(), "alpha", 4);
        let by_len = PrngDomain::for_vector(&session(), "alpha", 5);
        let by_session = PrngDomain::for_vector(
            &SessionId::from_bytes([9u8; 32]),
            "alpha",
            4,
        );
        assert_ne!(by_name, by_len);
        assert_ne!(by_name, by_session);
    }
}
