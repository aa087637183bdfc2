// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Derivation of mask vectors from PRNG seeds.
//!
//! Each mask element is the difference between the seed streams to add and
//! the seed streams to subtract, reduced into the vector's modulus. When all
//! clients sum their masked submissions, each pairwise seed appears once on
//! the "add" side of one client and once on the "subtract" side of the
//! other, so those terms cancel; self seeds are removed at unmasking once
//! enough shares are recombined.

use crate::{
    cancellation::AbortSignal,
    crypto::{AesKey, AesPrngFactory, PrngDomain},
    errors::{InternalError, Result},
    session::SessionId,
    vector::{SecAggVector, SecAggVectorMap, VectorSpec},
};

/// Compute one mask vector per spec.
///
/// For each spec, element `j` is
/// `sum of stream_j over add_seeds - sum of stream_j over sub_seeds`,
/// reduced modulo the spec's modulus, where each seed's stream is generated
/// by `prng_factory` within a domain binding the session id, the vector
/// name, and the vector length. The function is deterministic in all of its
/// inputs; with no seeds at all it yields zero vectors.
///
/// The optional `abort_signal` is polled between seeds and between vectors;
/// when it has been raised the function returns
/// [`InternalError::Cancelled`].
pub fn map_of_masks(
    add_seeds: &[AesKey],
    sub_seeds: &[AesKey],
    specs: &[VectorSpec],
    session_id: &SessionId,
    prng_factory: &dyn AesPrngFactory,
    abort_signal: Option<&AbortSignal>,
) -> Result<SecAggVectorMap> {
    let mut masks = SecAggVectorMap::with_capacity(specs.len());
    for spec in specs {
        let domain = PrngDomain::for_vector(session_id, spec.name(), spec.length());
        let modulus = spec.modulus();
        let mut elements = vec![0u64; spec.length()];

        for seed in add_seeds {
            check_abort(abort_signal)?;
            let mut stream = prng_factory.make_prng(seed, domain);
            for element in elements.iter_mut() {
                *element = add_mod(*element, stream.rand_u64() % modulus, modulus);
            }
        }
        for seed in sub_seeds {
            check_abort(abort_signal)?;
            let mut stream = prng_factory.make_prng(seed, domain);
            for element in elements.iter_mut() {
                *element = sub_mod(*element, stream.rand_u64() % modulus, modulus);
            }
        }

        let vector = SecAggVector::new(elements, modulus)?;
        let replaced = masks.insert(spec.name().to_string(), vector);
        if replaced.is_some() {
            // Duplicate vector names would silently merge two masks.
            return Err(InternalError::InternalInvariantFailed);
        }
    }
    Ok(masks)
}

/// `(a + b) mod modulus` for already-reduced operands.
///
/// With `modulus <= 2^62` the intermediate sum stays below `2^63`, so plain
/// `u64` arithmetic is exact.
pub(crate) fn add_mod(a: u64, b: u64, modulus: u64) -> u64 {
    (a + b) % modulus
}

/// `(a - b) mod modulus` for already-reduced operands.
pub(crate) fn sub_mod(a: u64, b: u64, modulus: u64) -> u64 {
    (a + modulus - b) % modulus
}

fn check_abort(abort_signal: Option<&AbortSignal>) -> Result<()> {
    match abort_signal {
        Some(signal) if signal.raised() => Err(InternalError::Cancelled),
        _ => Ok(()),
    }
}
