// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A one-way abort signal shared between the protocol engine and an external
/// controller.
///
/// The engine polls the signal at coarse-grained progress points (between
/// per-peer envelope decryptions and between per-vector mask computations).
/// When the signal has been raised, the in-flight operation returns
/// [`InternalError::Cancelled`](crate::errors::InternalError::Cancelled) and
/// the engine transitions to the aborted state.
///
/// Writers may only raise the signal; it is never cleared.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    raised: Arc<AtomicBool>,
}

impl AbortSignal {
    /// Create a new, un-raised signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Idempotent.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// True once [`raise`](Self::raise) has been called from any clone of
    /// this signal.
    pub fn raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
