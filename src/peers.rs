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
use tracing::error;

/// What this client knows about one other client.
///
/// Once a client has transitioned to any of the dead states it can never
/// return to `Alive`; [`PeerTable::mark_dead`] enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OtherClientState {
    /// Participating normally as far as we know.
    Alive,
    /// Dropped before advertising keys.
    DeadAtRound1,
    /// Dropped before delivering its key shares.
    DeadAtRound2,
    /// Dropped after its pairwise masks were committed.
    DeadAtRound3,
    /// Finished the protocol.
    #[allow(dead_code)]
    Completed,
    /// No information.
    #[allow(dead_code)]
    Unknown,
}

impl OtherClientState {
    fn is_dead(&self) -> bool {
        matches!(
            self,
            Self::DeadAtRound1 | Self::DeadAtRound2 | Self::DeadAtRound3
        )
    }
}

/// Per-client tables for one session, indexed by client id.
///
/// Three parallel tables: liveness state, envelope-encryption key, and
/// pairwise mask seed. The slots at this client's own id hold sentinel
/// (zero) keys and are never consulted.
#[derive(Debug)]
pub(crate) struct PeerTable {
    own_id: usize,
    states: Vec<OtherClientState>,
    enc_keys: Vec<AesKey>,
    pairwise_prng_keys: Vec<AesKey>,
}

impl PeerTable {
    pub(crate) fn new(
        own_id: usize,
        states: Vec<OtherClientState>,
        enc_keys: Vec<AesKey>,
        pairwise_prng_keys: Vec<AesKey>,
    ) -> Result<Self> {
        if states.len() != enc_keys.len()
            || states.len() != pairwise_prng_keys.len()
            || own_id >= states.len()
        {
            error!(
                "Peer table shape mismatch: {} states, {} enc keys, {} prng keys, own id {}",
                states.len(),
                enc_keys.len(),
                pairwise_prng_keys.len(),
                own_id
            );
            return Err(InternalError::InternalInvariantFailed);
        }
        Ok(Self {
            own_id,
            states,
            enc_keys,
            pairwise_prng_keys,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn own_id(&self) -> usize {
        self.own_id
    }

    pub(crate) fn state(&self, id: usize) -> OtherClientState {
        self.states[id]
    }

    pub(crate) fn is_alive(&self, id: usize) -> bool {
        self.states[id] == OtherClientState::Alive
    }

    /// Transition a peer to a dead state. Dead peers stay dead; trying to
    /// re-mark one is an internal error.
    pub(crate) fn mark_dead(&mut self, id: usize, state: OtherClientState) -> Result<()> {
        if !state.is_dead() || id == self.own_id {
            error!("Invalid mark_dead({id}, {state:?})");
            return Err(InternalError::InternalInvariantFailed);
        }
        if self.states[id].is_dead() {
            error!(
                "Client {} is already dead ({:?}); cannot re-mark as {:?}",
                id, self.states[id], state
            );
            return Err(InternalError::InternalInvariantFailed);
        }
        self.states[id] = state;
        Ok(())
    }

    pub(crate) fn enc_key(&self, id: usize) -> &AesKey {
        &self.enc_keys[id]
    }

    pub(crate) fn pairwise_prng_key(&self, id: usize) -> &AesKey {
        &self.pairwise_prng_keys[id]
    }

    /// Ids of peers (excluding this client) currently believed alive, in
    /// ascending order.
    pub(crate) fn alive_peers(&self) -> impl Iterator<Item = usize> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(move |(id, state)| *id != self.own_id && **state == OtherClientState::Alive)
            .map(|(id, _)| id)
    }
}
