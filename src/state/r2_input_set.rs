// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    crypto::{AesGcmEncryption, AesKey, ShamirShare},
    errors::{InternalError, Result},
    masks::{add_mod, map_of_masks},
    messages::{
        ClientToServerMessage, MaskedInputVector, PairOfKeyShares, ServerToClientMessage,
    },
    peers::{OtherClientState, PeerTable},
    session::SessionId,
    state::{
        abort_quietly, abort_with_notice, internal_abort, server_abort, unexpected_message,
        Collaborators, Outcome, ProtocolState, R3Unmasking, CANCELLED_MESSAGE,
        INSUFFICIENT_CLIENTS_MESSAGE, WRONG_NUMBER_OF_KEY_SHARES_MESSAGE,
    },
    transport::ClientStateTag,
    vector::{SecAggVector, SecAggVectorMap, VectorSpec},
};
use std::collections::HashMap;
use tracing::{info, warn};

/// Round 2 with the input in hand: the state that computes and submits the
/// masked input.
#[derive(Debug)]
pub(crate) struct R2MaskedInputCollInputSet {
    pub(crate) tolerate_missing_key_shares: bool,
    pub(crate) min_surviving: u32,
    pub(crate) n_alive: u32,
    pub(crate) input_map: SecAggVectorMap,
    pub(crate) specs: Vec<VectorSpec>,
    pub(crate) peers: PeerTable,
    pub(crate) own_self_share: ShamirShare,
    pub(crate) self_prng_key: AesKey,
    pub(crate) session_id: SessionId,
    pub(crate) collaborators: Collaborators,
}

impl R2MaskedInputCollInputSet {
    pub(crate) fn handle_message(self, message: &ServerToClientMessage) -> Outcome {
        match message {
            ServerToClientMessage::Abort { early_success, .. } => {
                Outcome::Transitioned(server_abort(self.collaborators, *early_success))
            }
            ServerToClientMessage::MaskedInputRequest {
                encrypted_key_shares,
            } => self.handle_masked_input_request(encrypted_key_shares),
            _ => Outcome::Transitioned(unexpected_message(
                self.collaborators,
                "R2_MASKED_INPUT_COLL_INPUT_SET",
            )),
        }
    }

    /// The protocol's hard path: open every peer's envelope, refine the
    /// liveness picture, derive the masks, and submit the masked input.
    pub(crate) fn handle_masked_input_request(
        mut self,
        encrypted_key_shares: &[Vec<u8>],
    ) -> Outcome {
        info!("Handling the masked input request.");

        let n_total = self.peers.len();
        if encrypted_key_shares.len() != n_total {
            let padded_short_list =
                self.tolerate_missing_key_shares && encrypted_key_shares.len() < n_total;
            if !padded_short_list {
                return Outcome::Transitioned(abort_with_notice(
                    self.collaborators,
                    WRONG_NUMBER_OF_KEY_SHARES_MESSAGE.to_string(),
                ));
            }
            info!(
                "Padding a short share list: {} of {} envelopes present.",
                encrypted_key_shares.len(),
                n_total
            );
        }

        let share_pairs = match self.collect_share_pairs(encrypted_key_shares) {
            Ok(share_pairs) => share_pairs,
            Err(InternalError::Cancelled) => {
                return Outcome::Cancelled(abort_quietly(
                    self.collaborators,
                    CANCELLED_MESSAGE.to_string(),
                ))
            }
            Err(_) => {
                return Outcome::Transitioned(internal_abort(
                    self.collaborators,
                    "per-peer share processing failed",
                ))
            }
        };

        if self.n_alive < self.min_surviving {
            info!(
                "Only {} of the required {} clients are still alive; aborting.",
                self.n_alive, self.min_surviving
            );
            return Outcome::Transitioned(abort_with_notice(
                self.collaborators,
                INSUFFICIENT_CLIENTS_MESSAGE.to_string(),
            ));
        }

        // Each pairwise seed is added by the lower-id endpoint and
        // subtracted by the higher-id one, so the two contributions cancel
        // in the server's sum. The self seed is removed at unmasking.
        let client_id = self.peers.own_id();
        let mut add_seeds = vec![self.self_prng_key.clone()];
        let mut sub_seeds = Vec::new();
        for id in self.peers.alive_peers() {
            if id < client_id {
                add_seeds.push(self.peers.pairwise_prng_key(id).clone());
            } else {
                sub_seeds.push(self.peers.pairwise_prng_key(id).clone());
            }
        }

        let masks = match map_of_masks(
            &add_seeds,
            &sub_seeds,
            &self.specs,
            &self.session_id,
            self.collaborators.prng_factory.as_ref(),
            self.collaborators.abort_signal.as_ref(),
        ) {
            Ok(masks) => masks,
            Err(InternalError::Cancelled) => {
                return Outcome::Cancelled(abort_quietly(
                    self.collaborators,
                    CANCELLED_MESSAGE.to_string(),
                ))
            }
            Err(_) => {
                return Outcome::Transitioned(internal_abort(
                    self.collaborators,
                    "mask derivation failed",
                ))
            }
        };

        let vectors = match self.masked_vectors(&masks) {
            Ok(vectors) => vectors,
            Err(_) => {
                return Outcome::Transitioned(internal_abort(
                    self.collaborators,
                    "masked vector assembly failed",
                ))
            }
        };

        let mut collaborators = self.collaborators;
        collaborators.send(&ClientToServerMessage::MaskedInputResponse { vectors });
        collaborators.notify(ClientStateTag::R3Unmasking);

        info!(
            "Masked input submitted; {} of {} clients alive going into Round 3.",
            self.n_alive, n_total
        );
        Outcome::Transitioned(ProtocolState::R3Unmasking(R3Unmasking {
            min_surviving: self.min_surviving,
            n_alive: self.n_alive,
            specs: self.specs,
            peers: self.peers,
            share_pairs,
            own_self_share: self.own_self_share,
            self_prng_key: self.self_prng_key,
            session_id: self.session_id,
            collaborators,
        }))
    }

    /// Open each alive peer's envelope. An empty or unauthentic envelope
    /// kills that peer only; it is never a protocol error.
    fn collect_share_pairs(
        &mut self,
        encrypted_key_shares: &[Vec<u8>],
    ) -> Result<Vec<Option<PairOfKeyShares>>> {
        let n_total = self.peers.len();
        let mut share_pairs: Vec<Option<PairOfKeyShares>> = (0..n_total).map(|_| None).collect();

        for id in 0..n_total {
            if self.collaborators.cancelled() {
                return Err(InternalError::Cancelled);
            }
            // The slot at this client's own id is required to be present but
            // is never opened.
            if id == self.peers.own_id() || !self.peers.is_alive(id) {
                continue;
            }

            let envelope = encrypted_key_shares
                .get(id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if envelope.is_empty() {
                info!("Client {id} dropped before delivering its key shares.");
                self.mark_dead_at_round_2(id)?;
                continue;
            }

            let plaintext = match AesGcmEncryption::decrypt(self.peers.enc_key(id), envelope) {
                Ok(plaintext) => plaintext,
                Err(_) => {
                    warn!("Client {id}'s envelope failed authentication; marking it dead.");
                    self.mark_dead_at_round_2(id)?;
                    continue;
                }
            };
            match PairOfKeyShares::try_from_bytes(plaintext) {
                Ok(pair) => share_pairs[id] = Some(pair),
                Err(_) => {
                    warn!("Client {id}'s key-share pair failed to parse; marking it dead.");
                    self.mark_dead_at_round_2(id)?;
                }
            }
        }
        Ok(share_pairs)
    }

    fn mark_dead_at_round_2(&mut self, id: usize) -> Result<()> {
        self.peers.mark_dead(id, OtherClientState::DeadAtRound2)?;
        self.n_alive -= 1;
        Ok(())
    }

    /// Add the masks onto the input, element-wise within each vector's
    /// modulus, and pack the results for the wire.
    fn masked_vectors(
        &self,
        masks: &SecAggVectorMap,
    ) -> Result<HashMap<String, MaskedInputVector>> {
        let mut vectors = HashMap::with_capacity(self.specs.len());
        for spec in &self.specs {
            let input = self
                .input_map
                .get(spec.name())
                .ok_or(InternalError::InternalInvariantFailed)?;
            let mask = masks
                .get(spec.name())
                .ok_or(InternalError::InternalInvariantFailed)?;

            let modulus = spec.modulus();
            let elements: Vec<u64> = input
                .as_u64_vector()
                .iter()
                .zip(mask.as_u64_vector())
                .map(|(&element, mask_element)| add_mod(element, mask_element, modulus))
                .collect();

            let packed = SecAggVector::new(elements, modulus)?;
            let replaced = vectors.insert(
                spec.name().to_string(),
                MaskedInputVector {
                    encoded_vector: packed.into_packed_bytes(),
                },
            );
            if replaced.is_some() {
                return Err(InternalError::InternalInvariantFailed);
            }
        }
        Ok(vectors)
    }
}
