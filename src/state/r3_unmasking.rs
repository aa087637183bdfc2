// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    crypto::{AesKey, ShamirShare},
    errors::{InternalError, Result},
    messages::{ClientToServerMessage, NoiseOrPrfShare, PairOfKeyShares, ServerToClientMessage},
    peers::{OtherClientState, PeerTable},
    session::SessionId,
    state::{
        abort_with_notice, internal_abort, server_abort, unexpected_message, Collaborators,
        Completed, Outcome, ProtocolState, INSUFFICIENT_CLIENTS_MESSAGE,
    },
    transport::ClientStateTag,
    vector::VectorSpec,
};
use tracing::{error, info};

const INVALID_DEAD_CLIENT_MESSAGE: &str =
    "The server listed an invalid client id in the unmasking request.";
const SELF_IN_DEAD_LIST_MESSAGE: &str = "The server listed this client as a dead client.";
const ALREADY_DEAD_CLIENT_MESSAGE: &str = "The server listed a client that was already dead.";

/// Round 3: the masked input is submitted; the server reports who dropped
/// after masks were committed, and the client reveals exactly the shares
/// needed to repair the sum.
#[derive(Debug)]
pub(crate) struct R3Unmasking {
    pub(crate) min_surviving: u32,
    pub(crate) n_alive: u32,
    /// Carried across the transition for parity with the rest of the state
    /// chain; Round 3 itself only reveals shares.
    #[allow(dead_code)]
    pub(crate) specs: Vec<VectorSpec>,
    pub(crate) peers: PeerTable,
    pub(crate) share_pairs: Vec<Option<PairOfKeyShares>>,
    pub(crate) own_self_share: ShamirShare,
    #[allow(dead_code)]
    pub(crate) self_prng_key: AesKey,
    pub(crate) session_id: SessionId,
    pub(crate) collaborators: Collaborators,
}

impl R3Unmasking {
    pub(crate) fn handle_message(self, message: &ServerToClientMessage) -> Outcome {
        match message {
            ServerToClientMessage::Abort { early_success, .. } => {
                Outcome::Transitioned(server_abort(self.collaborators, *early_success))
            }
            ServerToClientMessage::UnmaskingRequest { dead_3_client_ids } => {
                self.handle_unmasking_request(dead_3_client_ids)
            }
            _ => Outcome::Transitioned(unexpected_message(self.collaborators, "R3_UNMASKING")),
        }
    }

    /// Reveal noise shares for peers that died after committing pairwise
    /// masks, and self-seed shares for everyone who survived.
    fn handle_unmasking_request(mut self, dead_3_client_ids: &[u32]) -> Outcome {
        info!(
            "Handling the unmasking request for session {:?}; {} client(s) reported dead in Round 3.",
            self.session_id,
            dead_3_client_ids.len()
        );

        for &id in dead_3_client_ids {
            let id = id as usize;
            if id >= self.peers.len() {
                error!("Dead client id {id} is out of range");
                return Outcome::Transitioned(abort_with_notice(
                    self.collaborators,
                    INVALID_DEAD_CLIENT_MESSAGE.to_string(),
                ));
            }
            if id == self.peers.own_id() {
                error!("The server claims this client is dead, yet here we are");
                return Outcome::Transitioned(abort_with_notice(
                    self.collaborators,
                    SELF_IN_DEAD_LIST_MESSAGE.to_string(),
                ));
            }
            if !self.peers.is_alive(id) {
                // A duplicate entry lands here too.
                error!("Client {id} was already dead before Round 3");
                return Outcome::Transitioned(abort_with_notice(
                    self.collaborators,
                    ALREADY_DEAD_CLIENT_MESSAGE.to_string(),
                ));
            }
            if self
                .peers
                .mark_dead(id, OtherClientState::DeadAtRound3)
                .is_err()
            {
                return Outcome::Transitioned(internal_abort(
                    self.collaborators,
                    "liveness bookkeeping failed",
                ));
            }
            self.n_alive -= 1;
        }

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

        let noise_or_prf_key_shares = match self.reveal_shares() {
            Ok(shares) => shares,
            Err(_) => {
                return Outcome::Transitioned(internal_abort(
                    self.collaborators,
                    "share table is missing an entry for a surviving client",
                ))
            }
        };

        let mut collaborators = self.collaborators;
        collaborators.send(&ClientToServerMessage::UnmaskingResponse {
            noise_or_prf_key_shares,
        });
        collaborators.notify(ClientStateTag::Completed);

        info!("Unmasking response submitted; the protocol is complete for this client.");
        Outcome::Transitioned(ProtocolState::Completed(Completed::new(collaborators)))
    }

    fn reveal_shares(&self) -> Result<Vec<NoiseOrPrfShare>> {
        (0..self.peers.len())
            .map(|id| {
                if id == self.peers.own_id() {
                    return Ok(NoiseOrPrfShare::PrfSkShare(
                        self.own_self_share.as_bytes().to_vec(),
                    ));
                }
                match self.peers.state(id) {
                    OtherClientState::Alive => {
                        let pair = self.share_pairs[id]
                            .as_ref()
                            .ok_or(InternalError::InternalInvariantFailed)?;
                        Ok(NoiseOrPrfShare::PrfSkShare(
                            pair.prf_sk_share().as_bytes().to_vec(),
                        ))
                    }
                    OtherClientState::DeadAtRound3 => {
                        let pair = self.share_pairs[id]
                            .as_ref()
                            .ok_or(InternalError::InternalInvariantFailed)?;
                        Ok(NoiseOrPrfShare::NoiseSkShare(
                            pair.noise_sk_share().as_bytes().to_vec(),
                        ))
                    }
                    _ => Ok(NoiseOrPrfShare::Empty),
                }
            })
            .collect()
    }
}
