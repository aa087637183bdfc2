// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    crypto::{AesKey, ShamirShare},
    errors::CallerError,
    messages::ServerToClientMessage,
    peers::PeerTable,
    session::SessionId,
    state::{
        server_abort, unexpected_message, Collaborators, Outcome, ProtocolState,
        R2MaskedInputCollInputSet,
    },
    transport::ClientStateTag,
    vector::{SecAggVectorMap, VectorSpec},
};
use tracing::{error, info};

/// Round 2 before the calling application has provided its input.
///
/// A masked-input request that races ahead of `set_input` is stashed here
/// and replayed the moment the input arrives.
#[derive(Debug)]
pub(crate) struct R2MaskedInputCollWaitingForInput {
    pub(crate) tolerate_missing_key_shares: bool,
    pub(crate) min_surviving: u32,
    pub(crate) n_alive: u32,
    pub(crate) specs: Vec<VectorSpec>,
    pub(crate) peers: PeerTable,
    pub(crate) own_self_share: ShamirShare,
    pub(crate) self_prng_key: AesKey,
    pub(crate) session_id: SessionId,
    pub(crate) pending_request: Option<Vec<Vec<u8>>>,
    pub(crate) collaborators: Collaborators,
}

impl R2MaskedInputCollWaitingForInput {
    /// Validate the input against the configured specs and move to the
    /// input-set state. A stashed masked-input request is processed
    /// immediately afterwards.
    pub(crate) fn set_input(mut self, input_map: SecAggVectorMap) -> Outcome {
        if let Err(error) = validate_input(&input_map, &self.specs) {
            return Outcome::Rejected {
                state: ProtocolState::R2WaitingForInput(self),
                error: error.into(),
            };
        }
        info!("Input set for {} vector(s).", input_map.len());

        self.collaborators
            .notify(ClientStateTag::R2MaskedInputCollection);
        let pending_request = self.pending_request.take();
        let input_set = R2MaskedInputCollInputSet {
            tolerate_missing_key_shares: self.tolerate_missing_key_shares,
            min_surviving: self.min_surviving,
            n_alive: self.n_alive,
            input_map,
            specs: self.specs,
            peers: self.peers,
            own_self_share: self.own_self_share,
            self_prng_key: self.self_prng_key,
            session_id: self.session_id,
            collaborators: self.collaborators,
        };

        match pending_request {
            Some(encrypted_key_shares) => {
                info!("Replaying the masked input request received before the input.");
                input_set.handle_masked_input_request(&encrypted_key_shares)
            }
            None => Outcome::Transitioned(ProtocolState::R2InputSet(input_set)),
        }
    }

    pub(crate) fn handle_message(mut self, message: &ServerToClientMessage) -> Outcome {
        match message {
            ServerToClientMessage::Abort { early_success, .. } => {
                Outcome::Transitioned(server_abort(self.collaborators, *early_success))
            }
            ServerToClientMessage::MaskedInputRequest {
                encrypted_key_shares,
            } => {
                if self.pending_request.is_some() {
                    error!("Received a second masked input request before the input was set");
                    return Outcome::Transitioned(unexpected_message(
                        self.collaborators,
                        "R2_MASKED_INPUT_COLL_WAITING_FOR_INPUT",
                    ));
                }
                info!("Stashing a masked input request until the input is set.");
                self.pending_request = Some(encrypted_key_shares.clone());
                self.collaborators
                    .notify(ClientStateTag::R2MaskedInputCollection);
                Outcome::Transitioned(ProtocolState::R2WaitingForInput(self))
            }
            _ => Outcome::Transitioned(unexpected_message(
                self.collaborators,
                "R2_MASKED_INPUT_COLL_WAITING_FOR_INPUT",
            )),
        }
    }
}

/// Check that the input map matches the configured specs exactly: same key
/// set, same lengths, same moduli. Element bounds are already guaranteed by
/// the [`crate::vector::SecAggVector`] invariant.
fn validate_input(
    input_map: &SecAggVectorMap,
    specs: &[VectorSpec],
) -> std::result::Result<(), CallerError> {
    if input_map.len() != specs.len() {
        error!(
            "Input map has {} vectors; the configuration names {}",
            input_map.len(),
            specs.len()
        );
        return Err(CallerError::InvalidArgument);
    }
    for spec in specs {
        let vector = input_map.get(spec.name()).ok_or_else(|| {
            error!("Input map is missing vector {:?}", spec.name());
            CallerError::InvalidArgument
        })?;
        if vector.num_elements() != spec.length() || vector.modulus() != spec.modulus() {
            error!(
                "Input vector {:?} has shape ({}, {}); expected ({}, {})",
                spec.name(),
                vector.num_elements(),
                vector.modulus(),
                spec.length(),
                spec.modulus()
            );
            return Err(CallerError::InvalidArgument);
        }
    }
    Ok(())
}
