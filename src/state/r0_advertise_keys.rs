// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    client::ClientConfig,
    crypto::KeyAgreementPair,
    messages::{ClientToServerMessage, PairOfPublicKeys, ServerToClientMessage},
    state::{
        server_abort, unexpected_message, Collaborators, Outcome, ProtocolState, R1ShareKeys,
    },
    transport::ClientStateTag,
};
use rand::{CryptoRng, RngCore};
use tracing::info;

/// Round 0: the client has been configured but has not yet advertised its
/// key pairs. This is the only state in which `start()` is allowed.
#[derive(Debug)]
pub(crate) struct R0AdvertiseKeys {
    pub(crate) config: ClientConfig,
    pub(crate) collaborators: Collaborators,
}

impl R0AdvertiseKeys {
    /// Generate both key pairs, advertise their public halves, and move to
    /// Round 1 owning the secret halves.
    pub(crate) fn start<R: RngCore + CryptoRng>(mut self, rng: &mut R) -> ProtocolState {
        info!("Starting the session; advertising key pairs.");

        let enc_pair = KeyAgreementPair::generate(rng);
        let prng_pair = KeyAgreementPair::generate(rng);

        self.collaborators.send(&ClientToServerMessage::AdvertiseKeys {
            pair_of_public_keys: PairOfPublicKeys {
                enc_pk: enc_pair.public_bytes().to_vec(),
                prng_pk: prng_pair.public_bytes().to_vec(),
            },
        });
        self.collaborators.notify(ClientStateTag::R1ShareKeys);

        ProtocolState::R1ShareKeys(R1ShareKeys {
            config: self.config,
            enc_pair,
            prng_pair,
            collaborators: self.collaborators,
        })
    }

    pub(crate) fn handle_message(self, message: &ServerToClientMessage) -> Outcome {
        match message {
            ServerToClientMessage::Abort { early_success, .. } => {
                Outcome::Transitioned(server_abort(self.collaborators, *early_success))
            }
            _ => Outcome::Transitioned(unexpected_message(
                self.collaborators,
                "R0_ADVERTISE_KEYS",
            )),
        }
    }
}
