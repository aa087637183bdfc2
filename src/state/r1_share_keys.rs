// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    client::ClientConfig,
    crypto::{
        split_secret, AesGcmEncryption, AesKey, KeyAgreementPair, ShamirShare,
    },
    crypto::{ENCRYPTION_KEY_INFO, PRNG_SEED_INFO},
    errors::Result,
    messages::{
        ClientToServerMessage, PairOfKeyShares, PairOfPublicKeys, ServerToClientMessage,
    },
    peers::{OtherClientState, PeerTable},
    session::SessionId,
    state::{
        abort_with_notice, internal_abort, server_abort, unexpected_message, Collaborators,
        Outcome, ProtocolState, R2MaskedInputCollWaitingForInput,
        INSUFFICIENT_CLIENTS_MESSAGE,
    },
    transport::ClientStateTag,
};
use rand::{CryptoRng, RngCore};
use tracing::{error, info};
use zeroize::Zeroize;

const WRONG_NUMBER_OF_PUBLIC_KEYS_MESSAGE: &str =
    "Received the wrong number of public key pairs.";
const OWN_KEYS_MISSING_MESSAGE: &str =
    "The server did not send this client's public keys in the share keys request.";
const INVALID_PUBLIC_KEY_MESSAGE: &str =
    "Received an invalid public key in the share keys request.";

/// Round 1: keys are advertised; the client waits for the server to echo
/// everyone's public keys, then distributes encrypted key shares.
#[derive(Debug)]
pub(crate) struct R1ShareKeys {
    pub(crate) config: ClientConfig,
    pub(crate) enc_pair: KeyAgreementPair,
    pub(crate) prng_pair: KeyAgreementPair,
    pub(crate) collaborators: Collaborators,
}

impl R1ShareKeys {
    pub(crate) fn handle_message<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        message: &ServerToClientMessage,
    ) -> Outcome {
        match message {
            ServerToClientMessage::Abort { early_success, .. } => {
                Outcome::Transitioned(server_abort(self.collaborators, *early_success))
            }
            ServerToClientMessage::ShareKeysRequest {
                pairs_of_public_keys,
            } => self.handle_share_keys_request(rng, pairs_of_public_keys),
            _ => Outcome::Transitioned(unexpected_message(self.collaborators, "R1_SHARE_KEYS")),
        }
    }

    /// The Round 1 work: find our slot, derive per-peer keys, split our two
    /// secrets, and hand each surviving peer its encrypted share pair.
    fn handle_share_keys_request<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        pairs: &[PairOfPublicKeys],
    ) -> Outcome {
        info!("Handling the share keys request.");

        let n_total = self.config.number_of_clients() as usize;
        if pairs.len() != n_total {
            error!(
                "Expected {} public key pairs, received {}",
                n_total,
                pairs.len()
            );
            return Outcome::Transitioned(abort_with_notice(
                self.collaborators,
                WRONG_NUMBER_OF_PUBLIC_KEYS_MESSAGE.to_string(),
            ));
        }

        let own_pair = PairOfPublicKeys {
            enc_pk: self.enc_pair.public_bytes().to_vec(),
            prng_pk: self.prng_pair.public_bytes().to_vec(),
        };
        let mut own_slots = pairs.iter().enumerate().filter(|(_, p)| **p == own_pair);
        let client_id = match (own_slots.next(), own_slots.next()) {
            (Some((id, _)), None) => id,
            _ => {
                error!("This client's keys appear in zero or multiple slots");
                return Outcome::Transitioned(abort_with_notice(
                    self.collaborators,
                    OWN_KEYS_MISSING_MESSAGE.to_string(),
                ));
            }
        };

        let session_id = SessionId::derive(pairs);

        let states: Vec<OtherClientState> = pairs
            .iter()
            .map(|pair| {
                if pair.is_empty() {
                    OtherClientState::DeadAtRound1
                } else {
                    OtherClientState::Alive
                }
            })
            .collect();
        let n_alive = states
            .iter()
            .filter(|s| **s == OtherClientState::Alive)
            .count() as u32;
        if n_alive < self.config.min_surviving() {
            return Outcome::Transitioned(abort_with_notice(
                self.collaborators,
                INSUFFICIENT_CLIENTS_MESSAGE.to_string(),
            ));
        }

        // Pairwise key derivation. A present-but-malformed public key is a
        // server-side protocol violation, not a peer dropout.
        let mut enc_keys = Vec::with_capacity(n_total);
        let mut prng_keys = Vec::with_capacity(n_total);
        for (id, pair) in pairs.iter().enumerate() {
            if id == client_id || pair.is_empty() {
                enc_keys.push(AesKey::sentinel());
                prng_keys.push(AesKey::sentinel());
                continue;
            }
            let derived = self
                .enc_pair
                .derive_key(&pair.enc_pk, ENCRYPTION_KEY_INFO)
                .and_then(|enc_key| {
                    let prng_key =
                        self.prng_pair.derive_key(&pair.prng_pk, PRNG_SEED_INFO)?;
                    Ok((enc_key, prng_key))
                });
            match derived {
                Ok((enc_key, prng_key)) => {
                    enc_keys.push(enc_key);
                    prng_keys.push(prng_key);
                }
                Err(_) => {
                    return Outcome::Transitioned(abort_with_notice(
                        self.collaborators,
                        INVALID_PUBLIC_KEY_MESSAGE.to_string(),
                    ));
                }
            }
        }

        let self_prng_key = AesKey::random(rng);
        let shares = self.deal_shares(&self_prng_key, n_total);
        let (noise_shares, prf_shares) = match shares {
            Ok(shares) => shares,
            Err(_) => {
                return Outcome::Transitioned(internal_abort(
                    self.collaborators,
                    "threshold sharing failed",
                ));
            }
        };
        let own_self_share = prf_shares[client_id].clone();

        let mut encrypted_key_shares = Vec::with_capacity(n_total);
        for id in 0..n_total {
            if id == client_id || states[id] != OtherClientState::Alive {
                encrypted_key_shares.push(Vec::new());
                continue;
            }
            let pair = PairOfKeyShares::new(noise_shares[id].clone(), prf_shares[id].clone());
            let mut plaintext = pair.into_bytes();
            let envelope = AesGcmEncryption::encrypt(&enc_keys[id], &plaintext, rng);
            plaintext.zeroize();
            match envelope {
                Ok(envelope) => encrypted_key_shares.push(envelope),
                Err(_) => {
                    return Outcome::Transitioned(internal_abort(
                        self.collaborators,
                        "envelope encryption failed",
                    ));
                }
            }
        }

        let peers = match PeerTable::new(client_id, states, enc_keys, prng_keys) {
            Ok(peers) => peers,
            Err(_) => {
                return Outcome::Transitioned(internal_abort(
                    self.collaborators,
                    "peer table construction failed",
                ));
            }
        };

        let mut collaborators = self.collaborators;
        collaborators.send(&ClientToServerMessage::ShareKeysResponse {
            encrypted_key_shares,
        });
        collaborators.notify(ClientStateTag::R2MaskedInputCollection);

        info!(
            "Round 1 complete as client {}; {} of {} clients alive.",
            client_id, n_alive, n_total
        );
        Outcome::Transitioned(ProtocolState::R2WaitingForInput(
            R2MaskedInputCollWaitingForInput {
                tolerate_missing_key_shares: self.config.tolerates_missing_key_shares(),
                min_surviving: self.config.min_surviving(),
                n_alive,
                specs: self.config.into_vector_specs(),
                peers,
                own_self_share,
                self_prng_key,
                session_id,
                pending_request: None,
                collaborators,
            },
        ))
    }

    /// Shamir-split the pairwise-mask secret and the self seed; share `i`
    /// of each is addressed to client `i`.
    fn deal_shares(
        &self,
        self_prng_key: &AesKey,
        n_total: usize,
    ) -> Result<(Vec<ShamirShare>, Vec<ShamirShare>)> {
        let threshold = self.config.min_surviving();
        let noise_secret = self.prng_pair.secret_bytes();
        let noise_shares = split_secret(&*noise_secret, threshold, n_total as u32)?;
        let prf_shares = split_secret(self_prng_key.as_bytes(), threshold, n_total as u32)?;
        Ok((noise_shares, prf_shares))
    }
}
