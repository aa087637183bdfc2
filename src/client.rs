// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    cancellation::AbortSignal,
    crypto::AesPrngFactory,
    errors::{CallerError, InternalError, Result},
    messages::ServerToClientMessage,
    state::{Collaborators, Outcome, ProtocolState, R0AdvertiseKeys},
    transport::{SendToServer, StateTransitionListener},
    vector::{SecAggVectorMap, VectorSpec},
};
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;
use tracing::error;

/// Session parameters fixed before the protocol starts.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    number_of_clients: u32,
    min_surviving: u32,
    vector_specs: Vec<VectorSpec>,
    tolerate_missing_key_shares: bool,
}

impl ClientConfig {
    /// Create a configuration for a session of `number_of_clients` clients,
    /// of which at least `min_surviving` must survive for the sum to be
    /// recoverable.
    ///
    /// At most 255 clients are supported per session (the threshold shares
    /// are dealt over GF(2^8)); `min_surviving` must be at least 2 and at
    /// most `number_of_clients`; vector names must be unique.
    pub fn new(
        number_of_clients: u32,
        min_surviving: u32,
        vector_specs: Vec<VectorSpec>,
    ) -> Result<Self> {
        if !(2..=255).contains(&number_of_clients) {
            error!("Unsupported number of clients: {number_of_clients}");
            Err(CallerError::InvalidArgument)?;
        }
        if min_surviving < 2 || min_surviving > number_of_clients {
            error!(
                "Survival threshold {} is invalid for {} clients",
                min_surviving, number_of_clients
            );
            Err(CallerError::InvalidArgument)?;
        }
        let mut names = HashSet::new();
        if !vector_specs.iter().all(|spec| names.insert(spec.name())) {
            error!("Vector specs contain a duplicate name");
            Err(CallerError::InvalidArgument)?;
        }
        Ok(Self {
            number_of_clients,
            min_surviving,
            vector_specs,
            tolerate_missing_key_shares: false,
        })
    }

    /// Tolerate a masked-input request carrying *fewer* envelopes than there
    /// are clients by treating the missing slots as dropped peers. Off by
    /// default: a mismatched count aborts the session. An overlong list
    /// always aborts, as it implies disagreement about the session size.
    pub fn tolerate_missing_key_shares(mut self, tolerate: bool) -> Self {
        self.tolerate_missing_key_shares = tolerate;
        self
    }

    pub(crate) fn number_of_clients(&self) -> u32 {
        self.number_of_clients
    }

    pub(crate) fn min_surviving(&self) -> u32 {
        self.min_surviving
    }

    pub(crate) fn tolerates_missing_key_shares(&self) -> bool {
        self.tolerate_missing_key_shares
    }

    pub(crate) fn into_vector_specs(self) -> Vec<VectorSpec> {
        self.vector_specs
    }
}

/// The secure aggregation client engine.
///
/// Holds the current protocol state and drives it with the calling
/// application's actions ([`start`](Self::start), [`set_input`](Self::set_input),
/// [`abort`](Self::abort)) and inbound server messages
/// ([`handle_message`](Self::handle_message)). Each call either moves the
/// engine to a successor state or leaves it unchanged and returns an error;
/// the transition listener is told about every state change, after any
/// outbound message has been sent.
///
/// The engine is not internally synchronized; callers deliver one operation
/// at a time. The optional [`AbortSignal`] is the one piece of shared state:
/// another thread may raise it to cancel a long mask computation.
pub struct SecAggClient {
    state: Option<ProtocolState>,
}

impl SecAggClient {
    /// Build a client in the initial (Round 0) state.
    pub fn new(
        config: ClientConfig,
        sender: Box<dyn SendToServer>,
        listener: Box<dyn StateTransitionListener>,
        prng_factory: Box<dyn AesPrngFactory>,
        abort_signal: Option<AbortSignal>,
    ) -> Self {
        let collaborators = Collaborators {
            sender,
            listener,
            prng_factory,
            abort_signal,
        };
        Self {
            state: Some(ProtocolState::R0AdvertiseKeys(R0AdvertiseKeys {
                config,
                collaborators,
            })),
        }
    }

    /// Begin the protocol by advertising this client's key pairs. Allowed
    /// only once, in the initial state.
    pub fn start<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<()> {
        let state = self.take_state()?;
        self.apply(state.start(rng))
    }

    /// Provide the input vectors for this session. Allowed only in Round 2,
    /// before the input was set.
    pub fn set_input(&mut self, input_map: SecAggVectorMap) -> Result<()> {
        let state = self.take_state()?;
        self.apply(state.set_input(input_map))
    }

    /// Deliver an inbound server message to the current state.
    pub fn handle_message<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        message: &ServerToClientMessage,
    ) -> Result<()> {
        let state = self.take_state()?;
        self.apply(state.handle_message(rng, message))
    }

    /// Abort the session. In a non-terminal state this notifies the server
    /// and transitions to Aborted; in a terminal state it is a no-op.
    pub fn abort(&mut self, reason: &str) -> Result<()> {
        let state = self.take_state()?;
        self.apply(state.abort(reason))
    }

    /// The fixed name of the current state, e.g.
    /// `"R2_MASKED_INPUT_COLL_INPUT_SET"`.
    pub fn state_name(&self) -> &'static str {
        self.state
            .as_ref()
            .map(ProtocolState::state_name)
            .unwrap_or("UNKNOWN")
    }

    /// True only in the Aborted state.
    pub fn is_aborted(&self) -> bool {
        self.state
            .as_ref()
            .map(ProtocolState::is_aborted)
            .unwrap_or(false)
    }

    /// True only in the Completed state.
    pub fn is_completed_successfully(&self) -> bool {
        self.state
            .as_ref()
            .map(ProtocolState::is_completed_successfully)
            .unwrap_or(false)
    }

    /// The diagnostic that ended the session. Valid only once aborted.
    pub fn error_message(&self) -> Result<&str> {
        self.state
            .as_ref()
            .ok_or(InternalError::InternalInvariantFailed)?
            .error_message()
    }

    fn take_state(&mut self) -> Result<ProtocolState> {
        self.state.take().ok_or_else(|| {
            error!("The protocol state was lost by a previous panic");
            InternalError::InternalInvariantFailed
        })
    }

    fn apply(&mut self, outcome: Outcome) -> Result<()> {
        match outcome {
            Outcome::Transitioned(state) => {
                self.state = Some(state);
                Ok(())
            }
            Outcome::Rejected { state, error } => {
                self.state = Some(state);
                Err(error)
            }
            Outcome::Cancelled(state) => {
                self.state = Some(state);
                Err(InternalError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::{AesCtrPrngFactory, PRNG_SEED_INFO},
        masks::map_of_masks,
        messages::{ClientToServerMessage, NoiseOrPrfShare, PairOfPublicKeys},
        session::SessionId,
        transport::ClientStateTag,
        utils::testing::init_testing,
        vector::SecAggVector,
    };
    use hkdf::Hkdf;
    use rand::rngs::StdRng;
    use sha2::Sha256;
    use sharks::{Share, Sharks};
    use std::{cell::RefCell, rc::Rc};

    struct MockSender(Rc<RefCell<Vec<ClientToServerMessage>>>);

    impl SendToServer for MockSender {
        fn send(&mut self, message: &ClientToServerMessage) {
            self.0.borrow_mut().push(message.clone());
        }
    }

    struct MockListener(Rc<RefCell<Vec<ClientStateTag>>>);

    impl StateTransitionListener for MockListener {
        fn transition(&mut self, new_state: ClientStateTag) {
            self.0.borrow_mut().push(new_state);
        }
    }

    struct TestClient {
        engine: SecAggClient,
        sent: Rc<RefCell<Vec<ClientToServerMessage>>>,
        transitions: Rc<RefCell<Vec<ClientStateTag>>>,
    }

    fn specs() -> Vec<VectorSpec> {
        vec![VectorSpec::new("test", 4, 32).unwrap()]
    }

    fn test_client(n: u32, t: u32) -> TestClient {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let transitions = Rc::new(RefCell::new(Vec::new()));
        let engine = SecAggClient::new(
            ClientConfig::new(n, t, specs()).unwrap(),
            Box::new(MockSender(Rc::clone(&sent))),
            Box::new(MockListener(Rc::clone(&transitions))),
            Box::new(AesCtrPrngFactory),
            None,
        );
        TestClient {
            engine,
            sent,
            transitions,
        }
    }

    fn input(elements: Vec<u64>) -> SecAggVectorMap {
        let mut map = SecAggVectorMap::new();
        map.insert(
            "test".to_string(),
            SecAggVector::new(elements, 32).unwrap(),
        );
        map
    }

    #[test]
    fn config_is_validated() {
        assert!(ClientConfig::new(4, 3, specs()).is_ok());
        assert!(ClientConfig::new(1, 1, specs()).is_err());
        assert!(ClientConfig::new(4, 1, specs()).is_err());
        assert!(ClientConfig::new(4, 5, specs()).is_err());
        assert!(ClientConfig::new(256, 3, specs()).is_err());

        let duplicated = vec![
            VectorSpec::new("test", 4, 32).unwrap(),
            VectorSpec::new("test", 8, 64).unwrap(),
        ];
        assert!(ClientConfig::new(4, 3, duplicated).is_err());
    }

    #[test]
    fn operations_out_of_order_are_rejected_without_transition() {
        let rng = &mut init_testing();
        let mut client = test_client(4, 3);
        let precondition = Err(InternalError::CallingApplicationMistake(
            CallerError::FailedPrecondition,
        ));

        assert_eq!(client.engine.state_name(), "R0_ADVERTISE_KEYS");
        assert_eq!(client.engine.set_input(input(vec![0; 4])), precondition);
        assert_eq!(client.engine.state_name(), "R0_ADVERTISE_KEYS");
        assert_eq!(
            client.engine.error_message(),
            Err(InternalError::CallingApplicationMistake(
                CallerError::FailedPrecondition,
            ))
        );

        client.engine.start(rng).unwrap();
        assert_eq!(client.engine.state_name(), "R1_SHARE_KEYS");
        assert_eq!(client.engine.start(rng), precondition);
        assert_eq!(client.engine.state_name(), "R1_SHARE_KEYS");

        // No transitions were reported for the rejected calls.
        assert_eq!(
            *client.transitions.borrow(),
            vec![ClientStateTag::R1ShareKeys]
        );
    }

    #[test]
    fn external_abort_notifies_the_server() {
        let rng = &mut init_testing();
        let mut client = test_client(4, 3);
        client.engine.start(rng).unwrap();

        client.engine.abort("Abort reason").unwrap();
        assert!(client.engine.is_aborted());
        assert!(!client.engine.is_completed_successfully());
        assert_eq!(client.engine.state_name(), "ABORTED");

        let expected = "Abort upon external request for reason <Abort reason>.";
        assert_eq!(client.engine.error_message().unwrap(), expected);
        match client.sent.borrow().last().unwrap() {
            ClientToServerMessage::Abort { diagnostic_info } => {
                assert_eq!(diagnostic_info, expected)
            }
            other => panic!("unexpected message {other:?}"),
        }

        // Aborting again is a no-op that keeps the original diagnostic.
        let sent_before = client.sent.borrow().len();
        client.engine.abort("second reason").unwrap();
        assert_eq!(client.engine.error_message().unwrap(), expected);
        assert_eq!(client.sent.borrow().len(), sent_before);
    }

    #[test]
    fn state_predicates_match_state_names() {
        let rng = &mut init_testing();
        let mut client = test_client(4, 3);
        for _ in 0..2 {
            assert_eq!(
                client.engine.is_aborted(),
                client.engine.state_name() == "ABORTED"
            );
            assert_eq!(
                client.engine.is_completed_successfully(),
                client.engine.state_name() == "COMPLETED"
            );
            client.engine.start(rng).ok();
            client.engine.abort("checking predicates").ok();
        }
        assert!(client.engine.is_aborted());
    }

    // ---------------------------------------------------------------------
    // Full-session simulation. The "server" below relays messages between
    // four engines and finally recombines shares to check that the sum of
    // the masked inputs unmasks to the sum of the plain inputs.
    // ---------------------------------------------------------------------

    fn last_sent(client: &TestClient) -> ClientToServerMessage {
        client.sent.borrow().last().unwrap().clone()
    }

    /// Drive `clients` through Rounds 0-2. Returns the advertised key pairs
    /// and each client's masked "test" vector, as collected by the server.
    /// `late_dead` clients have their Round 2 envelopes withheld.
    fn run_through_round_2(
        rng: &mut StdRng,
        clients: &mut [TestClient],
        inputs: &[Vec<u64>],
        dead_at_r2: &[usize],
    ) -> (Vec<PairOfPublicKeys>, Vec<Vec<u64>>) {
        let n = clients.len();

        // Round 0: collect advertised keys.
        let mut pairs = Vec::new();
        for client in clients.iter_mut() {
            client.engine.start(rng).unwrap();
            match last_sent(client) {
                ClientToServerMessage::AdvertiseKeys {
                    pair_of_public_keys,
                } => pairs.push(pair_of_public_keys),
                other => panic!("unexpected message {other:?}"),
            }
        }

        // Round 1: echo the key list; collect the encrypted share lists.
        let request = ServerToClientMessage::ShareKeysRequest {
            pairs_of_public_keys: pairs.clone(),
        };
        let mut share_lists = Vec::new();
        for client in clients.iter_mut() {
            client.engine.handle_message(rng, &request).unwrap();
            match last_sent(client) {
                ClientToServerMessage::ShareKeysResponse {
                    encrypted_key_shares,
                } => share_lists.push(encrypted_key_shares),
                other => panic!("unexpected message {other:?}"),
            }
        }

        // Round 2: set inputs, then route envelope (from j, to i) to i.
        let mut masked = Vec::new();
        for (i, client) in clients.iter_mut().enumerate() {
            client.engine.set_input(input(inputs[i].clone())).unwrap();
            if dead_at_r2.contains(&i) {
                masked.push(Vec::new());
                continue;
            }
            let encrypted_key_shares: Vec<Vec<u8>> = (0..n)
                .map(|j| {
                    if dead_at_r2.contains(&j) {
                        Vec::new()
                    } else {
                        share_lists[j][i].clone()
                    }
                })
                .collect();
            client
                .engine
                .handle_message(
                    rng,
                    &ServerToClientMessage::MaskedInputRequest {
                        encrypted_key_shares,
                    },
                )
                .unwrap();
            assert_eq!(client.engine.state_name(), "R3_UNMASKING");
            match last_sent(client) {
                ClientToServerMessage::MaskedInputResponse { vectors } => {
                    let vector = SecAggVector::from_packed_bytes(
                        vectors["test"].encoded_vector.clone(),
                        4,
                        32,
                    )
                    .unwrap();
                    masked.push(vector.as_u64_vector());
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
        (pairs, masked)
    }

    /// Recover a secret from per-client share bytes via the (t, n) scheme.
    fn recover_secret(shares: &[Vec<u8>], threshold: u8) -> [u8; 32] {
        let shares: Vec<Share> = shares
            .iter()
            .map(|bytes| Share::try_from(bytes.as_slice()).unwrap())
            .collect();
        let recovered = Sharks(threshold).recover(shares.as_slice()).unwrap();
        recovered.try_into().unwrap()
    }

    /// The self mask a client derived from `self_prng_key`.
    fn self_mask(self_prng_key: [u8; 32], session_id: &SessionId) -> Vec<u64> {
        let masks = map_of_masks(
            &[crate::crypto::AesKey::from_bytes(self_prng_key)],
            &[],
            &specs(),
            session_id,
            &AesCtrPrngFactory,
            None,
        )
        .unwrap();
        masks["test"].as_u64_vector()
    }

    #[test]
    fn full_session_unmasks_to_the_sum_of_inputs() {
        let rng = &mut init_testing();
        let n = 4usize;
        let inputs: Vec<Vec<u64>> = (0..n as u64)
            .map(|i| vec![i, 2 * i, 3 * i + 1, 7])
            .collect();
        let mut clients: Vec<TestClient> = (0..n).map(|_| test_client(4, 3)).collect();

        let (pairs, masked) = run_through_round_2(rng, &mut clients, &inputs, &[]);
        let session_id = SessionId::derive(&pairs);

        // Round 3: nobody else died; collect everyone's revealed shares.
        let request = ServerToClientMessage::UnmaskingRequest {
            dead_3_client_ids: vec![],
        };
        let mut reveals = Vec::new();
        for client in clients.iter_mut() {
            client.engine.handle_message(rng, &request).unwrap();
            assert!(client.engine.is_completed_successfully());
            match last_sent(client) {
                ClientToServerMessage::UnmaskingResponse {
                    noise_or_prf_key_shares,
                } => reveals.push(noise_or_prf_key_shares),
                other => panic!("unexpected message {other:?}"),
            }
        }

        // Server side: sum the masked inputs...
        let mut sum = vec![0u64; 4];
        for vector in &masked {
            for (slot, &element) in sum.iter_mut().zip(vector.iter()) {
                *slot = (*slot + element) % 32;
            }
        }

        // ...peel off each client's self mask, reconstructed from the
        // revealed prf shares (pairwise masks cancel pairwise)...
        for target in 0..n {
            let shares: Vec<Vec<u8>> = reveals
                .iter()
                .map(|reveal| match &reveal[target] {
                    NoiseOrPrfShare::PrfSkShare(bytes) => bytes.clone(),
                    other => panic!("expected a prf share, got {other:?}"),
                })
                .collect();
            let self_key = recover_secret(&shares, 3);
            let mask = self_mask(self_key, &session_id);
            for (slot, element) in sum.iter_mut().zip(mask) {
                *slot = (*slot + 32 - element) % 32;
            }
        }

        // ...and what remains is the plain sum of everyone's inputs.
        let mut expected = vec![0u64; 4];
        for input in &inputs {
            for (slot, &element) in expected.iter_mut().zip(input.iter()) {
                *slot = (*slot + element) % 32;
            }
        }
        assert_eq!(sum, expected);

        // Every client saw the same forward transition sequence.
        for client in &clients {
            assert_eq!(
                *client.transitions.borrow(),
                vec![
                    ClientStateTag::R1ShareKeys,
                    ClientStateTag::R2MaskedInputCollection,
                    ClientStateTag::R2MaskedInputCollection,
                    ClientStateTag::R3Unmasking,
                    ClientStateTag::Completed,
                ]
            );
        }
    }

    #[test]
    fn round_3_dropout_is_repaired_with_noise_shares() {
        // Client 3 submits nothing in Round 2 from the server's point of
        // view (it is listed dead at Round 3), so the survivors' unmatched
        // pairwise masks must be rebuilt from its reconstructed secret.
        let rng = &mut init_testing();
        let n = 4usize;
        let dead = 3usize;
        let inputs: Vec<Vec<u64>> = (0..n as u64)
            .map(|i| vec![i, i + 1, 5, 31])
            .collect();
        let mut clients: Vec<TestClient> = (0..n).map(|_| test_client(4, 3)).collect();

        let (pairs, masked) = run_through_round_2(rng, &mut clients, &inputs, &[]);
        let session_id = SessionId::derive(&pairs);

        let request = ServerToClientMessage::UnmaskingRequest {
            dead_3_client_ids: vec![dead as u32],
        };
        let mut reveals = Vec::new();
        for (i, client) in clients.iter_mut().enumerate() {
            if i == dead {
                continue;
            }
            client.engine.handle_message(rng, &request).unwrap();
            match last_sent(client) {
                ClientToServerMessage::UnmaskingResponse {
                    noise_or_prf_key_shares,
                } => reveals.push(noise_or_prf_key_shares),
                other => panic!("unexpected message {other:?}"),
            }
        }

        // Sum only the survivors' masked inputs.
        let mut sum = vec![0u64; 4];
        for (i, vector) in masked.iter().enumerate() {
            if i == dead {
                continue;
            }
            for (slot, &element) in sum.iter_mut().zip(vector.iter()) {
                *slot = (*slot + element) % 32;
            }
        }

        // Remove the survivors' self masks.
        for target in (0..n).filter(|&i| i != dead) {
            let shares: Vec<Vec<u8>> = reveals
                .iter()
                .map(|reveal| match &reveal[target] {
                    NoiseOrPrfShare::PrfSkShare(bytes) => bytes.clone(),
                    other => panic!("expected a prf share, got {other:?}"),
                })
                .collect();
            let self_key = recover_secret(&shares, 3);
            let mask = self_mask(self_key, &session_id);
            for (slot, element) in sum.iter_mut().zip(mask) {
                *slot = (*slot + 32 - element) % 32;
            }
        }

        // Reconstruct the dead client's masking secret from the revealed
        // noise shares and rebuild the pairwise masks the survivors
        // subtracted but nobody added.
        let noise_shares: Vec<Vec<u8>> = reveals
            .iter()
            .map(|reveal| match &reveal[dead] {
                NoiseOrPrfShare::NoiseSkShare(bytes) => bytes.clone(),
                other => panic!("expected a noise share, got {other:?}"),
            })
            .collect();
        let dead_secret = x25519_dalek::StaticSecret::from(recover_secret(&noise_shares, 3));

        let pairwise_seeds: Vec<crate::crypto::AesKey> = (0..n)
            .filter(|&i| i != dead)
            .map(|survivor| {
                let survivor_pk: [u8; 32] =
                    pairs[survivor].prng_pk.clone().try_into().unwrap();
                let shared =
                    dead_secret.diffie_hellman(&x25519_dalek::PublicKey::from(survivor_pk));
                let mut key = [0u8; 32];
                Hkdf::<Sha256>::new(None, shared.as_bytes())
                    .expand(PRNG_SEED_INFO, &mut key)
                    .unwrap();
                crate::crypto::AesKey::from_bytes(key)
            })
            .collect();
        // The dead client had the highest id, so every survivor subtracted
        // its pairwise stream; add them all back.
        let repair = map_of_masks(
            &pairwise_seeds,
            &[],
            &specs(),
            &session_id,
            &AesCtrPrngFactory,
            None,
        )
        .unwrap();
        for (slot, element) in sum.iter_mut().zip(repair["test"].as_u64_vector()) {
            *slot = (*slot + element) % 32;
        }

        let mut expected = vec![0u64; 4];
        for (i, input) in inputs.iter().enumerate() {
            if i == dead {
                continue;
            }
            for (slot, &element) in expected.iter_mut().zip(input.iter()) {
                *slot = (*slot + element) % 32;
            }
        }
        assert_eq!(sum, expected);
    }

    #[test]
    fn round_2_dropout_needs_no_repair() {
        // Client 3 drops before delivering its envelopes: the survivors
        // exclude its pairwise seeds up front, so prf shares alone unmask.
        let rng = &mut init_testing();
        let n = 4usize;
        let dead = 3usize;
        let inputs: Vec<Vec<u64>> = (0..n as u64).map(|i| vec![i; 4]).collect();
        let mut clients: Vec<TestClient> = (0..n).map(|_| test_client(4, 3)).collect();

        let (pairs, masked) = run_through_round_2(rng, &mut clients, &inputs, &[dead]);
        let session_id = SessionId::derive(&pairs);

        let request = ServerToClientMessage::UnmaskingRequest {
            dead_3_client_ids: vec![],
        };
        let mut reveals = Vec::new();
        for (i, client) in clients.iter_mut().enumerate() {
            if i == dead {
                continue;
            }
            client.engine.handle_message(rng, &request).unwrap();
            match last_sent(client) {
                ClientToServerMessage::UnmaskingResponse {
                    noise_or_prf_key_shares,
                } => {
                    assert_eq!(noise_or_prf_key_shares[dead], NoiseOrPrfShare::Empty);
                    reveals.push(noise_or_prf_key_shares);
                }
                other => panic!("unexpected message {other:?}"),
            }
        }

        let mut sum = vec![0u64; 4];
        for (i, vector) in masked.iter().enumerate() {
            if i == dead {
                continue;
            }
            for (slot, &element) in sum.iter_mut().zip(vector.iter()) {
                *slot = (*slot + element) % 32;
            }
        }
        for target in (0..n).filter(|&i| i != dead) {
            let shares: Vec<Vec<u8>> = reveals
                .iter()
                .map(|reveal| match &reveal[target] {
                    NoiseOrPrfShare::PrfSkShare(bytes) => bytes.clone(),
                    other => panic!("expected a prf share, got {other:?}"),
                })
                .collect();
            let self_key = recover_secret(&shares, 3);
            let mask = self_mask(self_key, &session_id);
            for (slot, element) in sum.iter_mut().zip(mask) {
                *slot = (*slot + 32 - element) % 32;
            }
        }

        let mut expected = vec![0u64; 4];
        for (i, input) in inputs.iter().enumerate() {
            if i == dead {
                continue;
            }
            for (slot, &element) in expected.iter_mut().zip(input.iter()) {
                *slot = (*slot + element) % 32;
            }
        }
        assert_eq!(sum, expected);
    }
}
