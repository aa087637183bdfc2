// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Collaborator seams consumed by the protocol engine.
//!
//! The engine never talks to a network or a UI directly; it hands outbound
//! messages to a [`SendToServer`] sink and reports state changes to a
//! [`StateTransitionListener`]. Both are fire-and-forget: a failing
//! implementation must handle the failure itself, it cannot roll back a
//! state transition.

use crate::messages::ClientToServerMessage;

/// Coarse state tags reported to the transition listener.
///
/// Both Round 2 states report the same tag; the listener sees rounds, not
/// the input-set refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStateTag {
    /// Round 0, advertising key pairs.
    R0AdvertiseKeys,
    /// Round 1, distributing encrypted key shares.
    R1ShareKeys,
    /// Round 2, masked input collection.
    R2MaskedInputCollection,
    /// Round 3, unmasking.
    R3Unmasking,
    /// Terminal: the protocol completed successfully for this client.
    Completed,
    /// Terminal: the protocol aborted for this client.
    Aborted,
}

/// Outbound message sink.
pub trait SendToServer {
    /// Deliver `message` to the server. Fire-and-forget.
    fn send(&mut self, message: &ClientToServerMessage);
}

/// Observer notified on every state transition.
pub trait StateTransitionListener {
    /// Called exactly once per transition, with the new state's tag, after
    /// any outbound message for that transition has been sent.
    fn transition(&mut self, new_state: ClientStateTag);
}
