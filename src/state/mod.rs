// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The client protocol state machine.
//!
//! Each state is a value that exclusively owns its secret material; a
//! transition moves that material into the successor and consumes the
//! predecessor. [`ProtocolState`] is the tagged sum over all states; the
//! only dynamic dispatch sits at the collaborator seams (sender, listener,
//! PRNG factory) inside [`Collaborators`].
//!
//! Transition ordering is fixed: any outbound message is sent first, then
//! the listener is notified with the new state's tag, then the successor
//! value is returned.

mod aborted;
mod completed;
mod r0_advertise_keys;
mod r1_share_keys;
mod r2_input_set;
mod r2_waiting_for_input;
mod r3_unmasking;

pub(crate) use aborted::Aborted;
pub(crate) use completed::Completed;
pub(crate) use r0_advertise_keys::R0AdvertiseKeys;
pub(crate) use r1_share_keys::R1ShareKeys;
pub(crate) use r2_input_set::R2MaskedInputCollInputSet;
pub(crate) use r2_waiting_for_input::R2MaskedInputCollWaitingForInput;
pub(crate) use r3_unmasking::R3Unmasking;

use crate::{
    cancellation::AbortSignal,
    crypto::AesPrngFactory,
    errors::{CallerError, InternalError, Result},
    messages::{ClientToServerMessage, ServerToClientMessage},
    transport::{ClientStateTag, SendToServer, StateTransitionListener},
    vector::SecAggVectorMap,
};
use rand::{CryptoRng, RngCore};
use tracing::{error, info};

pub(crate) const SERVER_ABORT_MESSAGE: &str =
    "Aborting because of abort message from the server.";
pub(crate) const INSUFFICIENT_CLIENTS_MESSAGE: &str =
    "There are not enough clients to complete this protocol session. Aborting.";
pub(crate) const UNEXPECTED_MESSAGE_TYPE_MESSAGE: &str = "Received unexpected message type.";
pub(crate) const CANCELLED_MESSAGE: &str = "Aborting because of the async abort signal.";
pub(crate) const WRONG_NUMBER_OF_KEY_SHARES_MESSAGE: &str =
    "Received the wrong number of encrypted key shares.";

/// The long-lived collaborators handed from state to state.
pub(crate) struct Collaborators {
    pub(crate) sender: Box<dyn SendToServer>,
    pub(crate) listener: Box<dyn StateTransitionListener>,
    pub(crate) prng_factory: Box<dyn AesPrngFactory>,
    pub(crate) abort_signal: Option<AbortSignal>,
}

impl Collaborators {
    pub(crate) fn send(&mut self, message: &ClientToServerMessage) {
        self.sender.send(message);
    }

    pub(crate) fn notify(&mut self, new_state: ClientStateTag) {
        self.listener.transition(new_state);
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.abort_signal
            .as_ref()
            .map(AbortSignal::raised)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("abort_signal", &self.abort_signal)
            .finish_non_exhaustive()
    }
}

/// The result of one engine operation on a state value.
pub(crate) enum Outcome {
    /// The operation succeeded; install the (possibly refined) state.
    Transitioned(ProtocolState),
    /// The operation was not allowed or its input was malformed; the state
    /// is returned untouched alongside the error.
    Rejected {
        state: ProtocolState,
        error: InternalError,
    },
    /// The abort signal was observed mid-operation; the engine has moved to
    /// the aborted state and the caller sees `Cancelled`.
    Cancelled(ProtocolState),
}

/// The client's current position in the protocol.
#[derive(Debug)]
pub(crate) enum ProtocolState {
    R0AdvertiseKeys(R0AdvertiseKeys),
    R1ShareKeys(R1ShareKeys),
    R2WaitingForInput(R2MaskedInputCollWaitingForInput),
    R2InputSet(R2MaskedInputCollInputSet),
    R3Unmasking(R3Unmasking),
    Completed(Completed),
    Aborted(Aborted),
}

impl ProtocolState {
    /// Fixed identifier of this state.
    pub(crate) fn state_name(&self) -> &'static str {
        match self {
            Self::R0AdvertiseKeys(_) => "R0_ADVERTISE_KEYS",
            Self::R1ShareKeys(_) => "R1_SHARE_KEYS",
            Self::R2WaitingForInput(_) => "R2_MASKED_INPUT_COLL_WAITING_FOR_INPUT",
            Self::R2InputSet(_) => "R2_MASKED_INPUT_COLL_INPUT_SET",
            Self::R3Unmasking(_) => "R3_UNMASKING",
            Self::Completed(_) => "COMPLETED",
            Self::Aborted(_) => "ABORTED",
        }
    }

    pub(crate) fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    pub(crate) fn is_completed_successfully(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The diagnostic that ended the session. Only valid once aborted.
    pub(crate) fn error_message(&self) -> Result<&str> {
        match self {
            Self::Aborted(aborted) => Ok(aborted.message()),
            _ => {
                error!(
                    "error_message() called in state {}, which has none",
                    self.state_name()
                );
                Err(CallerError::FailedPrecondition)?
            }
        }
    }

    /// Begin the protocol. Only allowed before any keys were advertised.
    pub(crate) fn start<R: RngCore + CryptoRng>(self, rng: &mut R) -> Outcome {
        match self {
            Self::R0AdvertiseKeys(state) => Outcome::Transitioned(state.start(rng)),
            other => reject_operation(other, "start"),
        }
    }

    /// Provide the input vectors. Only allowed in Round 2 before the input
    /// was set.
    pub(crate) fn set_input(self, input_map: SecAggVectorMap) -> Outcome {
        match self {
            Self::R2WaitingForInput(state) => state.set_input(input_map),
            other => reject_operation(other, "set_input"),
        }
    }

    /// Dispatch an inbound server message.
    pub(crate) fn handle_message<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        message: &ServerToClientMessage,
    ) -> Outcome {
        match self {
            Self::R0AdvertiseKeys(state) => state.handle_message(message),
            Self::R1ShareKeys(state) => state.handle_message(rng, message),
            Self::R2WaitingForInput(state) => state.handle_message(message),
            Self::R2InputSet(state) => state.handle_message(message),
            Self::R3Unmasking(state) => state.handle_message(message),
            other => reject_operation(other, "handle_message"),
        }
    }

    /// Abort the session on the calling application's request.
    ///
    /// In a terminal state this is a no-op: the state is preserved, nothing
    /// is sent, and no transition is reported.
    pub(crate) fn abort(self, reason: &str) -> Outcome {
        let collaborators = match self {
            Self::Completed(_) | Self::Aborted(_) => return Outcome::Transitioned(self),
            Self::R0AdvertiseKeys(state) => state.collaborators,
            Self::R1ShareKeys(state) => state.collaborators,
            Self::R2WaitingForInput(state) => state.collaborators,
            Self::R2InputSet(state) => state.collaborators,
            Self::R3Unmasking(state) => state.collaborators,
        };
        info!("Aborting the session upon external request.");
        let diagnostic = format!("Abort upon external request for reason <{reason}>.");
        Outcome::Transitioned(abort_with_notice(collaborators, diagnostic))
    }
}

fn reject_operation(state: ProtocolState, operation: &str) -> Outcome {
    error!(
        "{} is not allowed in state {}",
        operation,
        state.state_name()
    );
    Outcome::Rejected {
        state,
        error: CallerError::FailedPrecondition.into(),
    }
}

/// Send an abort to the server, notify the listener, and land in Aborted.
pub(crate) fn abort_with_notice(
    mut collaborators: Collaborators,
    diagnostic: String,
) -> ProtocolState {
    collaborators.send(&ClientToServerMessage::Abort {
        diagnostic_info: diagnostic.clone(),
    });
    collaborators.notify(ClientStateTag::Aborted);
    ProtocolState::Aborted(Aborted::new(diagnostic, collaborators))
}

/// Land in Aborted without telling the server (it already knows, or cannot
/// be told).
pub(crate) fn abort_quietly(
    mut collaborators: Collaborators,
    diagnostic: String,
) -> ProtocolState {
    collaborators.notify(ClientStateTag::Aborted);
    ProtocolState::Aborted(Aborted::new(diagnostic, collaborators))
}

/// Handle a server-initiated abort, shared by every non-terminal state.
pub(crate) fn server_abort(mut collaborators: Collaborators, early_success: bool) -> ProtocolState {
    if early_success {
        info!("Server signalled early success; completing.");
        collaborators.notify(ClientStateTag::Completed);
        ProtocolState::Completed(Completed::new(collaborators))
    } else {
        info!("Server aborted the session.");
        abort_quietly(collaborators, SERVER_ABORT_MESSAGE.to_string())
    }
}

/// Abort on a message kind the current state cannot accept.
pub(crate) fn unexpected_message(collaborators: Collaborators, state_name: &str) -> ProtocolState {
    error!("Received an unexpected message type in state {state_name}");
    abort_with_notice(collaborators, UNEXPECTED_MESSAGE_TYPE_MESSAGE.to_string())
}

/// Abort after an internal invariant failure, with a diagnostic.
pub(crate) fn internal_abort(collaborators: Collaborators, context: &str) -> ProtocolState {
    error!("Internal error: {context}");
    abort_with_notice(collaborators, format!("Internal error: {context}"))
}
