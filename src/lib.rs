// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Client-side engine for the secure aggregation (SecAgg) protocol.
//!
//! In secure aggregation, many clients submit private integer vectors to a
//! server so that the server learns only their *sum* modulo a chosen bound,
//! never any individual contribution. Each client hides its input under two
//! kinds of one-time masks derived from AES-seeded pseudorandom streams:
//! pairwise masks, which cancel between every pair of surviving clients
//! when the server adds the submissions, and a self mask, which the server
//! removes after recombining threshold shares of the client's seed. The
//! threshold sharing is what makes the protocol tolerate client dropout:
//! as long as enough clients survive, the masks of the ones that vanished
//! can be reconstructed or cancelled.
//!
//! This crate implements the client as a typed state machine. A
//! [`SecAggClient`] starts in Round 0, advertises key-agreement public keys,
//! distributes encrypted threshold shares of its seeds in Round 1, submits
//! its masked input in Round 2, and reveals exactly the shares the server
//! needs in Round 3. Inbound traffic arrives through
//! [`SecAggClient::handle_message`]; local actions are
//! [`SecAggClient::start`], [`SecAggClient::set_input`], and
//! [`SecAggClient::abort`]. Outbound traffic and state-change notifications
//! go through the [`SendToServer`] and [`StateTransitionListener`] seams
//! supplied at construction.
//!
//! The engine is synchronous and single-threaded; callers serialize
//! operations. A shared [`AbortSignal`] may be supplied to cancel a long
//! mask computation from another thread.

#![warn(missing_docs)]

pub mod errors;

mod cancellation;
mod client;
mod crypto;
mod masks;
mod messages;
mod peers;
mod session;
mod state;
mod transport;
mod utils;
mod vector;

pub use cancellation::AbortSignal;
pub use client::{ClientConfig, SecAggClient};
pub use crypto::{
    AesCtrPrngFactory, AesGcmEncryption, AesKey, AesPrngFactory, AuthFailure, PrngDomain,
    SecurePrng, ShamirShare,
};
pub use masks::map_of_masks;
pub use messages::{
    ClientToServerMessage, MaskedInputVector, NoiseOrPrfShare, PairOfKeyShares,
    PairOfPublicKeys, ServerToClientMessage,
};
pub use session::SessionId;
pub use transport::{ClientStateTag, SendToServer, StateTransitionListener};
pub use vector::{SecAggVector, SecAggVectorMap, VectorSpec, MAX_MODULUS, MIN_MODULUS};
