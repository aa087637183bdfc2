// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Error types for the secure aggregation client.
//!
//! Errors are split into two tiers. [`CallerError`]s describe mistakes made
//! by the calling application, such as invoking an operation that the
//! current protocol state does not permit. [`InternalError`] is the
//! crate-wide error type; caller mistakes are wrapped into it so that a
//! single [`Result`] alias can be used throughout.
//!
//! Note that a failed decryption of a peer's key-share envelope is *not* an
//! error in this taxonomy. It is a data-layer event handled by marking the
//! peer dead, and is represented by a separate type at the decryption seam
//! (see [`AuthFailure`](crate::AuthFailure)).

use std::fmt::{Display, Formatter};

/// Convenience wrapper around `std::result::Result` using this crate's
/// [`InternalError`].
pub type Result<T> = std::result::Result<T, InternalError>;

/// Errors that indicate a mistake by the calling application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerError {
    /// The requested operation is not allowed in the current protocol state.
    FailedPrecondition,
    /// An input provided by the calling application was malformed, for
    /// example a vector element at or above its declared bound.
    InvalidArgument,
    /// A byte string could not be parsed into the expected type.
    DeserializationFailed,
}

impl Display for CallerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailedPrecondition => write!(
                f,
                "the requested operation is not allowed in the current protocol state"
            ),
            Self::InvalidArgument => write!(f, "an input to the protocol engine was malformed"),
            Self::DeserializationFailed => {
                write!(f, "a byte string could not be parsed into the expected type")
            }
        }
    }
}

/// Errors that can arise while driving the protocol engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalError {
    /// The calling application made a mistake.
    CallingApplicationMistake(CallerError),
    /// The asynchronous abort signal was observed mid-operation. The engine
    /// has transitioned to the aborted state.
    Cancelled,
    /// An invariant of the protocol engine was violated. This indicates a
    /// bug in this crate.
    InternalInvariantFailed,
}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CallingApplicationMistake(caller_error) => {
                write!(f, "the calling application made a mistake: {caller_error}")
            }
            Self::Cancelled => write!(f, "the operation observed the abort signal"),
            Self::InternalInvariantFailed => {
                write!(f, "an internal invariant was violated; this is a bug")
            }
        }
    }
}

impl std::error::Error for InternalError {}

impl From<CallerError> for InternalError {
    fn from(caller_error: CallerError) -> Self {
        Self::CallingApplicationMistake(caller_error)
    }
}
