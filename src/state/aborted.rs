// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::state::Collaborators;

/// Terminal state: the protocol aborted for this client.
///
/// Owns no secret material, only the diagnostic that explains the abort.
#[derive(Debug)]
pub(crate) struct Aborted {
    message: String,
    #[allow(dead_code)]
    collaborators: Collaborators,
}

impl Aborted {
    pub(crate) fn new(message: String, collaborators: Collaborators) -> Self {
        Self {
            message,
            collaborators,
        }
    }

    /// The diagnostic that ended the session.
    pub(crate) fn message(&self) -> &str {
        &self.message
    }
}
