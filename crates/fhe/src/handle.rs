// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to an encrypted value held by a contract.
///
/// The handle itself is not sensitive; it cannot be decrypted without a valid
/// authorization covering the contract that owns it. The all-zero handle is
/// the contracts' sentinel for "no ciphertext" and is treated as malformed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(B256);

impl CiphertextHandle {
    pub fn new(raw: B256) -> Self {
        Self(raw)
    }

    pub fn zero() -> Self {
        Self(B256::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == B256::ZERO
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl From<B256> for CiphertextHandle {
    fn from(raw: B256) -> Self {
        Self(raw)
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix form for logs.
        write!(f, "0x{}…", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle(0x{})", hex::encode(self.0))
    }
}
