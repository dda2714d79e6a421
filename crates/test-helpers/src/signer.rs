// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use async_trait::async_trait;
use cvl_access::TypedDataSigner;
use cvl_fhe::AuthorizationPayload;
use eyre::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Signer double that counts signature requests and can simulate the user
/// dismissing the wallet prompt.
pub struct MockSigner {
    address: Address,
    pub sign_calls: AtomicUsize,
    reject: AtomicBool,
}

impl MockSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            sign_calls: AtomicUsize::new(0),
            reject: AtomicBool::new(false),
        }
    }

    pub fn reject_signatures(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TypedDataSigner for MockSigner {
    async fn sign_authorization(&self, _payload: &AuthorizationPayload) -> Result<Vec<u8>> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            bail!("user rejected the signature request");
        }
        Ok(vec![0x5a; 65])
    }

    fn address(&self) -> Address {
        self.address
    }
}
