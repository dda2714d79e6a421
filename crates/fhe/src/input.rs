// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{CiphertextHandle, FheCoprocessor};
use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("invalid encryption context: {0}")]
    InvalidContext(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Width of one plaintext input as the coprocessor understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputWidth {
    U8,
    U64,
    U128,
}

impl InputWidth {
    pub fn bits(&self) -> u16 {
        match self {
            InputWidth::U8 => 8,
            InputWidth::U64 => 64,
            InputWidth::U128 => 128,
        }
    }
}

/// One plaintext value tagged with its declared width.
///
/// Width is enforced at insertion through the typed `add_*` methods, so a
/// value always fits the width it is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedValue {
    pub width: InputWidth,
    pub value: u128,
}

/// Ordered sequence of typed plaintext values bound to one
/// `(contract, user)` context.
///
/// Every value added to one builder is encrypted together under a single
/// proof; the i-th resulting handle corresponds to the i-th value added.
#[derive(Debug)]
pub struct EncryptedInputBuilder {
    contract: Address,
    user: Address,
    values: Vec<TypedValue>,
}

impl EncryptedInputBuilder {
    pub fn new(contract: Address, user: Address) -> Self {
        Self {
            contract,
            user,
            values: Vec::new(),
        }
    }

    pub fn add_u8(&mut self, value: u8) -> &mut Self {
        self.values.push(TypedValue {
            width: InputWidth::U8,
            value: value as u128,
        });
        self
    }

    pub fn add_u64(&mut self, value: u64) -> &mut Self {
        self.values.push(TypedValue {
            width: InputWidth::U64,
            value: value as u128,
        });
        self
    }

    pub fn add_u128(&mut self, value: u128) -> &mut Self {
        self.values.push(TypedValue {
            width: InputWidth::U128,
            value,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encrypts every value in insertion order under one shared proof.
    ///
    /// Context and shape are validated before the coprocessor is invoked, so
    /// an `InvalidContext` failure never reaches the network.
    pub async fn encrypt(
        self,
        coprocessor: &dyn FheCoprocessor,
    ) -> Result<EncryptionResult, EncryptError> {
        if self.values.is_empty() {
            return Err(EncryptError::InvalidContext(
                "builder holds no values".into(),
            ));
        }
        if self.contract == Address::ZERO || self.user == Address::ZERO {
            return Err(EncryptError::InvalidContext(
                "contract and user addresses must be set".into(),
            ));
        }

        let (handles, proof) = coprocessor
            .encrypt(self.contract, self.user, &self.values)
            .await
            .map_err(|e| EncryptError::EncryptionFailed(e.to_string()))?;

        if handles.len() != self.values.len() {
            return Err(EncryptError::EncryptionFailed(format!(
                "coprocessor returned {} handles for {} values",
                handles.len(),
                self.values.len()
            )));
        }

        Ok(EncryptionResult {
            contract: self.contract,
            user: self.user,
            handles,
            proof,
        })
    }
}

/// Ordered handles plus the single proof covering all of them.
///
/// The result still carries the `(contract, user)` context it was built for
/// and is consumed by value by the one submission that uses it; a result
/// taken for a different context is rejected before any network call.
#[derive(Debug)]
pub struct EncryptionResult {
    contract: Address,
    user: Address,
    handles: Vec<CiphertextHandle>,
    proof: Bytes,
}

impl EncryptionResult {
    pub fn handles(&self) -> &[CiphertextHandle] {
        &self.handles
    }

    pub fn proof(&self) -> &Bytes {
        &self.proof
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn user(&self) -> Address {
        self.user
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Consumes the result for submission against `contract` on behalf of
    /// `user`, rejecting a stale or foreign context.
    pub fn take_for(
        self,
        contract: Address,
        user: Address,
    ) -> Result<(Vec<CiphertextHandle>, Bytes), EncryptError> {
        if self.contract != contract || self.user != user {
            return Err(EncryptError::InvalidContext(format!(
                "encryption result was built for ({}, {}), not ({}, {})",
                self.contract, self.user, contract, user
            )));
        }
        Ok((self.handles, self.proof))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthorizationPayload, Keypair, RawDecryptedValue, UserDecryptRequest};
    use alloy_primitives::{address, b256};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const CONTRACT: Address = address!("00000000000000000000000000000000000000aa");
    const USER: Address = address!("00000000000000000000000000000000000000bb");

    /// Returns one distinct handle per value and a fixed proof.
    struct EchoCoprocessor;

    #[async_trait]
    impl FheCoprocessor for EchoCoprocessor {
        async fn encrypt(
            &self,
            _contract: Address,
            _user: Address,
            values: &[TypedValue],
        ) -> eyre::Result<(Vec<CiphertextHandle>, Bytes)> {
            let handles = (0..values.len() as u8)
                .map(|i| {
                    let mut raw = [0u8; 32];
                    raw[31] = i + 1;
                    CiphertextHandle::new(raw.into())
                })
                .collect();
            Ok((handles, Bytes::from_static(b"proof")))
        }

        fn generate_keypair(&self) -> eyre::Result<Keypair> {
            unimplemented!()
        }

        fn build_authorization_payload(
            &self,
            _public_key: &[u8],
            _contracts: &[Address],
            _issued_at: u64,
            _validity_days: u64,
        ) -> eyre::Result<AuthorizationPayload> {
            unimplemented!()
        }

        async fn user_decrypt(
            &self,
            _request: UserDecryptRequest,
        ) -> eyre::Result<HashMap<CiphertextHandle, RawDecryptedValue>> {
            unimplemented!()
        }

        async fn public_decrypt(
            &self,
            _handles: &[CiphertextHandle],
        ) -> eyre::Result<HashMap<CiphertextHandle, RawDecryptedValue>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn one_proof_covers_all_values_in_order() {
        let mut builder = EncryptedInputBuilder::new(CONTRACT, USER);
        builder.add_u128(10).add_u128(20).add_u8(3);

        let result = builder.encrypt(&EchoCoprocessor).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(
            result.handles()[0].as_b256(),
            b256!("0000000000000000000000000000000000000000000000000000000000000001")
        );
        assert_eq!(
            result.handles()[2].as_b256(),
            b256!("0000000000000000000000000000000000000000000000000000000000000003")
        );
        assert_eq!(result.proof().as_ref(), b"proof");
    }

    #[tokio::test]
    async fn empty_builder_is_rejected_locally() {
        let builder = EncryptedInputBuilder::new(CONTRACT, USER);
        let err = builder.encrypt(&EchoCoprocessor).await.unwrap_err();
        assert!(matches!(err, EncryptError::InvalidContext(_)));
    }

    #[tokio::test]
    async fn zero_address_context_is_rejected_locally() {
        let mut builder = EncryptedInputBuilder::new(Address::ZERO, USER);
        builder.add_u64(1);
        let err = builder.encrypt(&EchoCoprocessor).await.unwrap_err();
        assert!(matches!(err, EncryptError::InvalidContext(_)));
    }

    #[tokio::test]
    async fn result_taken_for_foreign_context_is_rejected() {
        let mut builder = EncryptedInputBuilder::new(CONTRACT, USER);
        builder.add_u64(7);
        let result = builder.encrypt(&EchoCoprocessor).await.unwrap();

        let other = address!("00000000000000000000000000000000000000cc");
        let err = result.take_for(other, USER).unwrap_err();
        assert!(matches!(err, EncryptError::InvalidContext(_)));
    }
}
