// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{CiphertextHandle, RawDecryptedValue, TypedValue};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ephemeral key pair backing one decryption authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keypair {
    pub private_key: Vec<u8>,
    pub public_key: Vec<u8>,
}

/// Typed-data payload a user signs to authorize decryption.
///
/// The exact domain/type layout is owned by the coprocessor gateway; the
/// client treats it as an opaque structured document to be signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationPayload {
    pub domain: serde_json::Value,
    pub types: serde_json::Value,
    pub message: serde_json::Value,
}

/// Everything the gateway needs to decrypt a set of handles for one user.
#[derive(Debug, Clone)]
pub struct UserDecryptRequest {
    /// Handles paired with the contract address owning each ciphertext.
    pub handles: Vec<(CiphertextHandle, Address)>,
    pub private_key: Vec<u8>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub contracts: Vec<Address>,
    pub user: Address,
    pub issued_at: u64,
    pub validity_days: u64,
}

/// The external FHE coprocessor capability.
///
/// Everything behind this trait runs off-process: encryption and proof
/// generation, keypair generation, and the user/public decryption gateways.
/// Every async method is a suspension point.
#[async_trait]
pub trait FheCoprocessor: Send + Sync {
    /// Encrypts `values` bound to `(contract, user)`, returning one handle
    /// per value in input order plus a single proof covering all of them.
    async fn encrypt(
        &self,
        contract: Address,
        user: Address,
        values: &[TypedValue],
    ) -> Result<(Vec<CiphertextHandle>, Bytes)>;

    fn generate_keypair(&self) -> Result<Keypair>;

    fn build_authorization_payload(
        &self,
        public_key: &[u8],
        contracts: &[Address],
        issued_at: u64,
        validity_days: u64,
    ) -> Result<AuthorizationPayload>;

    /// User-scoped decryption; requires a signature produced over the payload
    /// from [`FheCoprocessor::build_authorization_payload`].
    async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<HashMap<CiphertextHandle, RawDecryptedValue>>;

    /// Public decryption for handles whose plaintext the owning contract has
    /// made publicly revealable. No per-user authorization is involved.
    async fn public_decrypt(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<HashMap<CiphertextHandle, RawDecryptedValue>>;
}
