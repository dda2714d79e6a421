// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use cvl_fhe::{
    AuthorizationPayload, CiphertextHandle, FheCoprocessor, Keypair, RawDecryptedValue,
    TypedValue, UserDecryptRequest,
};
use eyre::{bail, Result};
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Shape the mock gateway uses when returning decrypted values, so the
/// normalization paths can be exercised end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Canonical,
    DecimalString,
    HexString,
}

#[derive(Debug, Clone, Copy)]
struct StoredCipher {
    value: u128,
    contract: Address,
}

/// Deterministic in-memory FHE coprocessor.
///
/// Handles are digests of a process-unique counter; plaintexts are kept so
/// the mock contracts can resolve what a handle encrypts, the way the real
/// coprocessor network would for the ledger.
pub struct MockCoprocessor {
    ciphers: Mutex<HashMap<CiphertextHandle, StoredCipher>>,
    proofs: Mutex<HashMap<Vec<u8>, Vec<CiphertextHandle>>>,
    counter: AtomicU64,
    pub encrypt_calls: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
    fail_encrypt: AtomicBool,
    decrypt_delay: Mutex<Option<Duration>>,
    shape: Mutex<ValueShape>,
}

impl MockCoprocessor {
    pub fn new() -> Self {
        Self {
            ciphers: Mutex::new(HashMap::new()),
            proofs: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(1),
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
            fail_encrypt: AtomicBool::new(false),
            decrypt_delay: Mutex::new(None),
            shape: Mutex::new(ValueShape::Canonical),
        }
    }

    /// Makes the next and all following `encrypt` calls fail.
    pub fn fail_encryption(&self) {
        self.fail_encrypt.store(true, Ordering::SeqCst);
    }

    /// Delays every `user_decrypt` call, for superseded-refresh tests.
    pub fn set_decrypt_delay(&self, delay: Duration) {
        *self.decrypt_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_value_shape(&self, shape: ValueShape) {
        *self.shape.lock().unwrap() = shape;
    }

    /// Registers a ciphertext outside of `encrypt`, as a contract would when
    /// it derives a new encrypted balance.
    pub fn register(&self, contract: Address, value: u128) -> CiphertextHandle {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(b"cipher");
        hasher.update(n.to_be_bytes());
        hasher.update(contract.as_slice());
        let digest: [u8; 32] = hasher.finalize().into();
        let handle = CiphertextHandle::new(digest.into());
        self.ciphers
            .lock()
            .unwrap()
            .insert(handle, StoredCipher { value, contract });
        handle
    }

    pub fn plaintext_of(&self, handle: &CiphertextHandle) -> Option<u128> {
        self.ciphers.lock().unwrap().get(handle).map(|c| c.value)
    }

    /// Whether `proof` is the single proof produced for exactly `handles`.
    pub fn proof_covers(&self, proof: &Bytes, handles: &[CiphertextHandle]) -> bool {
        self.proofs
            .lock()
            .unwrap()
            .get(proof.as_ref())
            .is_some_and(|covered| covered == handles)
    }

    fn shaped(&self, value: u128) -> RawDecryptedValue {
        match *self.shape.lock().unwrap() {
            ValueShape::Canonical => RawDecryptedValue::Uint(value),
            ValueShape::DecimalString => RawDecryptedValue::Text(value.to_string()),
            ValueShape::HexString => RawDecryptedValue::Text(format!("{value:#x}")),
        }
    }
}

impl Default for MockCoprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FheCoprocessor for MockCoprocessor {
    async fn encrypt(
        &self,
        contract: Address,
        user: Address,
        values: &[TypedValue],
    ) -> Result<(Vec<CiphertextHandle>, Bytes)> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_encrypt.load(Ordering::SeqCst) {
            bail!("coprocessor unavailable");
        }
        for typed in values {
            if typed.width.bits() < 128 && (typed.value >> typed.width.bits()) != 0 {
                bail!("value does not fit declared width");
            }
        }
        let _ = user;

        let handles: Vec<CiphertextHandle> = values
            .iter()
            .map(|typed| self.register(contract, typed.value))
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(b"proof");
        for handle in &handles {
            hasher.update(handle.as_b256().as_slice());
        }
        let proof = Bytes::from(hasher.finalize().to_vec());
        self.proofs
            .lock()
            .unwrap()
            .insert(proof.to_vec(), handles.clone());

        Ok((handles, proof))
    }

    fn generate_keypair(&self) -> Result<Keypair> {
        let mut rng = rand::thread_rng();
        let mut private_key = vec![0u8; 32];
        let mut public_key = vec![0u8; 32];
        rng.fill_bytes(&mut private_key);
        rng.fill_bytes(&mut public_key);
        Ok(Keypair {
            private_key,
            public_key,
        })
    }

    fn build_authorization_payload(
        &self,
        public_key: &[u8],
        contracts: &[Address],
        issued_at: u64,
        validity_days: u64,
    ) -> Result<AuthorizationPayload> {
        Ok(AuthorizationPayload {
            domain: json!({ "name": "CVL", "version": "1" }),
            types: json!({ "UserDecryptRequestVerification": [
                { "name": "publicKey", "type": "bytes" },
                { "name": "contractAddresses", "type": "address[]" },
            ]}),
            message: json!({
                "publicKey": hex::encode(public_key),
                "contractAddresses": contracts.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
                "startTimestamp": issued_at,
                "durationDays": validity_days,
            }),
        })
    }

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<HashMap<CiphertextHandle, RawDecryptedValue>> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        let decrypt_delay = *self.decrypt_delay.lock().unwrap();
        if let Some(delay) = decrypt_delay {
            tokio::time::sleep(delay).await;
        }
        if request.signature.is_empty() {
            bail!("missing authorization signature");
        }

        let ciphers = self.ciphers.lock().unwrap();
        let mut out = HashMap::with_capacity(request.handles.len());
        for (handle, contract) in &request.handles {
            let Some(cipher) = ciphers.get(handle) else {
                bail!("unknown handle {handle}");
            };
            if cipher.contract != *contract || !request.contracts.contains(contract) {
                bail!("handle {handle} is not covered by the authorization");
            }
            out.insert(*handle, self.shaped(cipher.value));
        }
        Ok(out)
    }

    async fn public_decrypt(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<HashMap<CiphertextHandle, RawDecryptedValue>> {
        let ciphers = self.ciphers.lock().unwrap();
        let mut out = HashMap::with_capacity(handles.len());
        for handle in handles {
            let Some(cipher) = ciphers.get(handle) else {
                bail!("unknown handle {handle}");
            };
            out.insert(*handle, self.shaped(cipher.value));
        }
        Ok(out)
    }
}
