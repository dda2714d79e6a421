// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    cache_key, unix_now, DataStore, DecryptionAuthorization, SharedStore, DEFAULT_VALIDITY_DAYS,
};
use alloy_primitives::Address;
use async_trait::async_trait;
use cvl_fhe::{normalize, AuthorizationPayload, CiphertextHandle, FheCoprocessor, UserDecryptRequest};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("malformed handle: {0}")]
    MalformedHandle(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Signs typed-data authorization payloads on behalf of one account.
///
/// In production this is a wallet; signing may involve user interaction and
/// is the longest suspension point in the authorization flow.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    async fn sign_authorization(&self, payload: &AuthorizationPayload) -> eyre::Result<Vec<u8>>;

    fn address(&self) -> Address;
}

/// Creates, caches and applies decryption authorizations.
///
/// Authorizations are cached per `(user, sorted contract-set)` key through an
/// opaque [`DataStore`]. Concurrent requests for the same key share one
/// signature request; an in-flight decrypt keeps the authorization it started
/// with even if the cache entry is invalidated underneath it.
pub struct AuthorizationManager<S: DataStore> {
    coprocessor: Arc<dyn FheCoprocessor>,
    signer: Arc<dyn TypedDataSigner>,
    store: SharedStore<S>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    validity_days: u64,
}

impl<S: DataStore> AuthorizationManager<S> {
    pub fn new(
        coprocessor: Arc<dyn FheCoprocessor>,
        signer: Arc<dyn TypedDataSigner>,
        store: SharedStore<S>,
    ) -> Self {
        Self {
            coprocessor,
            signer,
            store,
            inflight: Mutex::new(HashMap::new()),
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }

    pub fn with_validity_days(mut self, validity_days: u64) -> Self {
        self.validity_days = validity_days;
        self
    }

    pub fn user(&self) -> Address {
        self.signer.address()
    }

    /// Returns the cached authorization for the exact `(user, contract-set)`
    /// key if it has not expired, otherwise generates a keypair, requests a
    /// signature and caches the result.
    pub async fn get_or_create(
        &self,
        contracts: &[Address],
    ) -> Result<DecryptionAuthorization, AccessError> {
        let user = self.signer.address();
        let mut sorted: Vec<Address> = contracts.to_vec();
        sorted.sort();
        sorted.dedup();
        if sorted.is_empty() {
            return Err(AccessError::Unauthorized(
                "no contract addresses requested".into(),
            ));
        }
        let key = cache_key(&user, &sorted);

        if let Some(authorization) = self.load_valid(&key).await {
            return Ok(authorization);
        }

        // Single-flight: one gate per cache key, so concurrent callers share
        // the winner's signature request instead of each prompting the signer.
        let gate = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().await;

        if let Some(authorization) = self.load_valid(&key).await {
            return Ok(authorization);
        }

        let authorization = self.create(user, sorted).await?;
        let mut store = self.store.clone();
        if let Err(error) = store.insert(&key, &authorization).await {
            warn!(%key, %error, "failed to cache decryption authorization");
        }
        self.inflight.lock().await.remove(&key);

        Ok(authorization)
    }

    /// Decrypts `handles` under `authorization`, returning canonical numeric
    /// plaintexts keyed by handle.
    pub async fn decrypt(
        &self,
        authorization: &DecryptionAuthorization,
        handles: &[(CiphertextHandle, Address)],
    ) -> Result<HashMap<CiphertextHandle, u128>, AccessError> {
        if handles.is_empty() {
            return Ok(HashMap::new());
        }

        if authorization.is_expired() {
            self.invalidate(authorization.user(), authorization.contracts())
                .await;
            return Err(AccessError::Unauthorized(
                "authorization validity window has elapsed".into(),
            ));
        }

        let mut needed: Vec<Address> = handles.iter().map(|(_, contract)| *contract).collect();
        needed.sort();
        needed.dedup();
        if !authorization.covers(needed.iter()) {
            self.invalidate(authorization.user(), authorization.contracts())
                .await;
            return Err(AccessError::Unauthorized(format!(
                "authorization covers {} contract(s) but the request spans others",
                authorization.contracts().len()
            )));
        }

        if let Some((handle, contract)) = handles.iter().find(|(handle, _)| handle.is_zero()) {
            return Err(AccessError::MalformedHandle(format!(
                "zero handle for contract {contract} ({handle})"
            )));
        }

        let request = UserDecryptRequest {
            handles: handles.to_vec(),
            private_key: authorization.keypair.private_key.clone(),
            public_key: authorization.keypair.public_key.clone(),
            signature: authorization.signature.clone(),
            contracts: authorization.contracts.clone(),
            user: authorization.user,
            issued_at: authorization.issued_at,
            validity_days: authorization.validity_days,
        };

        // Transient gateway failures do not evict the cached authorization.
        let raw = self
            .coprocessor
            .user_decrypt(request)
            .await
            .map_err(|e| AccessError::DecryptionFailed(e.to_string()))?;

        let mut plaintexts = HashMap::with_capacity(handles.len());
        for (handle, _) in handles {
            let value = raw.get(handle).ok_or_else(|| {
                AccessError::DecryptionFailed(format!("gateway returned no value for {handle}"))
            })?;
            plaintexts.insert(*handle, normalize(value));
        }
        Ok(plaintexts)
    }

    /// Evicts the cached authorization for `(user, contracts)`.
    pub async fn invalidate(&self, user: Address, contracts: &[Address]) {
        let key = cache_key(&user, contracts);
        let mut store = self.store.clone();
        if let Err(error) = store.remove(&key).await {
            warn!(%key, %error, "failed to evict decryption authorization");
        }
    }

    async fn load_valid(&self, key: &str) -> Option<DecryptionAuthorization> {
        let cached: Option<DecryptionAuthorization> = match self.store.get(key).await {
            Ok(cached) => cached,
            Err(error) => {
                warn!(%key, %error, "authorization cache read failed, treating as miss");
                None
            }
        };
        let authorization = cached?;
        if authorization.is_expired() {
            let mut store = self.store.clone();
            if let Err(error) = store.remove(key).await {
                warn!(%key, %error, "failed to evict expired authorization");
            }
            return None;
        }
        Some(authorization)
    }

    async fn create(
        &self,
        user: Address,
        contracts: Vec<Address>,
    ) -> Result<DecryptionAuthorization, AccessError> {
        let keypair = self
            .coprocessor
            .generate_keypair()
            .map_err(|e| AccessError::Unauthorized(format!("keypair generation failed: {e}")))?;
        let issued_at = unix_now();
        let payload = self
            .coprocessor
            .build_authorization_payload(
                &keypair.public_key,
                &contracts,
                issued_at,
                self.validity_days,
            )
            .map_err(|e| AccessError::Unauthorized(format!("payload construction failed: {e}")))?;
        let signature = self
            .signer
            .sign_authorization(&payload)
            .await
            .map_err(|e| AccessError::Unauthorized(format!("signature request rejected: {e}")))?;

        info!(%user, contracts = contracts.len(), "created decryption authorization");
        Ok(DecryptionAuthorization {
            keypair,
            signature,
            user,
            contracts,
            issued_at,
            validity_days: self.validity_days,
        })
    }
}
