// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{sequence_error, LedgerError};
use alloy_primitives::{Address, Bytes, B256};
use cvl_access::{AuthorizationManager, DataStore};
use cvl_evm::TokenApi;
use cvl_fhe::{CiphertextHandle, EncryptedInputBuilder, FheCoprocessor};
use cvl_sequencer::{Sequencer, TxStep};
use cvl_utils::{GenerationCounter, StatusCell};
use std::sync::Arc;
use tracing::info;

/// Self-service client for the confidential token: encrypted claims, owner
/// mints and authorized balance decryption.
pub struct FaucetClient<S: DataStore> {
    token: Arc<dyn TokenApi>,
    coprocessor: Arc<dyn FheCoprocessor>,
    access: Arc<AuthorizationManager<S>>,
    user: Address,
    token_address: Address,
    claim_status: StatusCell,
    balance_status: StatusCell,
    balance_generations: GenerationCounter,
}

impl<S: DataStore> FaucetClient<S> {
    pub fn new(
        token: Arc<dyn TokenApi>,
        coprocessor: Arc<dyn FheCoprocessor>,
        access: Arc<AuthorizationManager<S>>,
        user: Address,
        token_address: Address,
    ) -> Self {
        Self {
            token,
            coprocessor,
            access,
            user,
            token_address,
            claim_status: StatusCell::new(),
            balance_status: StatusCell::new(),
            balance_generations: GenerationCounter::new(),
        }
    }

    pub fn claim_status(&self) -> &StatusCell {
        &self.claim_status
    }

    pub fn balance_status(&self) -> &StatusCell {
        &self.balance_status
    }

    /// Claims `amount` confidential tokens for the caller.
    pub async fn claim(&self, amount: u64) -> Result<B256, LedgerError> {
        self.claim_status.begin();
        let (handle, proof) = self.encrypt_amount(amount).await.map_err(|e| {
            self.claim_status.fail(e.to_string());
            e
        })?;

        let token = self.token.clone();
        let report = Sequencer::run(vec![TxStep::new("claim", move || async move {
            token.air_drop(handle, proof).await
        })])
        .await;
        match sequence_error(&report) {
            Some(err) => {
                self.claim_status.fail(err.to_string());
                Err(err)
            }
            None => {
                self.claim_status.succeed();
                Ok(report.last_tx().unwrap_or_default())
            }
        }
    }

    /// Owner-only mint of `amount` confidential tokens to `recipient`.
    pub async fn mint(&self, recipient: Address, amount: u64) -> Result<B256, LedgerError> {
        self.claim_status.begin();
        let (handle, proof) = self.encrypt_amount(amount).await.map_err(|e| {
            self.claim_status.fail(e.to_string());
            e
        })?;

        let token = self.token.clone();
        let report = Sequencer::run(vec![TxStep::new("mint", move || async move {
            token.mint_confidential(recipient, handle, proof).await
        })])
        .await;
        match sequence_error(&report) {
            Some(err) => {
                self.claim_status.fail(err.to_string());
                Err(err)
            }
            None => {
                self.claim_status.succeed();
                Ok(report.last_tx().unwrap_or_default())
            }
        }
    }

    /// Grant-then-decrypt of the caller's confidential token balance.
    ///
    /// Returns `Ok(None)` when a later refresh superseded this one.
    pub async fn decrypt_own_balance(&self) -> Result<Option<u128>, LedgerError> {
        let generation = self.balance_generations.begin();
        self.balance_status.begin();

        let outcome = self.grant_and_decrypt().await;

        if !self.balance_generations.is_current(generation) {
            info!("token balance refresh superseded, discarding result");
            return Ok(None);
        }
        match outcome {
            Ok(value) => {
                self.balance_status.succeed();
                Ok(Some(value))
            }
            Err(err) => {
                self.balance_status.fail(err.to_string());
                Err(err)
            }
        }
    }

    async fn grant_and_decrypt(&self) -> Result<u128, LedgerError> {
        let token = self.token.clone();
        let report = Sequencer::run(vec![TxStep::new("allow-balance-decrypt", move || {
            async move { token.allow_self_balance_decrypt().await }
        })
        .idempotent()])
        .await;
        if let Some(err) = sequence_error(&report) {
            return Err(err);
        }

        let handle = self
            .token
            .confidential_balance_of(self.user)
            .await
            .map_err(|e| LedgerError::ContractRead(e.to_string()))?;
        if handle.is_zero() {
            return Err(LedgerError::MalformedHandle(
                "account has no token balance ciphertext".into(),
            ));
        }

        let authorization = self.access.get_or_create(&[self.token_address]).await?;
        let plaintexts = self
            .access
            .decrypt(&authorization, &[(handle, self.token_address)])
            .await?;
        plaintexts.get(&handle).copied().ok_or_else(|| {
            LedgerError::DecryptionFailed("no plaintext returned for token balance".into())
        })
    }

    async fn encrypt_amount(
        &self,
        amount: u64,
    ) -> Result<(CiphertextHandle, Bytes), LedgerError> {
        let mut builder = EncryptedInputBuilder::new(self.token_address, self.user);
        builder.add_u64(amount);
        let encrypted = builder.encrypt(&*self.coprocessor).await?;
        let (handles, proof) = encrypted.take_for(self.token_address, self.user)?;
        Ok((handles[0], proof))
    }
}
