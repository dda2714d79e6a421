// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{sequence_error, LedgerError};
use alloy_primitives::{Address, B256, U256};
use cvl_access::{AuthorizationManager, DataStore};
use cvl_evm::{AssetApi, LedgerApi};
use cvl_fhe::{EncryptedInputBuilder, FheCoprocessor};
use cvl_sequencer::{SequenceReport, Sequencer, StepError, TxStep};
use cvl_utils::{GenerationCounter, StatusCell};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestrates encrypted deposit, payout and withdrawal flows against the
/// confidential ledger contract.
///
/// The client is state-free beyond per-operation status cells: balances and
/// account lists live in the contract and are only mirrored per call. Each
/// instance is parameterized by its signer-derived user address, the
/// contract addresses and the chain id at construction; no ambient session
/// state is consulted.
pub struct LedgerClient<S: DataStore> {
    ledger: Arc<dyn LedgerApi>,
    asset: Arc<dyn AssetApi>,
    coprocessor: Arc<dyn FheCoprocessor>,
    access: Arc<AuthorizationManager<S>>,
    user: Address,
    ledger_address: Address,
    chain_id: u64,
    fund_status: StatusCell,
    pay_status: StatusCell,
    withdraw_status: StatusCell,
    balance_status: StatusCell,
    allow_decrypt_status: StatusCell,
    balance_generations: GenerationCounter,
}

fn fail_with(cell: &StatusCell, err: LedgerError) -> LedgerError {
    cell.fail(err.to_string());
    err
}

impl<S: DataStore> LedgerClient<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        asset: Arc<dyn AssetApi>,
        coprocessor: Arc<dyn FheCoprocessor>,
        access: Arc<AuthorizationManager<S>>,
        user: Address,
        ledger_address: Address,
        chain_id: u64,
    ) -> Self {
        info!(%user, %ledger_address, chain_id, "ledger client created");
        Self {
            ledger,
            asset,
            coprocessor,
            access,
            user,
            ledger_address,
            chain_id,
            fund_status: StatusCell::new(),
            pay_status: StatusCell::new(),
            withdraw_status: StatusCell::new(),
            balance_status: StatusCell::new(),
            allow_decrypt_status: StatusCell::new(),
            balance_generations: GenerationCounter::new(),
        }
    }

    pub fn user(&self) -> Address {
        self.user
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn fund_status(&self) -> &StatusCell {
        &self.fund_status
    }

    pub fn pay_status(&self) -> &StatusCell {
        &self.pay_status
    }

    pub fn withdraw_status(&self) -> &StatusCell {
        &self.withdraw_status
    }

    pub fn balance_status(&self) -> &StatusCell {
        &self.balance_status
    }

    pub fn allow_decrypt_status(&self) -> &StatusCell {
        &self.allow_decrypt_status
    }

    /// Approve-then-fund. Both steps must confirm; when the approval confirms
    /// but funding fails, the approval stays outstanding and the returned
    /// error reports it, so [`LedgerClient::fund_approved`] can retry only
    /// the funding step without prompting for a second approval.
    pub async fn fund(&self, amount: U256) -> Result<SequenceReport, LedgerError> {
        self.fund_status.begin();

        let asset = self.asset.clone();
        let ledger = self.ledger.clone();
        let spender = self.ledger_address;
        let report = Sequencer::run(vec![
            TxStep::new("approve", move || async move {
                asset.approve(spender, amount).await
            })
            .idempotent(),
            TxStep::new("fund", move || async move {
                ledger.fund_treasury(amount).await
            }),
        ])
        .await;

        match sequence_error(&report) {
            Some(err) => {
                if report.confirmed_count() > 0 {
                    warn!(
                        confirmed = report.confirmed_count(),
                        "funding halted mid-sequence; the approval remains outstanding"
                    );
                }
                Err(fail_with(&self.fund_status, err))
            }
            None => {
                self.fund_status.succeed();
                Ok(report)
            }
        }
    }

    /// Retries only the funding step of a previously half-completed
    /// [`LedgerClient::fund`] whose approval already confirmed.
    pub async fn fund_approved(&self, amount: U256) -> Result<B256, LedgerError> {
        let ledger = self.ledger.clone();
        self.submit_single(&self.fund_status, "fund", move || async move {
            ledger.fund_treasury(amount).await
        })
        .await
    }

    /// Pays `amount` to `recipient`: encrypt, submit, confirm. A failing
    /// reserve refresh after confirmation never downgrades the payment.
    pub async fn pay(&self, recipient: Address, amount: u128) -> Result<B256, LedgerError> {
        self.pay_status.begin();

        let mut builder = EncryptedInputBuilder::new(self.ledger_address, self.user);
        builder.add_u128(amount);
        let encrypted = builder
            .encrypt(&*self.coprocessor)
            .await
            .map_err(|e| fail_with(&self.pay_status, e.into()))?;
        let (handles, proof) = encrypted
            .take_for(self.ledger_address, self.user)
            .map_err(|e| fail_with(&self.pay_status, e.into()))?;
        let handle = handles[0];

        let ledger = self.ledger.clone();
        let report = Sequencer::run(vec![TxStep::new("pay", move || async move {
            ledger.send_to(recipient, handle, proof).await
        })])
        .await;
        if let Some(err) = sequence_error(&report) {
            return Err(fail_with(&self.pay_status, err));
        }
        self.pay_status.succeed();

        self.refresh_reserve_best_effort().await;
        Ok(report.last_tx().unwrap_or_default())
    }

    /// Pays every recipient in one submission sharing a single proof.
    ///
    /// Shape problems fail with `InvalidBatch` before anything touches the
    /// network. One builder entry is created per recipient in order, so
    /// `recipients[i]` is credited with `amounts[i]`; the batch entry point
    /// receives the ordered handle list and exactly one proof.
    pub async fn pay_many(
        &self,
        recipients: &[Address],
        amounts: &[u128],
    ) -> Result<B256, LedgerError> {
        self.pay_status.begin();
        validate_batch(recipients, amounts).map_err(|e| fail_with(&self.pay_status, e))?;

        let mut builder = EncryptedInputBuilder::new(self.ledger_address, self.user);
        for amount in amounts {
            builder.add_u128(*amount);
        }
        let encrypted = builder
            .encrypt(&*self.coprocessor)
            .await
            .map_err(|e| fail_with(&self.pay_status, e.into()))?;
        let (handles, proof) = encrypted
            .take_for(self.ledger_address, self.user)
            .map_err(|e| fail_with(&self.pay_status, e.into()))?;

        info!(
            recipients = recipients.len(),
            "submitting batch payout under one proof"
        );
        let ledger = self.ledger.clone();
        let to = recipients.to_vec();
        let report = Sequencer::run(vec![TxStep::new("pay-many", move || async move {
            ledger.send_to_many(to, handles, proof).await
        })])
        .await;
        if let Some(err) = sequence_error(&report) {
            return Err(fail_with(&self.pay_status, err));
        }
        self.pay_status.succeed();

        self.refresh_reserve_best_effort().await;
        Ok(report.last_tx().unwrap_or_default())
    }

    /// Withdraws `amount` from the caller's encrypted balance. The caller is
    /// both sender and recipient context here.
    pub async fn withdraw(&self, amount: u128) -> Result<B256, LedgerError> {
        self.withdraw_status.begin();

        let mut builder = EncryptedInputBuilder::new(self.ledger_address, self.user);
        builder.add_u128(amount);
        let encrypted = builder
            .encrypt(&*self.coprocessor)
            .await
            .map_err(|e| fail_with(&self.withdraw_status, e.into()))?;
        let (handles, proof) = encrypted
            .take_for(self.ledger_address, self.user)
            .map_err(|e| fail_with(&self.withdraw_status, e.into()))?;
        let handle = handles[0];

        let ledger = self.ledger.clone();
        let plain = U256::from(amount);
        let report = Sequencer::run(vec![TxStep::new("withdraw", move || async move {
            ledger.withdraw(plain, handle, proof).await
        })])
        .await;
        if let Some(err) = sequence_error(&report) {
            return Err(fail_with(&self.withdraw_status, err));
        }
        self.withdraw_status.succeed();
        Ok(report.last_tx().unwrap_or_default())
    }

    /// Grants the ledger permission to let the caller decrypt their own
    /// balance handle. Required once before `fetch_own_balance`.
    pub async fn grant_self_decrypt(&self) -> Result<B256, LedgerError> {
        let ledger = self.ledger.clone();
        self.submit_single(&self.allow_decrypt_status, "allow-decrypt", move || {
            async move { ledger.allow_self_decrypt().await }
        })
        .await
    }

    /// Owner-only plaintext withdrawal from the treasury.
    pub async fn owner_withdraw(&self, amount: U256) -> Result<B256, LedgerError> {
        let ledger = self.ledger.clone();
        self.submit_single(&self.withdraw_status, "owner-withdraw", move || {
            async move { ledger.owner_withdraw(amount).await }
        })
        .await
    }

    /// Reads and decrypts the caller's own balance.
    ///
    /// Returns `Ok(None)` when a refresh initiated later superseded this one;
    /// the plaintext is never retained by the client, only handed back.
    pub async fn fetch_own_balance(&self) -> Result<Option<u128>, LedgerError> {
        let generation = self.balance_generations.begin();
        self.balance_status.begin();

        let outcome = self.decrypt_own_balance().await;

        if !self.balance_generations.is_current(generation) {
            info!("balance refresh superseded by a newer one, discarding result");
            return Ok(None);
        }
        match outcome {
            Ok(value) => {
                self.balance_status.succeed();
                Ok(Some(value))
            }
            Err(err) => Err(fail_with(&self.balance_status, err)),
        }
    }

    /// Plaintext, non-confidential aggregate balance of the ledger treasury.
    pub async fn read_contract_reserve(&self) -> Result<U256, LedgerError> {
        self.balance_status.begin();
        match self.asset.balance_of(self.ledger_address).await {
            Ok(reserve) => {
                self.balance_status.succeed();
                Ok(reserve)
            }
            Err(e) => Err(fail_with(
                &self.balance_status,
                LedgerError::ContractRead(e.to_string()),
            )),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<Address>, LedgerError> {
        self.ledger
            .users()
            .await
            .map_err(|e| LedgerError::ContractRead(e.to_string()))
    }

    pub async fn is_owner(&self) -> Result<bool, LedgerError> {
        let owner = self
            .ledger
            .owner()
            .await
            .map_err(|e| LedgerError::ContractRead(e.to_string()))?;
        Ok(owner == self.user)
    }

    async fn decrypt_own_balance(&self) -> Result<u128, LedgerError> {
        let handle = self
            .ledger
            .balance_handle_of(self.user)
            .await
            .map_err(|e| LedgerError::ContractRead(e.to_string()))?;
        if handle.is_zero() {
            return Err(LedgerError::MalformedHandle(
                "account has no balance ciphertext".into(),
            ));
        }

        let authorization = self.access.get_or_create(&[self.ledger_address]).await?;
        let plaintexts = self
            .access
            .decrypt(&authorization, &[(handle, self.ledger_address)])
            .await?;
        plaintexts.get(&handle).copied().ok_or_else(|| {
            LedgerError::DecryptionFailed("no plaintext returned for balance handle".into())
        })
    }

    async fn refresh_reserve_best_effort(&self) {
        if let Err(error) = self.asset.balance_of(self.ledger_address).await {
            warn!(%error, "treasury reserve refresh after payout failed");
        }
    }

    async fn submit_single<F, Fut>(
        &self,
        cell: &StatusCell,
        label: &str,
        action: F,
    ) -> Result<B256, LedgerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<B256, StepError>> + Send + 'static,
    {
        cell.begin();
        let report = Sequencer::run(vec![TxStep::new(label, action)]).await;
        match sequence_error(&report) {
            Some(err) => Err(fail_with(cell, err)),
            None => {
                cell.succeed();
                Ok(report.last_tx().unwrap_or_default())
            }
        }
    }
}

fn validate_batch(recipients: &[Address], amounts: &[u128]) -> Result<(), LedgerError> {
    if recipients.is_empty() {
        return Err(LedgerError::InvalidBatch("batch is empty".into()));
    }
    if recipients.len() != amounts.len() {
        return Err(LedgerError::InvalidBatch(format!(
            "{} recipients but {} amounts",
            recipients.len(),
            amounts.len()
        )));
    }
    if let Some(index) = amounts.iter().position(|amount| *amount == 0) {
        return Err(LedgerError::InvalidBatch(format!(
            "amount for recipient {index} must be positive"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const A: Address = address!("00000000000000000000000000000000000000aa");
    const B: Address = address!("00000000000000000000000000000000000000bb");

    #[test]
    fn batch_validation_rejects_shape_mismatches() {
        assert!(matches!(
            validate_batch(&[], &[]),
            Err(LedgerError::InvalidBatch(_))
        ));
        assert!(matches!(
            validate_batch(&[A, B], &[10]),
            Err(LedgerError::InvalidBatch(_))
        ));
        assert!(matches!(
            validate_batch(&[A, B], &[10, 0]),
            Err(LedgerError::InvalidBatch(_))
        ));
        assert!(validate_batch(&[A, B], &[10, 20]).is_ok());
    }
}
