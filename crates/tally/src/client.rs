// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{sequence_error, Phase, TallyError};
use alloy_primitives::{Address, B256};
use cvl_evm::TallyApi;
use cvl_fhe::{normalize, CiphertextHandle, EncryptedInputBuilder, FheCoprocessor};
use cvl_sequencer::{Sequencer, StepError, TxStep};
use cvl_utils::{GenerationCounter, StatusCell};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Orchestrates the four-phase confidential voting lifecycle.
///
/// Phase and ownership live in the contract; the client mirrors them per call
/// and validates every transition locally before submitting, so an illegal
/// transition fails without mutating anything.
pub struct TallyClient {
    tally: Arc<dyn TallyApi>,
    coprocessor: Arc<dyn FheCoprocessor>,
    user: Address,
    tally_address: Address,
    chain_id: u64,
    transition_status: StatusCell,
    vote_status: StatusCell,
    results_status: StatusCell,
    result_generations: GenerationCounter,
    decrypt_generations: GenerationCounter,
    last_tx: RwLock<Option<B256>>,
}

impl TallyClient {
    pub fn new(
        tally: Arc<dyn TallyApi>,
        coprocessor: Arc<dyn FheCoprocessor>,
        user: Address,
        tally_address: Address,
        chain_id: u64,
    ) -> Self {
        info!(%user, %tally_address, chain_id, "tally client created");
        Self {
            tally,
            coprocessor,
            user,
            tally_address,
            chain_id,
            transition_status: StatusCell::new(),
            vote_status: StatusCell::new(),
            results_status: StatusCell::new(),
            result_generations: GenerationCounter::new(),
            decrypt_generations: GenerationCounter::new(),
            last_tx: RwLock::new(None),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn transition_status(&self) -> &StatusCell {
        &self.transition_status
    }

    pub fn vote_status(&self) -> &StatusCell {
        &self.vote_status
    }

    pub fn results_status(&self) -> &StatusCell {
        &self.results_status
    }

    /// Hash of the most recently confirmed transaction from this client.
    pub fn last_tx(&self) -> Option<B256> {
        *self.last_tx.read().unwrap()
    }

    /// Current phase as the contract reports it. Always legal.
    pub async fn phase(&self) -> Result<Phase, TallyError> {
        let code = self
            .tally
            .phase()
            .await
            .map_err(|e| TallyError::ContractRead(e.to_string()))?;
        Phase::from_code(code)
            .ok_or_else(|| TallyError::ContractRead(format!("unknown phase code {code}")))
    }

    pub async fn owner(&self) -> Result<Address, TallyError> {
        self.tally
            .owner()
            .await
            .map_err(|e| TallyError::ContractRead(e.to_string()))
    }

    pub async fn is_owner(&self) -> Result<bool, TallyError> {
        Ok(self.owner().await? == self.user)
    }

    /// Candidate names in candidate order, fixed at session creation.
    pub async fn candidates(&self) -> Result<Vec<String>, TallyError> {
        let count = self
            .tally
            .candidate_count()
            .await
            .map_err(|e| TallyError::ContractRead(e.to_string()))?;
        let mut names = Vec::with_capacity(count as usize);
        for index in 0..count {
            let name = self
                .tally
                .candidate(index)
                .await
                .map_err(|e| TallyError::ContractRead(e.to_string()))?;
            names.push(name);
        }
        Ok(names)
    }

    /// Creates the per-candidate encrypted tallies. Legal only in `Setup`
    /// before the tallies exist.
    pub async fn init_tallies(&self) -> Result<B256, TallyError> {
        self.transition_status.begin();
        let checks = self.transition_checks().await;
        let checks = checks.and_then(|(phase, initialized)| {
            if phase != Phase::Setup || initialized {
                return Err(TallyError::InvalidPhase {
                    expected: "setup, tallies not yet initialized".into(),
                    actual: phase,
                });
            }
            Ok(())
        });
        if let Err(err) = checks {
            self.transition_status.fail(err.to_string());
            return Err(err);
        }

        let tally = self.tally.clone();
        self.submit_transition("init-tallies", move || async move {
            tally.init_tallies().await
        })
        .await
    }

    /// Opens voting. Legal only in `Setup` once the tallies are initialized.
    pub async fn open_voting(&self) -> Result<B256, TallyError> {
        self.transition_status.begin();
        let checks = self.transition_checks().await;
        let checks = checks.and_then(|(phase, initialized)| {
            if phase != Phase::Setup || !initialized {
                return Err(TallyError::InvalidPhase {
                    expected: "setup, with tallies initialized".into(),
                    actual: phase,
                });
            }
            Ok(())
        });
        if let Err(err) = checks {
            self.transition_status.fail(err.to_string());
            return Err(err);
        }

        let tally = self.tally.clone();
        self.submit_transition("open", move || async move { tally.open().await })
            .await
    }

    /// Closes voting. Legal only in `Open`.
    pub async fn close_voting(&self) -> Result<B256, TallyError> {
        self.transition_status.begin();
        if let Err(err) = self.require_owner_and_phase(Phase::Open, "open").await {
            self.transition_status.fail(err.to_string());
            return Err(err);
        }

        let tally = self.tally.clone();
        self.submit_transition("close", move || async move { tally.close().await })
            .await
    }

    /// Makes the tallies publicly decryptable. Legal only in `Closed`.
    pub async fn make_tallies_public(&self) -> Result<B256, TallyError> {
        self.transition_status.begin();
        if let Err(err) = self.require_owner_and_phase(Phase::Closed, "closed").await {
            self.transition_status.fail(err.to_string());
            return Err(err);
        }

        let tally = self.tally.clone();
        self.submit_transition("make-tallies-public", move || async move {
            tally.make_tallies_public().await
        })
        .await
    }

    /// Casts an encrypted vote for `candidate_index`. Legal only while the
    /// session is exactly in `Open`; one-vote-per-address enforcement is the
    /// contract's concern, the client only forwards the submission.
    pub async fn vote(&self, candidate_index: usize) -> Result<B256, TallyError> {
        self.vote_status.begin();

        let index: u8 = candidate_index.try_into().map_err(|_| {
            let err = TallyError::InvalidContext(format!(
                "candidate index {candidate_index} exceeds the 8-bit input width"
            ));
            self.vote_status.fail(err.to_string());
            err
        })?;

        let phase = self.phase().await.map_err(|e| {
            self.vote_status.fail(e.to_string());
            e
        })?;
        if phase != Phase::Open {
            let err = TallyError::InvalidPhase {
                expected: "open".into(),
                actual: phase,
            };
            self.vote_status.fail(err.to_string());
            return Err(err);
        }

        let mut builder = EncryptedInputBuilder::new(self.tally_address, self.user);
        builder.add_u8(index);
        let encrypted = builder.encrypt(&*self.coprocessor).await.map_err(|e| {
            let err: TallyError = e.into();
            self.vote_status.fail(err.to_string());
            err
        })?;
        let (handles, proof) = encrypted
            .take_for(self.tally_address, self.user)
            .map_err(|e| {
                let err: TallyError = e.into();
                self.vote_status.fail(err.to_string());
                err
            })?;
        let choice = handles[0];

        let tally = self.tally.clone();
        let report = Sequencer::run(vec![TxStep::new("vote", move || async move {
            tally.submit_vote(choice, proof).await
        })])
        .await;
        match sequence_error(&report) {
            Some(err) => {
                self.vote_status.fail(err.to_string());
                Err(err)
            }
            None => {
                let tx = report.last_tx().unwrap_or_default();
                self.record_tx(tx);
                self.vote_status.succeed();
                Ok(tx)
            }
        }
    }

    /// Fetches one encrypted tally handle per candidate, in candidate order.
    /// Legal from `Closed` onward. Returns `Ok(None)` when superseded by a
    /// refresh initiated later.
    pub async fn read_results(&self) -> Result<Option<Vec<CiphertextHandle>>, TallyError> {
        let generation = self.result_generations.begin();
        self.results_status.begin();

        let outcome = self.fetch_results().await;

        if !self.result_generations.is_current(generation) {
            info!("result refresh superseded, discarding handles");
            return Ok(None);
        }
        match outcome {
            Ok(handles) => {
                self.results_status.succeed();
                Ok(Some(handles))
            }
            Err(err) => {
                self.results_status.fail(err.to_string());
                Err(err)
            }
        }
    }

    /// Publicly decrypts tally handles, returning one canonical numeric value
    /// per input handle in the same order. Legal only in `TalliesPublic`;
    /// unlike balance decryption this path needs no per-user authorization.
    pub async fn public_decrypt_results(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<Option<Vec<u128>>, TallyError> {
        let generation = self.decrypt_generations.begin();
        self.results_status.begin();

        let outcome = self.decrypt_handles(handles).await;

        if !self.decrypt_generations.is_current(generation) {
            info!("result decryption superseded, discarding values");
            return Ok(None);
        }
        match outcome {
            Ok(values) => {
                self.results_status.succeed();
                Ok(Some(values))
            }
            Err(err) => {
                self.results_status.fail(err.to_string());
                Err(err)
            }
        }
    }

    async fn fetch_results(&self) -> Result<Vec<CiphertextHandle>, TallyError> {
        let phase = self.phase().await?;
        if phase < Phase::Closed {
            return Err(TallyError::InvalidPhase {
                expected: "closed or later".into(),
                actual: phase,
            });
        }

        let count = self
            .tally
            .candidate_count()
            .await
            .map_err(|e| TallyError::ContractRead(e.to_string()))?;
        let mut handles = Vec::with_capacity(count as usize);
        for index in 0..count {
            let handle = self
                .tally
                .encrypted_tally(index)
                .await
                .map_err(|e| TallyError::ContractRead(e.to_string()))?;
            handles.push(handle);
        }
        Ok(handles)
    }

    async fn decrypt_handles(&self, handles: &[CiphertextHandle]) -> Result<Vec<u128>, TallyError> {
        let phase = self.phase().await?;
        if phase != Phase::TalliesPublic {
            return Err(TallyError::InvalidPhase {
                expected: "tallies-public".into(),
                actual: phase,
            });
        }
        if let Some(handle) = handles.iter().find(|handle| handle.is_zero()) {
            return Err(TallyError::MalformedHandle(format!(
                "zero tally handle {handle}"
            )));
        }

        let raw = self
            .coprocessor
            .public_decrypt(handles)
            .await
            .map_err(|e| TallyError::DecryptionFailed(e.to_string()))?;

        let mut values = Vec::with_capacity(handles.len());
        for handle in handles {
            let value = raw.get(handle).ok_or_else(|| {
                TallyError::DecryptionFailed(format!("gateway returned no value for {handle}"))
            })?;
            values.push(normalize(value));
        }
        Ok(values)
    }

    async fn transition_checks(&self) -> Result<(Phase, bool), TallyError> {
        self.require_owner().await?;
        let phase = self.phase().await?;
        let initialized = self
            .tally
            .tallies_initialized()
            .await
            .map_err(|e| TallyError::ContractRead(e.to_string()))?;
        Ok((phase, initialized))
    }

    async fn require_owner_and_phase(
        &self,
        expected: Phase,
        expected_name: &str,
    ) -> Result<(), TallyError> {
        self.require_owner().await?;
        let phase = self.phase().await?;
        if phase != expected {
            return Err(TallyError::InvalidPhase {
                expected: expected_name.into(),
                actual: phase,
            });
        }
        Ok(())
    }

    async fn require_owner(&self) -> Result<(), TallyError> {
        if !self.is_owner().await? {
            return Err(TallyError::Unauthorized(
                "phase transitions are owner-only".into(),
            ));
        }
        Ok(())
    }

    async fn submit_transition<F, Fut>(&self, label: &str, action: F) -> Result<B256, TallyError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<B256, StepError>> + Send + 'static,
    {
        let report = Sequencer::run(vec![TxStep::new(label, action)]).await;
        match sequence_error(&report) {
            Some(err) => {
                self.transition_status.fail(err.to_string());
                Err(err)
            }
            None => {
                let tx = report.last_tx().unwrap_or_default();
                self.record_tx(tx);
                self.transition_status.succeed();
                Ok(tx)
            }
        }
    }

    fn record_tx(&self, tx: B256) {
        *self.last_tx.write().unwrap() = Some(tx);
    }
}
