// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{next_tx, MockCoprocessor, TALLY_ADDRESS};
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use cvl_evm::{TallyRead, TallyWrite};
use cvl_fhe::CiphertextHandle;
use cvl_sequencer::StepError;
use eyre::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const PHASE_SETUP: u8 = 0;
const PHASE_OPEN: u8 = 1;
const PHASE_CLOSED: u8 = 2;
const PHASE_TALLIES_PUBLIC: u8 = 3;

/// Phased voting contract double enforcing the same guards the contract
/// would, so an illegal client submission reverts rather than succeeds.
pub struct MockTally {
    address: Address,
    owner: Address,
    coprocessor: Arc<MockCoprocessor>,
    candidates: Vec<String>,
    phase: Mutex<u8>,
    initialized: AtomicBool,
    tallies: Mutex<Vec<u128>>,
    pub write_calls: AtomicUsize,
    pub vote_submissions: AtomicUsize,
    fail_next: Mutex<Option<StepError>>,
}

impl MockTally {
    pub fn new(owner: Address, candidates: Vec<String>, coprocessor: Arc<MockCoprocessor>) -> Self {
        Self {
            address: TALLY_ADDRESS,
            owner,
            coprocessor,
            candidates,
            phase: Mutex::new(PHASE_SETUP),
            initialized: AtomicBool::new(false),
            tallies: Mutex::new(Vec::new()),
            write_calls: AtomicUsize::new(0),
            vote_submissions: AtomicUsize::new(0),
            fail_next: Mutex::new(None),
        }
    }

    pub fn fail_next_write(&self, error: StepError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn tally_plaintext(&self, index: usize) -> u128 {
        self.tallies.lock().unwrap()[index]
    }

    fn take_fail(&self) -> Option<StepError> {
        self.fail_next.lock().unwrap().take()
    }

    fn transition(&self, from: u8, to: u8) -> Result<B256, StepError> {
        let mut phase = self.phase.lock().unwrap();
        if *phase != from {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        *phase = to;
        Ok(next_tx())
    }
}

#[async_trait]
impl TallyRead for MockTally {
    async fn owner(&self) -> Result<Address> {
        Ok(self.owner)
    }

    async fn phase(&self) -> Result<u8> {
        Ok(*self.phase.lock().unwrap())
    }

    async fn tallies_initialized(&self) -> Result<bool> {
        Ok(self.initialized.load(Ordering::SeqCst))
    }

    async fn candidate_count(&self) -> Result<u64> {
        Ok(self.candidates.len() as u64)
    }

    async fn candidate(&self, index: u64) -> Result<String> {
        self.candidates
            .get(index as usize)
            .cloned()
            .ok_or_else(|| eyre::eyre!("candidate index out of range"))
    }

    async fn encrypted_tally(&self, index: u64) -> Result<CiphertextHandle> {
        let tallies = self.tallies.lock().unwrap();
        let value = tallies
            .get(index as usize)
            .copied()
            .ok_or_else(|| eyre::eyre!("tally index out of range"))?;
        Ok(self.coprocessor.register(self.address, value))
    }
}

#[async_trait]
impl TallyWrite for MockTally {
    async fn init_tallies(&self) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        if *self.phase.lock().unwrap() != PHASE_SETUP || self.initialized.load(Ordering::SeqCst) {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        *self.tallies.lock().unwrap() = vec![0; self.candidates.len()];
        self.initialized.store(true, Ordering::SeqCst);
        Ok(next_tx())
    }

    async fn open(&self) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        self.transition(PHASE_SETUP, PHASE_OPEN)
    }

    async fn close(&self) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        self.transition(PHASE_OPEN, PHASE_CLOSED)
    }

    async fn make_tallies_public(&self) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        self.transition(PHASE_CLOSED, PHASE_TALLIES_PUBLIC)
    }

    async fn submit_vote(
        &self,
        choice: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.vote_submissions.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        if *self.phase.lock().unwrap() != PHASE_OPEN {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        if !self.coprocessor.proof_covers(&proof, &[choice]) {
            return Err(StepError::Submit("proof does not cover handle".into()));
        }
        let index = self
            .coprocessor
            .plaintext_of(&choice)
            .ok_or_else(|| StepError::Submit("unknown ciphertext handle".into()))?
            as usize;

        let mut tallies = self.tallies.lock().unwrap();
        if index >= tallies.len() {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        tallies[index] += 1;
        Ok(next_tx())
    }
}
