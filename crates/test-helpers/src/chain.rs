// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{next_tx, MockCoprocessor, ASSET_ADDRESS, LEDGER_ADDRESS, TOKEN_ADDRESS};
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use cvl_evm::{AssetRead, AssetWrite, LedgerRead, LedgerWrite, TokenRead, TokenWrite};
use cvl_fhe::CiphertextHandle;
use cvl_sequencer::StepError;
use eyre::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Plaintext asset token double with session-scoped approvals.
pub struct MockAsset {
    caller: Address,
    balances: Mutex<HashMap<Address, U256>>,
    allowances: Mutex<HashMap<(Address, Address), U256>>,
    pub read_calls: AtomicUsize,
    pub approve_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_next: Mutex<Option<StepError>>,
}

impl MockAsset {
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            balances: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            read_calls: AtomicUsize::new(0),
            approve_calls: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_next: Mutex::new(None),
        }
    }

    pub fn fail_next_write(&self, error: StepError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Makes every balance/allowance read fail, as a flaky RPC would.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn set_balance(&self, account: Address, amount: U256) {
        self.balances.lock().unwrap().insert(account, amount);
    }

    pub fn allowance_of(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .lock()
            .unwrap()
            .get(&(owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn credit(&self, account: Address, amount: U256) {
        let mut balances = self.balances.lock().unwrap();
        let entry = balances.entry(account).or_insert(U256::ZERO);
        *entry += amount;
    }

    fn debit_allowance(&self, owner: Address, spender: Address, amount: U256) -> bool {
        let mut allowances = self.allowances.lock().unwrap();
        match allowances.get_mut(&(owner, spender)) {
            Some(allowance) if *allowance >= amount => {
                *allowance -= amount;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl AssetRead for MockAsset {
    async fn balance_of(&self, account: Address) -> Result<U256> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            eyre::bail!("rpc unavailable");
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&account)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        Ok(self.allowance_of(owner, spender))
    }
}

#[async_trait]
impl AssetWrite for MockAsset {
    async fn approve(&self, spender: Address, amount: U256) -> Result<B256, StepError> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        self.allowances
            .lock()
            .unwrap()
            .insert((self.caller, spender), amount);
        Ok(next_tx())
    }
}

/// Confidential ledger double.
///
/// Encrypted amounts are honored by resolving handles through the shared
/// [`MockCoprocessor`], the way the real ledger's coprocessor network would;
/// every write verifies the submitted proof covers exactly the submitted
/// handles.
pub struct MockLedger {
    address: Address,
    caller: Address,
    owner: Address,
    coprocessor: Arc<MockCoprocessor>,
    asset: Arc<MockAsset>,
    balances: Mutex<HashMap<Address, u128>>,
    balance_handles: Mutex<HashMap<Address, CiphertextHandle>>,
    pub batch_submissions: Mutex<Vec<(Vec<Address>, Vec<CiphertextHandle>, Bytes)>>,
    pub write_calls: AtomicUsize,
    fail_next: Mutex<Option<StepError>>,
}

impl MockLedger {
    pub fn new(caller: Address, coprocessor: Arc<MockCoprocessor>, asset: Arc<MockAsset>) -> Self {
        Self {
            address: LEDGER_ADDRESS,
            caller,
            owner: caller,
            coprocessor,
            asset,
            balances: Mutex::new(HashMap::new()),
            balance_handles: Mutex::new(HashMap::new()),
            batch_submissions: Mutex::new(Vec::new()),
            write_calls: AtomicUsize::new(0),
            fail_next: Mutex::new(None),
        }
    }

    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owner = owner;
        self
    }

    pub fn fail_next_write(&self, error: StepError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn balance_plaintext(&self, account: Address) -> u128 {
        self.balances
            .lock()
            .unwrap()
            .get(&account)
            .copied()
            .unwrap_or(0)
    }

    fn take_fail(&self) -> Option<StepError> {
        self.fail_next.lock().unwrap().take()
    }

    fn resolve(&self, handle: &CiphertextHandle) -> Result<u128, StepError> {
        self.coprocessor
            .plaintext_of(handle)
            .ok_or_else(|| StepError::Submit(format!("unknown ciphertext handle {handle}")))
    }

    fn credit(&self, account: Address, amount: u128) {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(account).or_insert(0);
        *balance += amount;
        let handle = self.coprocessor.register(self.address, *balance);
        self.balance_handles.lock().unwrap().insert(account, handle);
    }

    fn debit(&self, account: Address, amount: u128) -> Result<(), StepError> {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(account).or_insert(0);
        if *balance < amount {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        *balance -= amount;
        let handle = self.coprocessor.register(self.address, *balance);
        self.balance_handles.lock().unwrap().insert(account, handle);
        Ok(())
    }
}

#[async_trait]
impl LedgerRead for MockLedger {
    async fn owner(&self) -> Result<Address> {
        Ok(self.owner)
    }

    async fn users(&self) -> Result<Vec<Address>> {
        Ok(self.balances.lock().unwrap().keys().copied().collect())
    }

    async fn balance_handle_of(&self, user: Address) -> Result<CiphertextHandle> {
        Ok(self
            .balance_handles
            .lock()
            .unwrap()
            .get(&user)
            .copied()
            .unwrap_or_else(CiphertextHandle::zero))
    }
}

#[async_trait]
impl LedgerWrite for MockLedger {
    async fn fund_treasury(&self, amount: U256) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        if !self.asset.debit_allowance(self.caller, self.address, amount) {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        self.asset.credit(self.address, amount);
        Ok(next_tx())
    }

    async fn send_to(
        &self,
        recipient: Address,
        amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        if !self.coprocessor.proof_covers(&proof, &[amount]) {
            return Err(StepError::Submit("proof does not cover handle".into()));
        }
        let value = self.resolve(&amount)?;
        self.credit(recipient, value);
        Ok(next_tx())
    }

    async fn send_to_many(
        &self,
        recipients: Vec<Address>,
        amounts: Vec<CiphertextHandle>,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        if recipients.len() != amounts.len() {
            return Err(StepError::Submit("length mismatch".into()));
        }
        // The batching rule: one proof must cover the whole ordered handle
        // list, exactly as submitted.
        if !self.coprocessor.proof_covers(&proof, &amounts) {
            return Err(StepError::Submit("proof does not cover batch".into()));
        }
        for (recipient, handle) in recipients.iter().zip(&amounts) {
            let value = self.resolve(handle)?;
            self.credit(*recipient, value);
        }
        self.batch_submissions
            .lock()
            .unwrap()
            .push((recipients, amounts, proof));
        Ok(next_tx())
    }

    async fn withdraw(
        &self,
        amount: U256,
        encrypted_amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        if !self.coprocessor.proof_covers(&proof, &[encrypted_amount]) {
            return Err(StepError::Submit("proof does not cover handle".into()));
        }
        let value = self.resolve(&encrypted_amount)?;
        if U256::from(value) != amount {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        self.debit(self.caller, value)?;
        Ok(next_tx())
    }

    async fn owner_withdraw(&self, amount: U256) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        if self.caller != self.owner {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        let _ = amount;
        Ok(next_tx())
    }

    async fn allow_self_decrypt(&self) -> Result<B256, StepError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fail() {
            return Err(error);
        }
        Ok(next_tx())
    }
}

/// Confidential token double backing the faucet client.
pub struct MockToken {
    address: Address,
    caller: Address,
    coprocessor: Arc<MockCoprocessor>,
    balances: Mutex<HashMap<Address, u128>>,
    balance_handles: Mutex<HashMap<Address, CiphertextHandle>>,
    fail_next: Mutex<Option<StepError>>,
}

impl MockToken {
    pub fn new(caller: Address, coprocessor: Arc<MockCoprocessor>) -> Self {
        Self {
            address: TOKEN_ADDRESS,
            caller,
            coprocessor,
            balances: Mutex::new(HashMap::new()),
            balance_handles: Mutex::new(HashMap::new()),
            fail_next: Mutex::new(None),
        }
    }

    pub fn fail_next_write(&self, error: StepError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn balance_plaintext(&self, account: Address) -> u128 {
        self.balances
            .lock()
            .unwrap()
            .get(&account)
            .copied()
            .unwrap_or(0)
    }

    fn credit(&self, account: Address, amount: u128) {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(account).or_insert(0);
        *balance += amount;
        let handle = self.coprocessor.register(self.address, *balance);
        self.balance_handles.lock().unwrap().insert(account, handle);
    }
}

#[async_trait]
impl TokenRead for MockToken {
    async fn confidential_balance_of(&self, account: Address) -> Result<CiphertextHandle> {
        Ok(self
            .balance_handles
            .lock()
            .unwrap()
            .get(&account)
            .copied()
            .unwrap_or_else(CiphertextHandle::zero))
    }
}

#[async_trait]
impl TokenWrite for MockToken {
    async fn air_drop(&self, amount: CiphertextHandle, proof: Bytes) -> Result<B256, StepError> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }
        if !self.coprocessor.proof_covers(&proof, &[amount]) {
            return Err(StepError::Submit("proof does not cover handle".into()));
        }
        let value = self
            .coprocessor
            .plaintext_of(&amount)
            .ok_or_else(|| StepError::Submit("unknown ciphertext handle".into()))?;
        self.credit(self.caller, value);
        Ok(next_tx())
    }

    async fn mint_confidential(
        &self,
        to: Address,
        amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }
        if !self.coprocessor.proof_covers(&proof, &[amount]) {
            return Err(StepError::Submit("proof does not cover handle".into()));
        }
        let value = self
            .coprocessor
            .plaintext_of(&amount)
            .ok_or_else(|| StepError::Submit("unknown ciphertext handle".into()))?;
        self.credit(to, value);
        Ok(next_tx())
    }

    async fn allow_self_balance_decrypt(&self) -> Result<B256, StepError> {
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }
        Ok(next_tx())
    }
}

/// Everything a ledger-side test needs, wired to one shared coprocessor.
pub struct MockChain {
    pub coprocessor: Arc<MockCoprocessor>,
    pub asset: Arc<MockAsset>,
    pub ledger: Arc<MockLedger>,
    pub token: Arc<MockToken>,
}

impl MockChain {
    pub fn new(caller: Address) -> Self {
        let coprocessor = Arc::new(MockCoprocessor::new());
        let asset = Arc::new(MockAsset::new(caller));
        let ledger = Arc::new(MockLedger::new(caller, coprocessor.clone(), asset.clone()));
        let token = Arc::new(MockToken::new(caller, coprocessor.clone()));
        Self {
            coprocessor,
            asset,
            ledger,
            token,
        }
    }

    pub fn asset_address(&self) -> Address {
        ASSET_ADDRESS
    }
}
