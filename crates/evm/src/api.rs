// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    call_with_retry, AssetToken, ChainClient, ConfidentialLedger, ConfidentialToken, PhasedTally,
    ProviderType, ReadWrite,
};
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use cvl_fhe::CiphertextHandle;
use cvl_sequencer::StepError;
use eyre::{eyre, Result};

/// Read-only operations on the confidential ledger contract.
#[async_trait]
pub trait LedgerRead: Send + Sync {
    async fn owner(&self) -> Result<Address>;

    async fn users(&self) -> Result<Vec<Address>>;

    /// The ciphertext handle of `user`'s encrypted balance; zero when the
    /// account has never been credited.
    async fn balance_handle_of(&self, user: Address) -> Result<CiphertextHandle>;
}

/// Write operations on the confidential ledger contract. Each call submits
/// one transaction and waits for its confirmation.
#[async_trait]
pub trait LedgerWrite: Send + Sync {
    async fn fund_treasury(&self, amount: U256) -> Result<B256, StepError>;

    async fn send_to(
        &self,
        recipient: Address,
        amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError>;

    async fn send_to_many(
        &self,
        recipients: Vec<Address>,
        amounts: Vec<CiphertextHandle>,
        proof: Bytes,
    ) -> Result<B256, StepError>;

    async fn withdraw(
        &self,
        amount: U256,
        encrypted_amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError>;

    async fn owner_withdraw(&self, amount: U256) -> Result<B256, StepError>;

    async fn allow_self_decrypt(&self) -> Result<B256, StepError>;
}

/// Combined ledger surface used by the ledger client.
pub trait LedgerApi: LedgerRead + LedgerWrite {}
impl<T: LedgerRead + LedgerWrite> LedgerApi for T {}

/// Read-only operations on the plaintext asset token.
#[async_trait]
pub trait AssetRead: Send + Sync {
    async fn balance_of(&self, account: Address) -> Result<U256>;

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256>;
}

#[async_trait]
pub trait AssetWrite: Send + Sync {
    async fn approve(&self, spender: Address, amount: U256) -> Result<B256, StepError>;
}

pub trait AssetApi: AssetRead + AssetWrite {}
impl<T: AssetRead + AssetWrite> AssetApi for T {}

/// Operations on the self-service confidential token.
#[async_trait]
pub trait TokenRead: Send + Sync {
    async fn confidential_balance_of(&self, account: Address) -> Result<CiphertextHandle>;
}

#[async_trait]
pub trait TokenWrite: Send + Sync {
    async fn air_drop(&self, amount: CiphertextHandle, proof: Bytes) -> Result<B256, StepError>;

    async fn mint_confidential(
        &self,
        to: Address,
        amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError>;

    async fn allow_self_balance_decrypt(&self) -> Result<B256, StepError>;
}

pub trait TokenApi: TokenRead + TokenWrite {}
impl<T: TokenRead + TokenWrite> TokenApi for T {}

/// Read-only operations on the phased tally contract. All of these are
/// side-effect-free and legal in every phase.
#[async_trait]
pub trait TallyRead: Send + Sync {
    async fn owner(&self) -> Result<Address>;

    /// Raw phase discriminant as stored by the contract.
    async fn phase(&self) -> Result<u8>;

    async fn tallies_initialized(&self) -> Result<bool>;

    async fn candidate_count(&self) -> Result<u64>;

    async fn candidate(&self, index: u64) -> Result<String>;

    async fn encrypted_tally(&self, index: u64) -> Result<CiphertextHandle>;
}

#[async_trait]
pub trait TallyWrite: Send + Sync {
    async fn init_tallies(&self) -> Result<B256, StepError>;

    async fn open(&self) -> Result<B256, StepError>;

    async fn close(&self) -> Result<B256, StepError>;

    async fn make_tallies_public(&self) -> Result<B256, StepError>;

    async fn submit_vote(&self, choice: CiphertextHandle, proof: Bytes)
        -> Result<B256, StepError>;
}

pub trait TallyApi: TallyRead + TallyWrite {}
impl<T: TallyRead + TallyWrite> TallyApi for T {}

fn submit_err(e: impl std::fmt::Display) -> StepError {
    StepError::Submit(e.to_string())
}

fn confirm_err(e: impl std::fmt::Display) -> StepError {
    StepError::Confirm(e.to_string())
}

// Sends one transaction and waits for a successful receipt.
macro_rules! confirm {
    ($builder:expr) => {{
        let pending = $builder.send().await.map_err(submit_err)?;
        let receipt = pending.get_receipt().await.map_err(confirm_err)?;
        if !receipt.status() {
            return Err(StepError::Confirm("transaction reverted".into()));
        }
        Ok(receipt.transaction_hash)
    }};
}

#[async_trait]
impl<T: ProviderType> LedgerRead for ChainClient<T> {
    async fn owner(&self) -> Result<Address> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        Ok(contract.owner().call().await?)
    }

    async fn users(&self) -> Result<Vec<Address>> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        Ok(contract.getUsers().call().await?)
    }

    async fn balance_handle_of(&self, user: Address) -> Result<CiphertextHandle> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        let raw = contract.getBalance(user).call().await?;
        Ok(CiphertextHandle::new(raw))
    }
}

#[async_trait]
impl LedgerWrite for ChainClient<ReadWrite> {
    async fn fund_treasury(&self, amount: U256) -> Result<B256, StepError> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        confirm!(contract.fundContract(amount))
    }

    async fn send_to(
        &self,
        recipient: Address,
        amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        confirm!(contract.sendToUser(recipient, amount.as_b256(), proof))
    }

    async fn send_to_many(
        &self,
        recipients: Vec<Address>,
        amounts: Vec<CiphertextHandle>,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        let handles = amounts.iter().map(|h| h.as_b256()).collect::<Vec<_>>();
        confirm!(contract.sendToManyUsers(recipients, handles, proof))
    }

    async fn withdraw(
        &self,
        amount: U256,
        encrypted_amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        confirm!(contract.withdraw(amount, encrypted_amount.as_b256(), proof))
    }

    async fn owner_withdraw(&self, amount: U256) -> Result<B256, StepError> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        confirm!(contract.ownerWithdraw(amount))
    }

    async fn allow_self_decrypt(&self) -> Result<B256, StepError> {
        let contract = ConfidentialLedger::new(self.addresses.ledger, &self.provider);
        confirm!(contract.allowDecryptForMe())
    }
}

#[async_trait]
impl<T: ProviderType> AssetRead for ChainClient<T> {
    async fn balance_of(&self, account: Address) -> Result<U256> {
        let contract = AssetToken::new(self.addresses.asset, &self.provider);
        call_with_retry("asset_balance_of", &[], || async {
            Ok(contract.balanceOf(account).call().await?)
        })
        .await
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        let contract = AssetToken::new(self.addresses.asset, &self.provider);
        Ok(contract.allowance(owner, spender).call().await?)
    }
}

#[async_trait]
impl AssetWrite for ChainClient<ReadWrite> {
    async fn approve(&self, spender: Address, amount: U256) -> Result<B256, StepError> {
        let contract = AssetToken::new(self.addresses.asset, &self.provider);
        confirm!(contract.approve(spender, amount))
    }
}

#[async_trait]
impl<T: ProviderType> TokenRead for ChainClient<T> {
    async fn confidential_balance_of(&self, account: Address) -> Result<CiphertextHandle> {
        let contract = ConfidentialToken::new(self.addresses.token, &self.provider);
        let raw = contract.confidentialBalanceOf(account).call().await?;
        Ok(CiphertextHandle::new(raw))
    }
}

#[async_trait]
impl TokenWrite for ChainClient<ReadWrite> {
    async fn air_drop(&self, amount: CiphertextHandle, proof: Bytes) -> Result<B256, StepError> {
        let contract = ConfidentialToken::new(self.addresses.token, &self.provider);
        confirm!(contract.airDrop(amount.as_b256(), proof))
    }

    async fn mint_confidential(
        &self,
        to: Address,
        amount: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        let contract = ConfidentialToken::new(self.addresses.token, &self.provider);
        confirm!(contract.mintConfidential(to, amount.as_b256(), proof))
    }

    async fn allow_self_balance_decrypt(&self) -> Result<B256, StepError> {
        let contract = ConfidentialToken::new(self.addresses.token, &self.provider);
        confirm!(contract.allowSelfBalanceDecrypt())
    }
}

#[async_trait]
impl<T: ProviderType> TallyRead for ChainClient<T> {
    async fn owner(&self) -> Result<Address> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        Ok(contract.owner().call().await?)
    }

    async fn phase(&self) -> Result<u8> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        call_with_retry("tally_phase", &[], || async {
            Ok(contract.phase().call().await?)
        })
        .await
    }

    async fn tallies_initialized(&self) -> Result<bool> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        Ok(contract.talliesInitialized().call().await?)
    }

    async fn candidate_count(&self) -> Result<u64> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        let count = contract.candidateCount().call().await?;
        u64::try_from(count).map_err(|_| eyre!("candidate count larger than 64-bit"))
    }

    async fn candidate(&self, index: u64) -> Result<String> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        Ok(contract.candidates(U256::from(index)).call().await?)
    }

    async fn encrypted_tally(&self, index: u64) -> Result<CiphertextHandle> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        let raw = contract.getEncryptedTally(U256::from(index)).call().await?;
        Ok(CiphertextHandle::new(raw))
    }
}

#[async_trait]
impl TallyWrite for ChainClient<ReadWrite> {
    async fn init_tallies(&self) -> Result<B256, StepError> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        confirm!(contract.initTallies())
    }

    async fn open(&self) -> Result<B256, StepError> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        confirm!(contract.open())
    }

    async fn close(&self) -> Result<B256, StepError> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        confirm!(contract.close())
    }

    async fn make_tallies_public(&self) -> Result<B256, StepError> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        confirm!(contract.makeTalliesPublic())
    }

    async fn submit_vote(
        &self,
        choice: CiphertextHandle,
        proof: Bytes,
    ) -> Result<B256, StepError> {
        let contract = PhasedTally::new(self.addresses.tally, &self.provider);
        confirm!(contract.submitVote(choice.as_b256(), proof))
    }
}
