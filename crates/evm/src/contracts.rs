// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::providers::fillers::BlobGasFiller;
use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::Address,
    providers::fillers::{
        ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
    },
    providers::{Identity, Provider, ProviderBuilder, RootProvider},
    signers::local::PrivateKeySigner,
    sol,
};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

sol! {
    /// Balance-holding ledger keeping one encrypted balance per account.
    #[derive(Debug)]
    #[sol(rpc)]
    contract ConfidentialLedger {
        function owner() external view returns (address);
        function getUsers() external view returns (address[] memory);
        function getBalance(address user) external view returns (bytes32);
        function fundContract(uint256 amount) external;
        function sendToUser(address user, bytes32 encryptedAmount, bytes calldata inputProof) external;
        function sendToManyUsers(address[] calldata recipients, bytes32[] calldata encryptedAmounts, bytes calldata inputProof) external;
        function withdraw(uint256 amount, bytes32 encryptedAmount, bytes calldata inputProof) external;
        function ownerWithdraw(uint256 amount) external;
        function allowDecryptForMe() external;
    }

    /// Plaintext asset token backing the ledger treasury.
    #[derive(Debug)]
    #[sol(rpc)]
    contract AssetToken {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }

    /// Self-service confidential token with encrypted balances.
    #[derive(Debug)]
    #[sol(rpc)]
    contract ConfidentialToken {
        function airDrop(bytes32 encryptedAmount, bytes calldata inputProof) external;
        function mintConfidential(address to, bytes32 encryptedAmount, bytes calldata inputProof) external;
        function confidentialBalanceOf(address account) external view returns (bytes32);
        function allowSelfBalanceDecrypt() external;
    }

    /// Four-phase confidential voting tally.
    #[derive(Debug)]
    #[sol(rpc)]
    contract PhasedTally {
        function owner() external view returns (address);
        function phase() external view returns (uint8);
        function talliesInitialized() external view returns (bool);
        function candidateCount() external view returns (uint256);
        function candidates(uint256 index) external view returns (string memory);
        function getEncryptedTally(uint256 index) external view returns (bytes32);
        function initTallies() external;
        function open() external;
        function close() external;
        function makeTalliesPublic() external;
        function submitVote(bytes32 encryptedChoice, bytes calldata inputProof) external;
    }
}

/// Addresses of the deployed contract suite on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub ledger: Address,
    pub asset: Address,
    pub token: Address,
    pub tally: Address,
}

/// Generic type to represent different provider types
pub trait ProviderType: Send + Sync {
    type Provider: Provider + Send + Sync + 'static;
}

/// Marker type for read-only provider
#[derive(Clone)]
pub struct ReadOnly;
impl ProviderType for ReadOnly {
    type Provider = ChainReadOnlyProvider;
}

/// Marker type for read-write provider
#[derive(Clone)]
pub struct ReadWrite;
impl ProviderType for ReadWrite {
    type Provider = ChainWriteProvider;
}

/// One provider shared by the whole contract suite.
#[derive(Clone)]
pub struct ChainClient<T: ProviderType> {
    pub provider: Arc<T::Provider>,
    pub addresses: ContractAddresses,
    _marker: PhantomData<T>,
}

impl<T: ProviderType> ChainClient<T> {
    pub fn addresses(&self) -> &ContractAddresses {
        &self.addresses
    }

    pub async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }
}

impl ChainClient<ReadWrite> {
    pub async fn connect(
        http_rpc_url: &str,
        private_key: &str,
        addresses: ContractAddresses,
    ) -> Result<ChainClient<ReadWrite>> {
        ChainClientFactory::create_write(http_rpc_url, private_key, addresses).await
    }
}

impl ChainClient<ReadOnly> {
    pub async fn read_only(
        http_rpc_url: &str,
        addresses: ContractAddresses,
    ) -> Result<ChainClient<ReadOnly>> {
        ChainClientFactory::create_read(http_rpc_url, addresses).await
    }
}

/// Type alias for read-only provider
pub type ChainReadOnlyProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
>;

/// Type alias for read-write provider
pub type ChainWriteProvider = FillProvider<
    JoinFill<
        JoinFill<
            JoinFill<
                Identity,
                JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
            >,
            WalletFiller<EthereumWallet>,
        >,
        NonceFiller,
    >,
    RootProvider<Ethereum>,
    Ethereum,
>;

// Factory for creating chain client instances
pub struct ChainClientFactory;

impl ChainClientFactory {
    /// Create a write-capable client
    pub async fn create_write(
        http_rpc_url: &str,
        private_key: &str,
        addresses: ContractAddresses,
    ) -> Result<ChainClient<ReadWrite>> {
        let signer: PrivateKeySigner = private_key.parse()?;
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .with_cached_nonce_management()
            .connect(http_rpc_url)
            .await?;

        Ok(ChainClient::<ReadWrite> {
            provider: Arc::new(provider),
            addresses,
            _marker: PhantomData,
        })
    }

    /// Create a read-only client
    pub async fn create_read(
        http_rpc_url: &str,
        addresses: ContractAddresses,
    ) -> Result<ChainClient<ReadOnly>> {
        let provider = ProviderBuilder::new().connect(http_rpc_url).await?;

        Ok(ChainClient::<ReadOnly> {
            provider: Arc::new(provider),
            addresses,
            _marker: PhantomData,
        })
    }
}
