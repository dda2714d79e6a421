// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::{address, Address, U256};
use cvl_access::{AuthorizationManager, InMemoryStore, SharedStore};
use cvl_fhe::EncryptedInputBuilder;
use cvl_ledger::{FaucetClient, LedgerClient, LedgerError};
use cvl_sequencer::StepError;
use cvl_test_helpers::{MockChain, MockSigner, LEDGER_ADDRESS, TOKEN_ADDRESS};
use cvl_utils::OpStatus;
use std::sync::Arc;
use std::time::Duration;

const PAYER: Address = address!("00000000000000000000000000000000000000a1");
const ALICE: Address = address!("00000000000000000000000000000000000000a2");
const BOB: Address = address!("00000000000000000000000000000000000000a3");

const CHAIN_ID: u64 = 31337;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn access_for(user: Address, chain: &MockChain) -> Arc<AuthorizationManager<InMemoryStore>> {
    Arc::new(AuthorizationManager::new(
        chain.coprocessor.clone(),
        Arc::new(MockSigner::new(user)),
        SharedStore::new(InMemoryStore::new()),
    ))
}

fn client_for(user: Address, chain: &MockChain) -> LedgerClient<InMemoryStore> {
    LedgerClient::new(
        chain.ledger.clone(),
        chain.asset.clone(),
        chain.coprocessor.clone(),
        access_for(user, chain),
        user,
        LEDGER_ADDRESS,
        CHAIN_ID,
    )
}

#[tokio::test]
async fn pay_many_uses_one_proof_and_credits_each_recipient() {
    init_tracing();
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    payer.pay_many(&[ALICE, BOB], &[10, 20]).await.unwrap();
    assert_eq!(payer.pay_status().status(), OpStatus::Success);

    // Exactly one encryption pass produced the whole batch.
    assert_eq!(
        chain
            .coprocessor
            .encrypt_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    {
        let batches = chain.ledger.batch_submissions.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let (recipients, handles, proof) = &batches[0];
        assert_eq!(recipients, &[ALICE, BOB]);
        assert_eq!(handles.len(), 2);
        assert!(chain.coprocessor.proof_covers(proof, handles));
    }

    // Each recipient independently decrypts exactly their amount.
    let alice = client_for(ALICE, &chain);
    assert_eq!(alice.fetch_own_balance().await.unwrap(), Some(10));
    let bob = client_for(BOB, &chain);
    assert_eq!(bob.fetch_own_balance().await.unwrap(), Some(20));
}

#[tokio::test]
async fn pay_many_rejects_bad_batches_before_any_network_call() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    let err = payer.pay_many(&[ALICE], &[10, 20]).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidBatch(_)));

    let err = payer.pay_many(&[ALICE, BOB], &[10, 0]).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidBatch(_)));

    let err = payer.pay_many(&[], &[]).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidBatch(_)));

    assert_eq!(payer.pay_status().status(), OpStatus::Error);
    assert_eq!(
        chain
            .coprocessor
            .encrypt_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
    assert_eq!(
        chain
            .ledger
            .write_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn handles_round_trip_in_insertion_order() {
    let chain = MockChain::new(PAYER);

    let mut builder = EncryptedInputBuilder::new(LEDGER_ADDRESS, PAYER);
    for value in [11u128, 22, 33, 44, 55] {
        builder.add_u128(value);
    }
    let result = builder.encrypt(&*chain.coprocessor).await.unwrap();
    let handles = result.handles().to_vec();

    use cvl_fhe::{normalize, FheCoprocessor};
    let raw = chain.coprocessor.public_decrypt(&handles).await.unwrap();
    let values: Vec<u128> = handles.iter().map(|h| normalize(&raw[h])).collect();
    assert_eq!(values, vec![11, 22, 33, 44, 55]);
}

#[tokio::test]
async fn fund_runs_approve_then_fund() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    let report = payer.fund(U256::from(500)).await.unwrap();
    assert_eq!(report.confirmed_count(), 2);
    assert_eq!(payer.fund_status().status(), OpStatus::Success);

    assert_eq!(
        payer.read_contract_reserve().await.unwrap(),
        U256::from(500)
    );
    // The approval was consumed by the funding step.
    assert_eq!(
        chain.asset.allowance_of(PAYER, LEDGER_ADDRESS),
        U256::ZERO
    );
}

#[tokio::test]
async fn half_completed_fund_reports_the_outstanding_approval_and_retries_without_it() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    chain
        .ledger
        .fail_next_write(StepError::Confirm("transaction reverted".into()));
    let err = payer.fund(U256::from(500)).await.unwrap_err();
    match err {
        LedgerError::Unconfirmed {
            step, completed, ..
        } => {
            assert_eq!(step, "fund");
            assert_eq!(completed, 1);
        }
        other => panic!("expected Unconfirmed, got {other}"),
    }
    assert_eq!(payer.fund_status().status(), OpStatus::Error);
    // The approval is still outstanding, reported rather than reverted.
    assert_eq!(
        chain.asset.allowance_of(PAYER, LEDGER_ADDRESS),
        U256::from(500)
    );

    // Retrying only the funding step consumes it without a second prompt.
    payer.fund_approved(U256::from(500)).await.unwrap();
    assert_eq!(
        chain
            .asset
            .approve_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    assert_eq!(
        payer.read_contract_reserve().await.unwrap(),
        U256::from(500)
    );
}

#[tokio::test]
async fn payment_success_survives_a_failing_reserve_refresh() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    chain.asset.fail_reads();
    payer.pay(ALICE, 10).await.unwrap();
    assert_eq!(payer.pay_status().status(), OpStatus::Success);
    assert_eq!(chain.ledger.balance_plaintext(ALICE), 10);
}

#[tokio::test]
async fn encryption_failure_surfaces_before_submission() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    chain.coprocessor.fail_encryption();
    let err = payer.pay(ALICE, 10).await.unwrap_err();
    assert!(matches!(err, LedgerError::EncryptionFailed(_)));
    assert_eq!(payer.pay_status().status(), OpStatus::Error);
    assert_eq!(
        chain
            .ledger
            .write_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn failing_balance_refresh_does_not_poison_payments() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    // No ciphertext exists for the payer yet.
    let err = payer.fetch_own_balance().await.unwrap_err();
    assert!(matches!(err, LedgerError::MalformedHandle(_)));
    assert_eq!(payer.balance_status().status(), OpStatus::Error);

    payer.pay(ALICE, 10).await.unwrap();
    assert_eq!(payer.pay_status().status(), OpStatus::Success);
    assert_eq!(payer.balance_status().status(), OpStatus::Error);
}

#[tokio::test]
async fn superseded_balance_refresh_is_discarded() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);
    payer.pay(PAYER, 30).await.unwrap();

    // Force the decrypt path to suspend so the second refresh overtakes.
    chain
        .coprocessor
        .set_decrypt_delay(Duration::from_millis(10));
    let first = payer.fetch_own_balance();
    let second = payer.fetch_own_balance();
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), None);
    assert_eq!(second.unwrap(), Some(30));
    assert_eq!(payer.balance_status().status(), OpStatus::Success);
}

#[tokio::test]
async fn withdraw_debits_the_callers_encrypted_balance() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    payer.pay(PAYER, 50).await.unwrap();
    payer.withdraw(20).await.unwrap();
    assert_eq!(payer.withdraw_status().status(), OpStatus::Success);
    assert_eq!(chain.ledger.balance_plaintext(PAYER), 30);
    assert_eq!(payer.fetch_own_balance().await.unwrap(), Some(30));
}

#[tokio::test]
async fn ownership_and_account_listing_reads() {
    let chain = MockChain::new(PAYER);
    let payer = client_for(PAYER, &chain);

    assert!(payer.is_owner().await.unwrap());
    payer.grant_self_decrypt().await.unwrap();
    assert_eq!(payer.allow_decrypt_status().status(), OpStatus::Success);

    payer.pay(ALICE, 10).await.unwrap();
    let users = payer.list_users().await.unwrap();
    assert!(users.contains(&ALICE));

    let alice = client_for(ALICE, &chain);
    assert!(!alice.is_owner().await.unwrap());
}

#[tokio::test]
async fn faucet_claim_then_authorized_balance_decrypt() {
    let chain = MockChain::new(PAYER);
    let faucet = FaucetClient::new(
        chain.token.clone(),
        chain.coprocessor.clone(),
        access_for(PAYER, &chain),
        PAYER,
        TOKEN_ADDRESS,
    );

    faucet.claim(100).await.unwrap();
    assert_eq!(faucet.claim_status().status(), OpStatus::Success);
    assert_eq!(chain.token.balance_plaintext(PAYER), 100);

    assert_eq!(faucet.decrypt_own_balance().await.unwrap(), Some(100));
    assert_eq!(faucet.balance_status().status(), OpStatus::Success);
}

#[tokio::test]
async fn faucet_mint_credits_the_recipient() {
    let chain = MockChain::new(PAYER);
    let faucet = FaucetClient::new(
        chain.token.clone(),
        chain.coprocessor.clone(),
        access_for(PAYER, &chain),
        PAYER,
        TOKEN_ADDRESS,
    );

    faucet.mint(ALICE, 70).await.unwrap();
    assert_eq!(chain.token.balance_plaintext(ALICE), 70);
}
