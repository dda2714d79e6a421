// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::{address, Address};
use cvl_fhe::CiphertextHandle;
use cvl_tally::{Phase, TallyClient, TallyError};
use cvl_test_helpers::{MockCoprocessor, MockTally, TALLY_ADDRESS};
use cvl_utils::OpStatus;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const OWNER: Address = address!("00000000000000000000000000000000000000b1");
const VOTER: Address = address!("00000000000000000000000000000000000000b2");

const CHAIN_ID: u64 = 31337;

struct Setup {
    coprocessor: Arc<MockCoprocessor>,
    tally: Arc<MockTally>,
}

impl Setup {
    fn new() -> Self {
        let coprocessor = Arc::new(MockCoprocessor::new());
        let tally = Arc::new(MockTally::new(
            OWNER,
            vec!["Alice".into(), "Bob".into(), "Charlie".into()],
            coprocessor.clone(),
        ));
        Self { coprocessor, tally }
    }

    fn client_for(&self, user: Address) -> TallyClient {
        TallyClient::new(
            self.tally.clone(),
            self.coprocessor.clone(),
            user,
            TALLY_ADDRESS,
            CHAIN_ID,
        )
    }
}

#[tokio::test]
async fn full_lifecycle_counts_votes_per_candidate() {
    let setup = Setup::new();
    let owner = setup.client_for(OWNER);
    let voter = setup.client_for(VOTER);

    assert_eq!(owner.phase().await.unwrap(), Phase::Setup);
    assert_eq!(
        owner.candidates().await.unwrap(),
        vec!["Alice", "Bob", "Charlie"]
    );

    owner.init_tallies().await.unwrap();
    owner.open_voting().await.unwrap();
    assert_eq!(owner.phase().await.unwrap(), Phase::Open);

    voter.vote(1).await.unwrap();
    assert_eq!(voter.vote_status().status(), OpStatus::Success);
    assert!(voter.last_tx().is_some());

    owner.close_voting().await.unwrap();
    owner.make_tallies_public().await.unwrap();
    assert_eq!(owner.phase().await.unwrap(), Phase::TalliesPublic);

    let handles = owner.read_results().await.unwrap().unwrap();
    assert_eq!(handles.len(), 3);

    let values = owner
        .public_decrypt_results(&handles)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(values, vec![0, 1, 0]);
}

#[tokio::test]
async fn open_without_initialized_tallies_is_an_invalid_phase() {
    let setup = Setup::new();
    let owner = setup.client_for(OWNER);

    let err = owner.open_voting().await.unwrap_err();
    assert!(matches!(err, TallyError::InvalidPhase { .. }));
    assert_eq!(owner.transition_status().status(), OpStatus::Error);
    // Nothing was submitted.
    assert_eq!(setup.tally.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn vote_is_legal_only_while_open() {
    let setup = Setup::new();
    let owner = setup.client_for(OWNER);
    let voter = setup.client_for(VOTER);

    // Setup phase.
    let err = voter.vote(0).await.unwrap_err();
    assert!(matches!(err, TallyError::InvalidPhase { .. }));

    owner.init_tallies().await.unwrap();
    owner.open_voting().await.unwrap();
    voter.vote(0).await.unwrap();

    owner.close_voting().await.unwrap();
    let err = voter.vote(0).await.unwrap_err();
    assert!(matches!(err, TallyError::InvalidPhase { .. }));

    owner.make_tallies_public().await.unwrap();
    let err = voter.vote(0).await.unwrap_err();
    assert!(matches!(err, TallyError::InvalidPhase { .. }));

    // Only the single legal vote ever reached the contract.
    assert_eq!(setup.tally.vote_submissions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transitions_are_owner_only() {
    let setup = Setup::new();
    let voter = setup.client_for(VOTER);

    let err = voter.init_tallies().await.unwrap_err();
    assert!(matches!(err, TallyError::Unauthorized(_)));
    assert_eq!(setup.tally.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn results_are_unreadable_before_closing() {
    let setup = Setup::new();
    let owner = setup.client_for(OWNER);

    owner.init_tallies().await.unwrap();
    owner.open_voting().await.unwrap();

    let err = owner.read_results().await.unwrap_err();
    assert!(matches!(err, TallyError::InvalidPhase { .. }));
}

#[tokio::test]
async fn public_decryption_requires_public_tallies() {
    let setup = Setup::new();
    let owner = setup.client_for(OWNER);

    owner.init_tallies().await.unwrap();
    owner.open_voting().await.unwrap();
    owner.close_voting().await.unwrap();

    let handles = owner.read_results().await.unwrap().unwrap();
    let err = owner.public_decrypt_results(&handles).await.unwrap_err();
    assert!(matches!(err, TallyError::InvalidPhase { .. }));

    owner.make_tallies_public().await.unwrap();
    let err = owner
        .public_decrypt_results(&[CiphertextHandle::zero()])
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::MalformedHandle(_)));
}

#[tokio::test]
async fn oversized_candidate_index_is_rejected_locally() {
    let setup = Setup::new();
    let owner = setup.client_for(OWNER);
    let voter = setup.client_for(VOTER);

    owner.init_tallies().await.unwrap();
    owner.open_voting().await.unwrap();

    let err = voter.vote(300).await.unwrap_err();
    assert!(matches!(err, TallyError::InvalidContext(_)));
    assert_eq!(setup.tally.vote_submissions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn phase_queries_are_always_legal() {
    let setup = Setup::new();
    let voter = setup.client_for(VOTER);

    assert_eq!(voter.phase().await.unwrap(), Phase::Setup);
    assert_eq!(voter.owner().await.unwrap(), OWNER);
    assert!(!voter.is_owner().await.unwrap());
}
