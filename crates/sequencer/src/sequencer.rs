// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::B256;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

/// How one submit-and-confirm step failed.
///
/// Submission and confirmation are distinct failure classes: a failed
/// submission never reached the chain, while a failed confirmation may still
/// land on-chain later.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("submission failed: {0}")]
    Submit(String),
    #[error("submitted but confirmation failed: {0}")]
    Confirm(String),
}

type StepAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<B256, StepError>> + Send>;

/// One submit-and-confirm action in an ordered sequence.
pub struct TxStep {
    label: String,
    idempotent: bool,
    action: StepAction,
}

impl TxStep {
    pub fn new<F, Fut>(label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<B256, StepError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            idempotent: false,
            action: Box::new(move || action().boxed()),
        }
    }

    /// Marks the step as safe to re-run, e.g. a second approval for an amount
    /// already approved.
    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }
}

#[derive(Debug, Clone)]
pub enum StepStatus {
    Confirmed { tx: B256 },
    Failed { error: StepError },
    NotRun,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub label: String,
    pub idempotent: bool,
    pub status: StepStatus,
}

/// Per-step outcomes of one sequence run, complete even on failure so a
/// caller can decide whether a retry re-runs from the failed step or from
/// the start.
#[derive(Debug, Clone)]
pub struct SequenceReport {
    pub outcomes: Vec<StepOutcome>,
}

impl SequenceReport {
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.status, StepStatus::Confirmed { .. }))
    }

    /// Number of steps confirmed before the sequence stopped.
    pub fn confirmed_count(&self) -> usize {
        self.outcomes
            .iter()
            .take_while(|o| matches!(o.status, StepStatus::Confirmed { .. }))
            .count()
    }

    /// The failing step, if any, with its position in the sequence.
    pub fn failure(&self) -> Option<(usize, &StepOutcome)> {
        self.outcomes
            .iter()
            .enumerate()
            .find(|(_, o)| matches!(o.status, StepStatus::Failed { .. }))
    }

    /// Hash of the last confirmed transaction, if any step confirmed.
    pub fn last_tx(&self) -> Option<B256> {
        self.outcomes
            .iter()
            .rev()
            .find_map(|o| match o.status {
                StepStatus::Confirmed { tx } => Some(tx),
                _ => None,
            })
    }
}

/// Runs multi-step on-chain operations strictly in order.
pub struct Sequencer;

impl Sequencer {
    /// Executes `steps` in order, starting a step only after the previous
    /// step's submission was confirmed. On failure the sequence stops;
    /// completed outcomes are preserved and the remaining steps are reported
    /// as not run.
    pub async fn run(steps: Vec<TxStep>) -> SequenceReport {
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut halted = false;

        for step in steps {
            let TxStep {
                label,
                idempotent,
                action,
            } = step;

            if halted {
                outcomes.push(StepOutcome {
                    label,
                    idempotent,
                    status: StepStatus::NotRun,
                });
                continue;
            }

            match action().await {
                Ok(tx) => {
                    info!(step = %label, tx = %tx, "step confirmed");
                    outcomes.push(StepOutcome {
                        label,
                        idempotent,
                        status: StepStatus::Confirmed { tx },
                    });
                }
                Err(error) => {
                    warn!(step = %label, %error, "step failed, halting sequence");
                    outcomes.push(StepOutcome {
                        label,
                        idempotent,
                        status: StepStatus::Failed { error },
                    });
                    halted = true;
                }
            }
        }

        SequenceReport { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn tx(byte: u8) -> B256 {
        let mut raw = [0u8; 32];
        raw[31] = byte;
        raw.into()
    }

    #[tokio::test]
    async fn all_steps_confirm_in_order() {
        let order = Arc::new(AtomicUsize::new(0));

        let first = order.clone();
        let second = order.clone();
        let report = Sequencer::run(vec![
            TxStep::new("approve", move || async move {
                assert_eq!(first.fetch_add(1, Ordering::SeqCst), 0);
                Ok(tx(1))
            })
            .idempotent(),
            TxStep::new("fund", move || async move {
                assert_eq!(second.fetch_add(1, Ordering::SeqCst), 1);
                Ok(tx(2))
            }),
        ])
        .await;

        assert!(report.is_success());
        assert_eq!(report.confirmed_count(), 2);
        assert_eq!(report.last_tx(), Some(tx(2)));
        assert!(report.failure().is_none());
    }

    #[tokio::test]
    async fn failure_preserves_completed_outcomes_and_skips_the_rest() {
        let ran_third = Arc::new(AtomicUsize::new(0));
        let third = ran_third.clone();

        let report = Sequencer::run(vec![
            TxStep::new("approve", || async { Ok(tx(1)) }),
            TxStep::new("fund", || async {
                Err(StepError::Confirm("receipt reverted".into()))
            }),
            TxStep::new("notify", move || async move {
                third.fetch_add(1, Ordering::SeqCst);
                Ok(tx(3))
            }),
        ])
        .await;

        assert!(!report.is_success());
        assert_eq!(report.confirmed_count(), 1);
        assert_eq!(ran_third.load(Ordering::SeqCst), 0);

        let (index, outcome) = report.failure().unwrap();
        assert_eq!(index, 1);
        assert_eq!(outcome.label, "fund");
        assert!(matches!(
            outcome.status,
            StepStatus::Failed {
                error: StepError::Confirm(_)
            }
        ));
        assert!(matches!(report.outcomes[2].status, StepStatus::NotRun));
        // The approval that confirmed stays visible for retry decisions.
        assert_eq!(report.last_tx(), Some(tx(1)));
    }
}
