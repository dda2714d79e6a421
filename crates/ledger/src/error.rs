// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use cvl_access::AccessError;
use cvl_fhe::EncryptError;
use cvl_sequencer::{SequenceReport, StepError, StepStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid context: {0}")]
    InvalidContext(String),
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("step `{step}` submission failed after {completed} confirmed step(s): {reason}")]
    SubmissionFailed {
        step: String,
        completed: usize,
        reason: String,
    },
    #[error("step `{step}` was submitted but not confirmed ({completed} step(s) confirmed before it): {reason}")]
    Unconfirmed {
        step: String,
        completed: usize,
        reason: String,
    },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("malformed handle: {0}")]
    MalformedHandle(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("contract read failed: {0}")]
    ContractRead(String),
}

impl From<EncryptError> for LedgerError {
    fn from(e: EncryptError) -> Self {
        match e {
            EncryptError::InvalidContext(msg) => LedgerError::InvalidContext(msg),
            EncryptError::EncryptionFailed(msg) => LedgerError::EncryptionFailed(msg),
        }
    }
}

impl From<AccessError> for LedgerError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Unauthorized(msg) => LedgerError::Unauthorized(msg),
            AccessError::MalformedHandle(msg) => LedgerError::MalformedHandle(msg),
            AccessError::DecryptionFailed(msg) => LedgerError::DecryptionFailed(msg),
        }
    }
}

/// Maps a failed sequence run to the taxonomy, preserving the failing step
/// label and how many steps confirmed before it.
pub(crate) fn sequence_error(report: &SequenceReport) -> Option<LedgerError> {
    let (_, outcome) = report.failure()?;
    let completed = report.confirmed_count();
    let step = outcome.label.clone();
    match &outcome.status {
        StepStatus::Failed {
            error: StepError::Submit(reason),
        } => Some(LedgerError::SubmissionFailed {
            step,
            completed,
            reason: reason.clone(),
        }),
        StepStatus::Failed {
            error: StepError::Confirm(reason),
        } => Some(LedgerError::Unconfirmed {
            step,
            completed,
            reason: reason.clone(),
        }),
        _ => None,
    }
}
