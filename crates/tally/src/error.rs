// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Phase;
use cvl_fhe::EncryptError;
use cvl_sequencer::{SequenceReport, StepError, StepStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("operation requires phase {expected}, session is in phase {actual}")]
    InvalidPhase { expected: String, actual: Phase },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid context: {0}")]
    InvalidContext(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("step `{step}` submission failed: {reason}")]
    SubmissionFailed { step: String, reason: String },
    #[error("step `{step}` was submitted but not confirmed: {reason}")]
    Unconfirmed { step: String, reason: String },
    #[error("malformed handle: {0}")]
    MalformedHandle(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("contract read failed: {0}")]
    ContractRead(String),
}

impl From<EncryptError> for TallyError {
    fn from(e: EncryptError) -> Self {
        match e {
            EncryptError::InvalidContext(msg) => TallyError::InvalidContext(msg),
            EncryptError::EncryptionFailed(msg) => TallyError::EncryptionFailed(msg),
        }
    }
}

pub(crate) fn sequence_error(report: &SequenceReport) -> Option<TallyError> {
    let (_, outcome) = report.failure()?;
    let step = outcome.label.clone();
    match &outcome.status {
        StepStatus::Failed {
            error: StepError::Submit(reason),
        } => Some(TallyError::SubmissionFailed {
            step,
            reason: reason.clone(),
        }),
        StepStatus::Failed {
            error: StepError::Confirm(reason),
        } => Some(TallyError::Unconfirmed {
            step,
            reason: reason.clone(),
        }),
        _ => None,
    }
}
