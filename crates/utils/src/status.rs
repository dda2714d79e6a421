// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Lifecycle of one logical client operation.
///
/// Every public operation on the ledger and tally clients owns one of these,
/// so a failing balance refresh never blocks or poisons an in-flight payment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Default)]
struct OpState {
    status: OpStatus,
    error: Option<String>,
}

/// Status and last-error slot for a single operation family.
#[derive(Debug, Default)]
pub struct StatusCell {
    inner: RwLock<OpState>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the operation in flight and clears any previous error.
    pub fn begin(&self) {
        let mut state = self.inner.write().unwrap();
        state.status = OpStatus::Loading;
        state.error = None;
    }

    pub fn succeed(&self) {
        let mut state = self.inner.write().unwrap();
        state.status = OpStatus::Success;
        state.error = None;
    }

    pub fn fail(&self, message: impl Into<String>) {
        let mut state = self.inner.write().unwrap();
        state.status = OpStatus::Error;
        state.error = Some(message.into());
    }

    pub fn status(&self) -> OpStatus {
        self.inner.read().unwrap().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.read().unwrap().error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_without_error() {
        let cell = StatusCell::new();
        assert_eq!(cell.status(), OpStatus::Idle);
        assert_eq!(cell.last_error(), None);
    }

    #[test]
    fn begin_clears_previous_error() {
        let cell = StatusCell::new();
        cell.fail("boom");
        assert_eq!(cell.status(), OpStatus::Error);
        assert_eq!(cell.last_error().as_deref(), Some("boom"));

        cell.begin();
        assert_eq!(cell.status(), OpStatus::Loading);
        assert_eq!(cell.last_error(), None);
    }

    #[test]
    fn success_after_failure_overwrites_state() {
        let cell = StatusCell::new();
        cell.fail("transient");
        cell.begin();
        cell.succeed();
        assert_eq!(cell.status(), OpStatus::Success);
        assert_eq!(cell.last_error(), None);
    }
}
