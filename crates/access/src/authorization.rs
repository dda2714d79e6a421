// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use chrono::Utc;
use cvl_fhe::Keypair;
use serde::{Deserialize, Serialize};

/// Default validity window for a decryption authorization, in days.
pub const DEFAULT_VALIDITY_DAYS: u64 = 10;

const SECONDS_PER_DAY: u64 = 86_400;

/// Signed, time-bounded permission letting one user decrypt handles owned by
/// a fixed set of contracts.
///
/// Owned by the requesting session and cached by the manager; must be
/// regenerated once the validity window elapses or the contract set changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptionAuthorization {
    pub(crate) keypair: Keypair,
    pub(crate) signature: Vec<u8>,
    pub(crate) user: Address,
    /// Sorted, deduplicated contract list the signature binds.
    pub(crate) contracts: Vec<Address>,
    pub(crate) issued_at: u64,
    pub(crate) validity_days: u64,
}

impl DecryptionAuthorization {
    pub fn user(&self) -> Address {
        self.user
    }

    pub fn contracts(&self) -> &[Address] {
        &self.contracts
    }

    pub fn public_key(&self) -> &[u8] {
        &self.keypair.public_key
    }

    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }

    pub fn validity_days(&self) -> u64 {
        self.validity_days
    }

    pub fn expires_at(&self) -> u64 {
        self.issued_at + self.validity_days * SECONDS_PER_DAY
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Whether every address in `contracts` is bound by this authorization.
    pub fn covers<'a>(&self, contracts: impl IntoIterator<Item = &'a Address>) -> bool {
        contracts
            .into_iter()
            .all(|contract| self.contracts.contains(contract))
    }
}

pub(crate) fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Cache key for one `(user, contract-set)` pair. Contract order does not
/// matter; the list is sorted before joining.
pub fn cache_key(user: &Address, contracts: &[Address]) -> String {
    let mut sorted: Vec<Address> = contracts.to_vec();
    sorted.sort();
    sorted.dedup();
    let joined = sorted
        .iter()
        .map(|a| a.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(",");
    format!("authorization:{}:{}", user.to_string().to_lowercase(), joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn authorization(validity_days: u64, issued_at: u64) -> DecryptionAuthorization {
        DecryptionAuthorization {
            keypair: Keypair {
                private_key: vec![1],
                public_key: vec![2],
            },
            signature: vec![3; 65],
            user: address!("00000000000000000000000000000000000000aa"),
            contracts: vec![
                address!("00000000000000000000000000000000000000bb"),
                address!("00000000000000000000000000000000000000cc"),
            ],
            issued_at,
            validity_days,
        }
    }

    #[test]
    fn expiry_is_issued_at_plus_validity_window() {
        let auth = authorization(10, 1_000);
        assert_eq!(auth.expires_at(), 1_000 + 10 * 86_400);
        assert!(!auth.is_expired_at(auth.expires_at() - 1));
        assert!(auth.is_expired_at(auth.expires_at()));
    }

    #[test]
    fn zero_validity_is_expired_immediately() {
        let auth = authorization(0, 1_000);
        assert!(auth.is_expired_at(1_000));
    }

    #[test]
    fn coverage_is_subset_based() {
        let auth = authorization(10, 1_000);
        let covered = address!("00000000000000000000000000000000000000bb");
        let foreign = address!("00000000000000000000000000000000000000dd");
        assert!(auth.covers([&covered]));
        assert!(!auth.covers([&covered, &foreign]));
    }

    #[test]
    fn cache_key_ignores_contract_order() {
        let user = address!("00000000000000000000000000000000000000aa");
        let x = address!("00000000000000000000000000000000000000bb");
        let y = address!("00000000000000000000000000000000000000cc");
        assert_eq!(cache_key(&user, &[x, y]), cache_key(&user, &[y, x]));
        assert_ne!(cache_key(&user, &[x]), cache_key(&user, &[x, y]));
    }
}
