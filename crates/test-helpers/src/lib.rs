// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! In-memory doubles of every external capability the clients consume: the
//! FHE coprocessor, the typed-data signer and the contract suite. Handles are
//! deterministic digests; plaintexts live in the mock coprocessor so the
//! mock contracts can honor them the way the real ledger would.

mod chain;
mod coprocessor;
mod signer;
mod tally;

pub use chain::*;
pub use coprocessor::*;
pub use signer::*;
pub use tally::*;

use alloy_primitives::{address, Address, B256};
use std::sync::atomic::{AtomicU64, Ordering};

pub const LEDGER_ADDRESS: Address = address!("0000000000000000000000000000000000000110");
pub const ASSET_ADDRESS: Address = address!("0000000000000000000000000000000000000111");
pub const TOKEN_ADDRESS: Address = address!("0000000000000000000000000000000000000112");
pub const TALLY_ADDRESS: Address = address!("0000000000000000000000000000000000000113");

static TX_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Fresh transaction hash, unique within the process.
pub fn next_tx() -> B256 {
    let n = TX_COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut raw = [0u8; 32];
    raw[24..].copy_from_slice(&n.to_be_bytes());
    raw.into()
}
