// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

pub use cvl_fhe as fhe;
pub use cvl_sequencer as sequencer;
pub use cvl_utils as utils;

#[cfg(feature = "access")]
pub use cvl_access as access;

#[cfg(feature = "config")]
pub use cvl_config as config;

#[cfg(feature = "evm")]
pub use cvl_evm as evm;

#[cfg(feature = "ledger")]
pub use cvl_ledger as ledger;

#[cfg(feature = "tally")]
pub use cvl_tally as tally;
