// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod api;
mod contracts;
mod retry;

pub use api::*;
pub use contracts::*;
pub use retry::*;
