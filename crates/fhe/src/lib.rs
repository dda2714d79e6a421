// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod coprocessor;
mod handle;
mod input;
mod value;

pub use coprocessor::*;
pub use handle::*;
pub use input::*;
pub use value::*;
