// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Container acquirables and the guarded views they hand out.
//!
//! Each container acquirable pairs an [`crate::core::Acquirable`] with a
//! standard-library collection (`Vec`, `HashSet`, `HashMap`). A read
//! acquisition exposes a guarded view restricted to non-mutating methods; a
//! write acquisition exposes one with the full mutating API. Both address the
//! same underlying collection, so mutation through the write view is
//! immediately observable through any concurrently live read view on the same
//! acquirable.

pub mod list;
pub mod map;
pub mod set;

pub use list::ListAcquirable;
pub use map::MapAcquirable;
pub use set::SetAcquirable;
