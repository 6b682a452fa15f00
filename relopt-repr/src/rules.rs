// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

mod eliminate_filter;
pub(crate) mod macros;
mod physical;
mod sort;

pub use eliminate_filter::EliminateFilterRule;
pub use physical::PhysicalConversionRule;
pub use sort::{LimitRule, LimitSortRule, SortRule};
