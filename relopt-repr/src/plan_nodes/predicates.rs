// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

mod bound_pred;
mod column_ref_pred;
mod constant_pred;
mod list_pred;
mod sort_order_pred;

pub use bound_pred::BoundPred;
pub use column_ref_pred::ColumnRefPred;
pub use constant_pred::{ConstantPred, ConstantType};
pub use list_pred::ListPred;
pub use sort_order_pred::{SortOrderPred, SortOrderType};
