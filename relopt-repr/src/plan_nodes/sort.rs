// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use crate::plan_nodes::{
    ArcRelPlanNode, BoundPred, ListPred, RelNodeType, RelPlanNode, RelReprPlanNode,
};

/// A sort with an optional row window. `collation` is a list of sort order predicates; an empty
/// collation with a specified offset or fetch is a pure limit.
#[derive(Clone, Debug)]
pub struct LogicalSort(pub ArcRelPlanNode);

define_plan_node!(
    LogicalSort: RelPlanNode,
    Sort, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, collation: ListPred },
        { 1, offset: BoundPred },
        { 2, fetch: BoundPred }
    ]
);

impl LogicalSort {
    pub fn has_window(&self) -> bool {
        self.offset().is_specified() || self.fetch().is_specified()
    }
}

#[derive(Clone, Debug)]
pub struct PhysicalSort(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalSort: RelPlanNode,
    PhysicalSort, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, collation: ListPred }
    ]
);
