// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use crate::plan_nodes::{
    ArcRelPlanNode, BoundPred, ListPred, RelNodeType, RelPlanNode, RelReprPlanNode,
};

#[derive(Clone, Debug)]
pub struct PhysicalLimit(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalLimit: RelPlanNode,
    PhysicalLimit, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, offset: BoundPred },
        { 1, fetch: BoundPred }
    ]
);

/// A fused top-k operator. Keeps the sort collation and the row window of the originating sort
/// in one place so that neither gets lost between separate operators.
#[derive(Clone, Debug)]
pub struct PhysicalLimitSort(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalLimitSort: RelPlanNode,
    PhysicalLimitSort, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, collation: ListPred },
        { 1, offset: BoundPred },
        { 2, fetch: BoundPred }
    ]
);
