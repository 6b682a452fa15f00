// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use crate::plan_nodes::{
    ArcRelPlanNode, ArcRelPredNode, RelNodeType, RelPlanNode, RelReprPlanNode,
};

#[derive(Clone, Debug)]
pub struct LogicalFilter(pub ArcRelPlanNode);

define_plan_node!(
    LogicalFilter: RelPlanNode,
    Filter, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, cond: ArcRelPredNode }
    ]
);

#[derive(Clone, Debug)]
pub struct PhysicalFilter(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalFilter: RelPlanNode,
    PhysicalFilter, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, cond: ArcRelPredNode }
    ]
);
