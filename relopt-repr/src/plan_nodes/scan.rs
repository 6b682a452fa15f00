// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use crate::plan_nodes::{ArcRelPlanNode, ConstantPred, RelNodeType, RelPlanNode, RelReprPlanNode};

#[derive(Clone, Debug)]
pub struct LogicalScan(pub ArcRelPlanNode);

define_plan_node!(
    LogicalScan: RelPlanNode,
    Scan, [], [
        { 0, table: ConstantPred }
    ]
);

#[derive(Clone, Debug)]
pub struct PhysicalScan(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalScan: RelPlanNode,
    PhysicalScan, [], [
        { 0, table: ConstantPred }
    ]
);
