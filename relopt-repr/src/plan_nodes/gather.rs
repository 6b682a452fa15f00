// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Distribution enforcers. These nodes are only ever introduced by the distribution property
//! builder, never by a rule.

use super::macros::define_plan_node;
use crate::plan_nodes::{ArcRelPlanNode, ListPred, RelNodeType, RelPlanNode, RelReprPlanNode};

/// Collects all shards onto a single node. Does not preserve sort order.
#[derive(Clone, Debug)]
pub struct PhysicalGather(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalGather: RelPlanNode,
    PhysicalGather, [
        { 0, child: ArcRelPlanNode }
    ], []
);

/// Re-shards the input by a hash of the key columns. Preserves per-shard sort order.
#[derive(Clone, Debug)]
pub struct PhysicalHashShuffle(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalHashShuffle: RelPlanNode,
    PhysicalHashShuffle, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, keys: ListPred }
    ]
);
