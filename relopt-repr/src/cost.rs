// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use relopt_core::cascades::RelNodeContext;
use relopt_core::cost::{Cost, CostModel};
use relopt_core::nodes::NodeType;

use crate::plan_nodes::{ArcRelPredNode, RelNodeType};

pub const COMPUTE_COST: usize = 0;
pub const IO_COST: usize = 1;

/// A cost model with fixed per-operator weights. Good enough to rank the alternatives the
/// default rule set produces: fused top-k beats sort-then-limit, passthrough beats an extra
/// enforcer, and shuffles are expensive.
pub struct RelCostModel;

impl RelCostModel {
    /// (compute, io) cost of the operator itself, excluding children.
    fn operation_cost(&self, node: &RelNodeType) -> (f64, f64) {
        match node {
            RelNodeType::PhysicalScan => (0.0, 1000.0),
            RelNodeType::PhysicalFilter => (100.0, 0.0),
            RelNodeType::PhysicalProjection => (10.0, 0.0),
            RelNodeType::PhysicalSort => (500.0, 0.0),
            RelNodeType::PhysicalLimit => (10.0, 0.0),
            RelNodeType::PhysicalLimitSort => (100.0, 0.0),
            RelNodeType::PhysicalGather => (50.0, 0.0),
            RelNodeType::PhysicalHashShuffle => (300.0, 0.0),
            _ if node.is_logical() => unreachable!("logical node has no cost"),
            other => unimplemented!("cost of {other}"),
        }
    }
}

impl CostModel<RelNodeType> for RelCostModel {
    fn compute_operation_cost(
        &self,
        node: &RelNodeType,
        _predicates: &[ArcRelPredNode],
        _children_costs: &[Cost],
        _context: RelNodeContext,
    ) -> Cost {
        let (compute, io) = self.operation_cost(node);
        Cost(vec![compute, io])
    }

    fn explain_cost(&self, cost: &Cost) -> String {
        format!(
            "{{compute={},io={}}}",
            cost.0[COMPUTE_COST], cost.0[IO_COST]
        )
    }

    fn accumulate(&self, total_cost: &mut Cost, cost: &Cost) {
        total_cost.0[COMPUTE_COST] += cost.0[COMPUTE_COST];
        total_cost.0[IO_COST] += cost.0[IO_COST];
    }

    fn zero(&self) -> Cost {
        Cost(vec![0.0, 0.0])
    }

    fn weighted_cost(&self, cost: &Cost) -> f64 {
        cost.0[COMPUTE_COST] + cost.0[IO_COST]
    }
}
