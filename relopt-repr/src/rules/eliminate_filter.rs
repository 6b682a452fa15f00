// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use relopt_core::optimizer::Optimizer;
use relopt_core::rules::{Rule, RuleCall, RuleMatcher};
use tracing::trace;

use super::macros::define_rule;
use crate::plan_nodes::{
    ConstantPred, LogicalFilter, RelNodeType, RelReprPlanNode, RelReprPredNode, Value,
};

define_rule!(EliminateFilterRule, apply_eliminate_filter, (Filter, child));

/// Drops a filter with a constant-true condition by proposing its input group directly, which
/// merges the two groups in the memo table.
fn apply_eliminate_filter<O: Optimizer<RelNodeType>>(call: &mut RuleCall<'_, RelNodeType, O>) {
    let filter = LogicalFilter::from_plan_node(call.binding()).unwrap();
    let Some(constant) = ConstantPred::from_pred_node(filter.cond()) else {
        return;
    };
    if constant.value() == Value::Bool(true) {
        trace!(event = "eliminate_filter", filter = %filter.0, "dropping constant-true filter");
        call.propose(filter.child());
    }
}
