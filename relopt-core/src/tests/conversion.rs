// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::cascades::{CascadesOptimizer, Memo};
use crate::nodes::{PlanNode, PlanNodeOrGroup, Value};
use crate::optimizer::Optimizer;
use crate::physical_property::PhysicalProperty;
use crate::rules::{Rule, RuleCall, RuleMatcher};
use crate::tests::common::{
    column_ref, expr, filter, join, list, physical_scan, physical_sort, scan,
    RowCountPropertyBuilder, SortProp, SortPropertyBuilder, TestCostModel, TestNodeType,
};

type TestOptimizer = CascadesOptimizer<TestNodeType>;

fn get_optimizer(rules: Vec<Arc<dyn Rule<TestNodeType, TestOptimizer>>>) -> TestOptimizer {
    CascadesOptimizer::new(
        rules,
        Box::new(TestCostModel),
        Arc::new([Box::new(RowCountPropertyBuilder)]),
        Arc::new([Box::new(SortPropertyBuilder)]),
    )
}

fn sorted_on_x() -> SortProp {
    SortProp(vec!["x".to_string()])
}

#[test]
fn request_converted_is_idempotent() {
    let mut optimizer = get_optimizer(vec![]);
    let (group_id, _) = optimizer.add_new_expr(physical_scan("t1"));

    let first = optimizer.request_converted(PlanNodeOrGroup::Group(group_id), &[&sorted_on_x()]);
    let second = optimizer.request_converted(PlanNodeOrGroup::Group(group_id), &[&sorted_on_x()]);
    assert_eq!(first, Some(PlanNodeOrGroup::Group(group_id)));
    assert_eq!(second, Some(PlanNodeOrGroup::Group(group_id)));
    // both requests resolve to the same search goal
    assert_eq!(optimizer.memo().get_all_subgoal_ids(group_id).len(), 1);

    optimizer.request_converted(
        PlanNodeOrGroup::Group(group_id),
        &[&SortProp(vec!["y".to_string()])],
    );
    assert_eq!(optimizer.memo().get_all_subgoal_ids(group_id).len(), 2);
}

/// Implements a logical filter, requesting its input sorted on `x` along the way.
struct ConvertingFilterRule {
    matcher: RuleMatcher<TestNodeType>,
}

impl ConvertingFilterRule {
    fn new() -> Self {
        Self {
            matcher: RuleMatcher::MatchNode {
                typ: TestNodeType::Filter,
                children: vec![RuleMatcher::Any],
            },
        }
    }
}

impl Rule<TestNodeType, TestOptimizer> for ConvertingFilterRule {
    fn matcher(&self) -> &RuleMatcher<TestNodeType> {
        &self.matcher
    }

    fn apply(&self, call: &mut RuleCall<'_, TestNodeType, TestOptimizer>) {
        let binding = call.binding();
        let Some(converted) = call.request_converted(binding.child(0), &[&sorted_on_x()]) else {
            return;
        };
        call.propose(PlanNode {
            typ: TestNodeType::PhysicalFilter,
            children: vec![converted],
            predicates: binding.predicates.clone(),
        });
    }

    fn name(&self) -> &'static str {
        "converting_filter"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}

#[test]
fn conversion_request_materializes_goal() {
    let mut optimizer = get_optimizer(vec![Arc::new(ConvertingFilterRule::new())]);
    let plan = filter(physical_scan("t1"), expr(Value::Bool(true)));
    let optimized_plan = optimizer.optimize(plan).unwrap();
    assert_eq!(optimized_plan.typ, TestNodeType::PhysicalFilter);

    // The requested goal exists on the input group and has a winner.
    let (scan_group, _) = optimizer.memo().get_expr_info(physical_scan("t1"));
    let subgoals = optimizer.memo().get_all_subgoal_ids(scan_group);
    assert_eq!(subgoals.len(), 2);
    for subgoal_id in &subgoals {
        assert!(optimizer
            .memo()
            .get_group_winner(scan_group, *subgoal_id)
            .has_full_winner());
    }
    let subgoal_id = optimizer.memo().get_subgoal(
        scan_group,
        vec![Box::new(sorted_on_x()) as Box<dyn PhysicalProperty>].into(),
    );
    let converted = optimizer
        .memo()
        .get_best_group_binding(scan_group, subgoal_id)
        .unwrap();
    assert_eq!(
        converted,
        physical_sort(physical_scan("t1"), list(vec![column_ref("x")]))
    );
}

/// Requests a conversion of its own group under the goal currently being optimized. The request
/// cycles, so it must report that no conversion is available.
struct SelfConversionRule {
    matcher: RuleMatcher<TestNodeType>,
    observed_unavailable: AtomicBool,
}

impl SelfConversionRule {
    fn new() -> Self {
        Self {
            matcher: RuleMatcher::MatchNode {
                typ: TestNodeType::Filter,
                children: vec![RuleMatcher::Any],
            },
            observed_unavailable: AtomicBool::new(false),
        }
    }
}

impl Rule<TestNodeType, TestOptimizer> for SelfConversionRule {
    fn matcher(&self) -> &RuleMatcher<TestNodeType> {
        &self.matcher
    }

    fn apply(&self, call: &mut RuleCall<'_, TestNodeType, TestOptimizer>) {
        let binding = call.binding();
        if call
            .request_converted(binding.into(), &[&SortProp(vec![])])
            .is_none()
        {
            self.observed_unavailable.store(true, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &'static str {
        "self_conversion"
    }
}

#[test]
fn conversion_cycle_reports_unavailable() {
    let rule = Arc::new(SelfConversionRule::new());
    let mut optimizer = get_optimizer(vec![rule.clone() as Arc<dyn Rule<_, _>>]);
    let plan = filter(physical_scan("t1"), expr(Value::Bool(true)));
    let (group_id, subgoal_id) = optimizer.step_optimize_rel(plan, &[&SortProp(vec![])]).unwrap();
    assert!(rule.observed_unavailable.load(Ordering::SeqCst));
    // The rule proposed nothing, so the goal cannot be satisfied; the search itself must not
    // loop or fail.
    assert!(optimizer.step_get_optimize_rel(group_id, subgoal_id).is_err());
}

/// A malformed rewrite: replaces a filter with a cross join that produces a different row count.
struct BrokenRewriteRule {
    matcher: RuleMatcher<TestNodeType>,
}

impl BrokenRewriteRule {
    fn new() -> Self {
        Self {
            matcher: RuleMatcher::MatchNode {
                typ: TestNodeType::Filter,
                children: vec![RuleMatcher::Any],
            },
        }
    }
}

impl Rule<TestNodeType, TestOptimizer> for BrokenRewriteRule {
    fn matcher(&self) -> &RuleMatcher<TestNodeType> {
        &self.matcher
    }

    fn apply(&self, call: &mut RuleCall<'_, TestNodeType, TestOptimizer>) {
        call.propose(join(scan("t2"), scan("t3"), expr(Value::Bool(true))));
    }

    fn name(&self) -> &'static str {
        "broken_rewrite"
    }
}

#[test]
fn incompatible_rule_output_rejected() {
    let mut optimizer = get_optimizer(vec![Arc::new(BrokenRewriteRule::new())]);
    let plan = filter(physical_scan("t1"), expr(Value::Bool(true)));
    let (group_id, _) = optimizer.step_optimize_rel(plan, &[&SortProp(vec![])]).unwrap();
    // The join output was rejected; the group still contains only the original filter.
    assert_eq!(
        optimizer.memo().get_group(group_id).group_exprs.len(),
        1
    );
}
