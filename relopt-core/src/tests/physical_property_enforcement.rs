// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::cascades::CascadesOptimizer;
use crate::nodes::{PlanNode, Value};
use crate::optimizer::Optimizer;
use crate::physical_property::PhysicalPropertyBuilderAny;
use crate::rules::{Rule, RuleCall, RuleMatcher};
use crate::tests::common::{
    column_ref, expr, list, physical_filter, physical_gather, physical_nested_loop_join,
    physical_scan, physical_sort, physical_sorted_scan, scan, DistProp,
    DistributionPropertyBuilder, RowCountPropertyBuilder, SortProp, SortPropertyBuilder,
    TestCostModel, TestNodeType,
};

fn get_optimizer() -> CascadesOptimizer<TestNodeType> {
    CascadesOptimizer::new(
        vec![],
        Box::new(TestCostModel),
        Arc::new([Box::new(RowCountPropertyBuilder)]),
        Arc::new([Box::new(SortPropertyBuilder)]),
    )
}

#[test]
fn enforcer_on_unsorted_input() {
    // The scan cannot provide the sort order, so a sort is enforced on top of it.
    let mut optimizer = get_optimizer();
    let plan = physical_scan("t1");
    let optimized_plan = optimizer
        .optimize_with_required_props(plan, &[&SortProp(vec!["x".to_string()])])
        .unwrap();
    assert_eq!(
        optimized_plan,
        physical_sort(physical_scan("t1"), list(vec![column_ref("x")]))
    )
}

#[test]
fn sorted_input_satisfies_prefix_requirement() {
    // A sort on `x, y` already provides `x`; no enforcer should be added.
    let mut optimizer = get_optimizer();
    let plan = physical_sort(
        physical_scan("t1"),
        list(vec![column_ref("x"), column_ref("y")]),
    );
    let optimized_plan = optimizer
        .optimize_with_required_props(plan, &[&SortProp(vec!["x".to_string()])])
        .unwrap();
    assert_eq!(
        optimized_plan,
        physical_sort(
            physical_scan("t1"),
            list(vec![column_ref("x"), column_ref("y")])
        )
    )
}

#[test]
fn passthrough_pushes_requirement_below_filter() {
    // The filter preserves sort order, so the requirement is pushed down and the sort ends up
    // below the filter instead of on top of it.
    let mut optimizer = get_optimizer();
    let plan = physical_filter(physical_scan("t1"), expr(Value::Bool(true)));
    let optimized_plan = optimizer
        .optimize_with_required_props(plan, &[&SortProp(vec!["x".to_string()])])
        .unwrap();
    assert_eq!(
        optimized_plan,
        physical_filter(
            physical_sort(physical_scan("t1"), list(vec![column_ref("x")])),
            expr(Value::Bool(true))
        )
    )
}

#[test]
fn passthrough_left_side_of_join() {
    let mut optimizer = get_optimizer();
    let plan = physical_nested_loop_join(
        physical_filter(physical_scan("t1"), expr(Value::Bool(true))),
        physical_scan("t2"),
        expr(Value::Bool(true)),
    );
    let optimized_plan = optimizer
        .optimize_with_required_props(plan, &[&SortProp(vec!["x".to_string()])])
        .unwrap();
    assert_eq!(
        DbgAsDisplay(&optimized_plan),
        DbgAsDisplay(&physical_nested_loop_join(
            physical_filter(
                physical_sort(physical_scan("t1"), list(vec![column_ref("x")])),
                expr(Value::Bool(true))
            ),
            physical_scan("t2"),
            expr(Value::Bool(true))
        ))
    )
}

#[test]
fn no_requirement_no_enforcer() {
    let mut optimizer = get_optimizer();
    let plan = physical_scan("t1");
    let optimized_plan = optimizer.optimize(plan).unwrap();
    assert_eq!(optimized_plan, physical_scan("t1"))
}

#[test]
fn extraction_fails_without_physical_plan() {
    // A logical plan with no implementation rules cannot produce a winner; extraction reports
    // the goal and the candidate expressions instead of returning a partial plan.
    let mut optimizer = get_optimizer();
    let err = optimizer.optimize(scan("t1")).unwrap_err();
    assert!(err.to_string().contains("no plan found"), "{err}");
}

/// Implements a logical scan either as a plain sharded scan or as a sorted index scan on `x`.
struct ScanImplementationRule {
    matcher: RuleMatcher<TestNodeType>,
}

impl ScanImplementationRule {
    fn new() -> Self {
        Self {
            matcher: RuleMatcher::MatchNode {
                typ: TestNodeType::Scan,
                children: vec![],
            },
        }
    }
}

impl Rule<TestNodeType, CascadesOptimizer<TestNodeType>> for ScanImplementationRule {
    fn matcher(&self) -> &RuleMatcher<TestNodeType> {
        &self.matcher
    }

    fn apply(&self, call: &mut RuleCall<'_, TestNodeType, CascadesOptimizer<TestNodeType>>) {
        let binding = call.binding();
        call.propose(PlanNode {
            typ: TestNodeType::PhysicalScan,
            children: vec![],
            predicates: binding.predicates.clone(),
        });
        call.propose(PlanNode {
            typ: TestNodeType::PhysicalSortedScan,
            children: vec![],
            predicates: vec![binding.predicates[0].clone(), list(vec![column_ref("x")])],
        });
    }

    fn name(&self) -> &'static str {
        "scan_implementation"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}

#[test]
fn enforcer_keeps_sibling_requirement() {
    // Both an order on `x` and single-node placement are required. Gathering on top of the
    // cheap sorted scan wins on cost but interleaves the rows again, so that candidate must
    // not become the winner; the gather has to run below the sort.
    let mut optimizer = CascadesOptimizer::new(
        vec![Arc::new(ScanImplementationRule::new())],
        Box::new(TestCostModel),
        Arc::new([Box::new(RowCountPropertyBuilder)]),
        Arc::new([
            Box::new(SortPropertyBuilder) as Box<dyn PhysicalPropertyBuilderAny<TestNodeType>>,
            Box::new(DistributionPropertyBuilder),
        ]),
    );
    let optimized_plan = optimizer
        .optimize_with_required_props(
            scan("t1"),
            &[&SortProp(vec!["x".to_string()]), &DistProp::Single],
        )
        .unwrap();
    assert_eq!(
        optimized_plan,
        physical_sort(
            physical_gather(physical_sorted_scan("t1", list(vec![column_ref("x")]))),
            list(vec![column_ref("x")])
        )
    );
}

struct DbgAsDisplay<'a, D>(&'a D);

impl<D: std::fmt::Display> std::fmt::Debug for DbgAsDisplay<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<D: PartialEq> PartialEq for DbgAsDisplay<'_, D> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
