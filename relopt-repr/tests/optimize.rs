// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use pretty_assertions::assert_eq;
use relopt_core::rules::Rule;
use relopt_repr::plan_nodes::*;
use relopt_repr::properties::distribution::DistributionProp;
use relopt_repr::properties::sort::SortProp;
use relopt_repr::rules::{LimitRule, LimitSortRule, SortRule};
use relopt_repr::testing::new_test_optimizer;
use relopt_repr::CascadesRelOptimizer;

fn scan() -> ArcRelPlanNode {
    LogicalScan::new(ConstantPred::string("t1")).into_plan_node()
}

fn physical_scan() -> ArcRelPlanNode {
    PhysicalScan::new(ConstantPred::string("t1")).into_plan_node()
}

fn asc(column_idx: usize) -> ArcRelPredNode {
    SortOrderPred::new(
        SortOrderType::Asc,
        ColumnRefPred::new(column_idx).into_pred_node(),
    )
    .into_pred_node()
}

fn sort_plan(
    child: ArcRelPlanNode,
    collation: Vec<ArcRelPredNode>,
    offset: Option<u64>,
    fetch: Option<u64>,
) -> ArcRelPlanNode {
    LogicalSort::new(
        child,
        ListPred::new(collation),
        BoundPred::new(offset),
        BoundPred::new(fetch),
    )
    .into_plan_node()
}

#[test]
fn scan_becomes_physical_scan() {
    let mut optimizer = new_test_optimizer();
    let plan = optimizer.optimize(scan()).unwrap();
    assert_eq!(plan, physical_scan());
}

#[test]
fn sort_becomes_physical_sort() {
    let mut optimizer = new_test_optimizer();
    let plan = optimizer
        .optimize(sort_plan(scan(), vec![asc(0)], None, None))
        .unwrap();
    assert_eq!(
        plan,
        PhysicalSort::new(physical_scan(), ListPred::new(vec![asc(0)])).into_plan_node()
    );
}

#[test]
fn windowed_sort_fuses_into_limit_sort() {
    let mut optimizer = new_test_optimizer();
    let plan = optimizer
        .optimize(sort_plan(scan(), vec![asc(0)], Some(5), Some(10)))
        .unwrap();
    let limit_sort = PhysicalLimitSort::from_plan_node(plan).unwrap();
    // The row window and the collation survive the fusion unchanged.
    assert_eq!(limit_sort.offset().value(), Some(5));
    assert_eq!(limit_sort.fetch().value(), Some(10));
    assert_eq!(limit_sort.collation().len(), 1);
    assert_eq!(limit_sort.collation().child(0), asc(0));
    assert_eq!(limit_sort.child().unwrap_plan_node(), physical_scan());
}

#[test]
fn collationless_sort_becomes_limit() {
    let mut optimizer = new_test_optimizer();
    let plan = optimizer
        .optimize(sort_plan(scan(), vec![], None, Some(10)))
        .unwrap();
    let limit = PhysicalLimit::from_plan_node(plan).unwrap();
    assert_eq!(limit.offset().value(), None);
    assert_eq!(limit.fetch().value(), Some(10));
    assert_eq!(limit.child().unwrap_plan_node(), physical_scan());
}

#[test]
fn constant_true_filter_is_eliminated() {
    let mut optimizer = new_test_optimizer();
    let plan = optimizer
        .optimize(LogicalFilter::new(scan(), ConstantPred::bool(true).into_pred_node()).into_plan_node())
        .unwrap();
    assert_eq!(plan, physical_scan());
}

#[test]
fn filter_on_a_column_is_kept() {
    let mut optimizer = new_test_optimizer();
    let cond = ColumnRefPred::new(0).into_pred_node();
    let plan = optimizer
        .optimize(LogicalFilter::new(scan(), cond.clone()).into_plan_node())
        .unwrap();
    assert_eq!(
        plan,
        PhysicalFilter::new(physical_scan(), cond).into_plan_node()
    );
}

#[test]
fn required_order_is_enforced_at_the_root() {
    let mut optimizer = new_test_optimizer();
    let plan = optimizer
        .optimize_with_required_props(scan(), &[&SortProp::asc(0), &DistributionProp::Single])
        .unwrap();
    assert_eq!(
        plan,
        PhysicalSort::new(physical_scan(), ListPred::new(vec![asc(0)])).into_plan_node()
    );
}

#[test]
fn required_order_passes_through_a_filter() {
    // The filter preserves the sort order, so the enforcer lands below it.
    let mut optimizer = new_test_optimizer();
    let cond = ColumnRefPred::new(1).into_pred_node();
    let plan = optimizer
        .optimize_with_required_props(
            LogicalFilter::new(scan(), cond.clone()).into_plan_node(),
            &[&SortProp::asc(0), &DistributionProp::Single],
        )
        .unwrap();
    assert_eq!(
        plan,
        PhysicalFilter::new(
            PhysicalSort::new(physical_scan(), ListPred::new(vec![asc(0)])).into_plan_node(),
            cond
        )
        .into_plan_node()
    );
}

#[test]
fn projection_keeps_projected_schema() {
    let mut optimizer = new_test_optimizer();
    let plan = optimizer
        .optimize(
            LogicalProjection::new(
                scan(),
                ListPred::new(vec![ColumnRefPred::new(1).into_pred_node()]),
            )
            .into_plan_node(),
        )
        .unwrap();
    let projection = PhysicalProjection::from_plan_node(plan).unwrap();
    assert_eq!(projection.exprs().len(), 1);
    assert_eq!(projection.child().unwrap_plan_node(), physical_scan());
}

#[test]
fn sort_rules_split_on_the_row_window() {
    // The three sort rules cover disjoint cases of the same operator.
    let optimizer = new_test_optimizer();
    let optimizer: &CascadesRelOptimizer = optimizer.cascades_optimizer();
    let sort_rule = SortRule::new();
    let limit_rule = LimitRule::new();
    let limit_sort_rule = LimitSortRule::new();

    let plain = sort_plan(scan(), vec![asc(0)], None, None);
    let pure_limit = sort_plan(scan(), vec![], Some(5), None);
    let windowed = sort_plan(scan(), vec![asc(0)], Some(5), Some(10));
    let degenerate = sort_plan(scan(), vec![], None, None);

    assert!(Rule::matches(&sort_rule, optimizer, &plain));
    assert!(!Rule::matches(&sort_rule, optimizer, &pure_limit));
    assert!(!Rule::matches(&sort_rule, optimizer, &windowed));
    assert!(!Rule::matches(&sort_rule, optimizer, &degenerate));

    assert!(!Rule::matches(&limit_rule, optimizer, &plain));
    assert!(Rule::matches(&limit_rule, optimizer, &pure_limit));
    assert!(!Rule::matches(&limit_rule, optimizer, &windowed));

    assert!(!Rule::matches(&limit_sort_rule, optimizer, &plain));
    assert!(!Rule::matches(&limit_sort_rule, optimizer, &pure_limit));
    assert!(Rule::matches(&limit_sort_rule, optimizer, &windowed));
}
