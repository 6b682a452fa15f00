// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Implementation rules for the sort operator. A logical sort carries a collation and an
//! optional row window (offset/fetch), so it splits into three cases: plain sort, pure limit,
//! and fused top-k. Each rule decides in its predicate stage which case it owns, keeping the
//! cases mutually exclusive.

use relopt_core::nodes::ArcPlanNode;
use relopt_core::optimizer::Optimizer;
use relopt_core::rules::{Rule, RuleCall, RuleMatcher};

use crate::plan_nodes::{
    LogicalSort, PhysicalLimit, PhysicalLimitSort, PhysicalSort, RelNodeType, RelReprPlanNode,
};

fn sort_matcher() -> RuleMatcher<RelNodeType> {
    RuleMatcher::MatchNode {
        typ: RelNodeType::Sort,
        children: vec![RuleMatcher::Any],
    }
}

fn bound_sort(binding: &ArcPlanNode<RelNodeType>) -> LogicalSort {
    LogicalSort::from_plan_node(binding.clone()).unwrap()
}

/// `Sort` with a collation and no row window becomes `PhysicalSort`.
pub struct SortRule {
    matcher: RuleMatcher<RelNodeType>,
}

impl SortRule {
    pub fn new() -> Self {
        Self {
            matcher: sort_matcher(),
        }
    }
}

impl<O: Optimizer<RelNodeType>> Rule<RelNodeType, O> for SortRule {
    fn matcher(&self) -> &RuleMatcher<RelNodeType> {
        &self.matcher
    }

    fn matches(&self, _optimizer: &O, binding: &ArcPlanNode<RelNodeType>) -> bool {
        let sort = bound_sort(binding);
        !sort.collation().is_empty() && !sort.has_window()
    }

    fn apply(&self, call: &mut RuleCall<'_, RelNodeType, O>) {
        let sort = bound_sort(&call.binding());
        call.propose(
            PhysicalSort::new_unchecked(sort.child(), sort.collation()).into_plan_node(),
        );
    }

    fn name(&self) -> &'static str {
        "sort"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}

/// `Sort` with a row window and no collation becomes `PhysicalLimit`.
pub struct LimitRule {
    matcher: RuleMatcher<RelNodeType>,
}

impl LimitRule {
    pub fn new() -> Self {
        Self {
            matcher: sort_matcher(),
        }
    }
}

impl<O: Optimizer<RelNodeType>> Rule<RelNodeType, O> for LimitRule {
    fn matcher(&self) -> &RuleMatcher<RelNodeType> {
        &self.matcher
    }

    fn matches(&self, _optimizer: &O, binding: &ArcPlanNode<RelNodeType>) -> bool {
        let sort = bound_sort(binding);
        sort.collation().is_empty() && sort.has_window()
    }

    fn apply(&self, call: &mut RuleCall<'_, RelNodeType, O>) {
        let sort = bound_sort(&call.binding());
        call.propose(
            PhysicalLimit::new_unchecked(sort.child(), sort.offset(), sort.fetch())
                .into_plan_node(),
        );
    }

    fn name(&self) -> &'static str {
        "limit"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}

/// `Sort` with both a collation and a row window becomes the fused `PhysicalLimitSort`,
/// carrying the collation, offset, and fetch of the original sort unchanged. A separate sort
/// plus limit is not proposed: a limit cannot pass an order requirement to its input, so the
/// split plan would lose the collation.
pub struct LimitSortRule {
    matcher: RuleMatcher<RelNodeType>,
}

impl LimitSortRule {
    pub fn new() -> Self {
        Self {
            matcher: sort_matcher(),
        }
    }
}

impl<O: Optimizer<RelNodeType>> Rule<RelNodeType, O> for LimitSortRule {
    fn matcher(&self) -> &RuleMatcher<RelNodeType> {
        &self.matcher
    }

    fn matches(&self, _optimizer: &O, binding: &ArcPlanNode<RelNodeType>) -> bool {
        let sort = bound_sort(binding);
        !sort.collation().is_empty() && sort.has_window()
    }

    fn apply(&self, call: &mut RuleCall<'_, RelNodeType, O>) {
        let sort = bound_sort(&call.binding());
        call.propose(
            PhysicalLimitSort::new_unchecked(
                sort.child(),
                sort.collation(),
                sort.offset(),
                sort.fetch(),
            )
            .into_plan_node(),
        );
    }

    fn name(&self) -> &'static str {
        "limit_sort"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}
