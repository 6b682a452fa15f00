// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Expansion of rule matchers against the memo. A matcher binds to every combination of
//! memoized child expressions; `Any`/`AnyMany` positions stay as group references so that the
//! rule does not have to materialize subtrees it will not inspect.

use std::sync::Arc;

use itertools::Itertools;

use crate::cascades::memo::ArcMemoPlanNode;
use crate::cascades::optimizer::{CascadesOptimizer, ExprId};
use crate::cascades::{GroupId, Memo};
use crate::nodes::{ArcPlanNode, NodeType, PlanNode, PlanNodeOrGroup};
use crate::rules::RuleMatcher;

/// Above this, a single rule application is likely stuck in a cross-product explosion.
const BINDING_WARN_THRESHOLD: usize = 100;

/// Expand `matcher` against a memoized expression, returning one plan per binding.
pub(crate) fn match_and_pick_expr<T: NodeType, M: Memo<T>>(
    matcher: &RuleMatcher<T>,
    expr_id: ExprId,
    optimizer: &CascadesOptimizer<T, M>,
) -> Vec<ArcPlanNode<T>> {
    let node = optimizer.get_expr_memoed(expr_id);
    let bindings = match_root(matcher, node, optimizer);
    if bindings.len() >= BINDING_WARN_THRESHOLD {
        tracing::warn!(
            event = "rule_match",
            expr_id = %expr_id,
            num_bindings = %bindings.len(),
            "matcher expanded into a large number of bindings"
        );
    }
    bindings
}

fn match_root<T: NodeType, M: Memo<T>>(
    matcher: &RuleMatcher<T>,
    node: ArcMemoPlanNode<T>,
    optimizer: &CascadesOptimizer<T, M>,
) -> Vec<ArcPlanNode<T>> {
    let child_matchers = match matcher {
        RuleMatcher::MatchNode { typ, children } => (&node.typ == typ).then_some(children),
        RuleMatcher::MatchDiscriminant {
            typ_discriminant,
            children,
        } => (&std::mem::discriminant(&node.typ) == typ_discriminant).then_some(children),
        _ => panic!("top matcher must match a node type"),
    };
    match child_matchers {
        Some(child_matchers) => bind_children(child_matchers, node, optimizer),
        None => vec![],
    }
}

fn bind_children<T: NodeType, M: Memo<T>>(
    child_matchers: &[RuleMatcher<T>],
    node: ArcMemoPlanNode<T>,
    optimizer: &CascadesOptimizer<T, M>,
) -> Vec<ArcPlanNode<T>> {
    let predicates = node
        .predicates
        .iter()
        .map(|pred_id| optimizer.get_pred(*pred_id))
        .collect_vec();
    let make_node = |children| {
        Arc::new(PlanNode {
            typ: node.typ.clone(),
            children,
            predicates: predicates.clone(),
        })
    };

    if let [RuleMatcher::AnyMany] = child_matchers {
        // Fast path: keep all children as group references.
        return vec![make_node(
            node.children
                .iter()
                .map(|x| PlanNodeOrGroup::Group(*x))
                .collect(),
        )];
    }

    assert_eq!(child_matchers.len(), node.children.len(), "mismatched matcher");
    let mut per_child = Vec::with_capacity(child_matchers.len());
    for (matcher, &child_group) in child_matchers.iter().zip(node.children.iter()) {
        let choices = match matcher {
            RuleMatcher::Any => vec![PlanNodeOrGroup::Group(child_group)],
            RuleMatcher::AnyMany => {
                unreachable!("many matcher must be the only child matcher")
            }
            _ => {
                let bound = match_group(matcher, child_group, optimizer);
                if bound.is_empty() {
                    return vec![];
                }
                bound.into_iter().map(PlanNodeOrGroup::PlanNode).collect()
            }
        };
        per_child.push(choices);
    }
    cross_product(per_child).into_iter().map(make_node).collect()
}

/// One combination per choice of child binding. A node without children binds exactly once.
fn cross_product<T: NodeType>(
    per_child: Vec<Vec<PlanNodeOrGroup<T>>>,
) -> Vec<Vec<PlanNodeOrGroup<T>>> {
    if per_child.is_empty() {
        return vec![vec![]];
    }
    per_child
        .into_iter()
        .multi_cartesian_product()
        .collect_vec()
}

fn match_group<T: NodeType, M: Memo<T>>(
    matcher: &RuleMatcher<T>,
    group_id: GroupId,
    optimizer: &CascadesOptimizer<T, M>,
) -> Vec<ArcPlanNode<T>> {
    optimizer
        .get_all_exprs_in_group(group_id)
        .into_iter()
        .flat_map(|expr_id| match_root(matcher, optimizer.get_expr_memoed(expr_id), optimizer))
        .collect()
}
