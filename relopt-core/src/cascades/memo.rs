// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use tracing::trace;

use super::optimizer::{ExprId, GroupId, PredId, SubGoalId};
use crate::cost::Cost;
use crate::logical_property::{LogicalProperty, LogicalPropertyBuilderAny};
use crate::nodes::{ArcPlanNode, ArcPredNode, NodeType, PlanNode, PlanNodeOrGroup};
use crate::physical_property::{PhysicalProperty, PhysicalPropertyBuilders};

pub type ArcMemoPlanNode<T> = Arc<MemoPlanNode<T>>;

/// The plan node representation in the memo table: children are group IDs and predicates are
/// interned. Equivalent to MExpr in Columbia/Cascades.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemoPlanNode<T: NodeType> {
    pub typ: T,
    pub children: Vec<GroupId>,
    pub predicates: Vec<PredId>,
}

impl<T: NodeType> std::fmt::Display for MemoPlanNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}", self.typ)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        for pred in &self.predicates {
            write!(f, " {}", pred)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone)]
pub enum WinnerExpr {
    /// The winner is a physical expression of the group that can passthrough all required
    /// physical properties (or there are no requirements).
    Expr { expr_id: ExprId },
    /// The winner is an enforcer placed on top of the group itself.
    Enforcer {
        /// The enforcer expression. Note that it does not belong to this group.
        expr_id: ExprId,
        /// The goal the enforcer's input (the group itself) is optimized under.
        child_goal_id: SubGoalId,
    },
    /// The winner is another (group, goal) pair. For example, if a group contains a logical sort
    /// over group Y, the requirement can be satisfied by searching Y directly with the sort as
    /// the required property.
    Propagate {
        group_id: GroupId,
        subgoal_id: SubGoalId,
    },
}

#[derive(Clone)]
pub struct WinnerInfo {
    pub expr_id: WinnerExpr,
    pub total_weighted_cost: f64,
    pub operation_weighted_cost: f64,
    pub total_cost: Cost,
    pub operation_cost: Cost,
    /// The physical properties the winner actually provides. These satisfy the goal but are not
    /// necessarily equal to it.
    pub derived_physical_properties: Arc<[Box<dyn PhysicalProperty>]>,
}

#[derive(Clone, Default)]
pub enum Winner {
    /// The winner is unknown, or impossible (no physical expression produced for the goal).
    #[default]
    Unknown,
    Full(WinnerInfo),
}

impl Winner {
    pub fn has_full_winner(&self) -> bool {
        matches!(self, Self::Full { .. })
    }

    pub fn as_full_winner(&self) -> Option<&WinnerInfo> {
        match self {
            Self::Full(info) => Some(info),
            _ => None,
        }
    }
}

pub type RequiredPhysicalProperties = Arc<[Box<dyn PhysicalProperty>]>;

pub struct Group {
    /// Logical and physical expressions of the group.
    pub(crate) group_exprs: HashSet<ExprId>,
    /// One winner per search goal (required set of physical properties) within the group.
    pub(crate) winners: HashMap<SubGoalId, (RequiredPhysicalProperties, Winner)>,
    /// Logical properties of the group, inferred from the first expression added to it.
    pub(crate) logical_properties: Arc<[Box<dyn LogicalProperty>]>,
}

/// Trait for memo table implementations.
pub trait Memo<T: NodeType>: 'static + Send + Sync {
    /// Add an expression to the memo table. If the expression already exists, returns the
    /// existing group and expr IDs; otherwise a new group is created.
    fn add_new_expr(&mut self, rel_node: ArcPlanNode<T>) -> (GroupId, ExprId);

    /// Add an expression to an existing group. If the expression is a group reference, the two
    /// groups are merged and `None` is returned.
    fn add_expr_to_group(
        &mut self,
        rel_node: PlanNodeOrGroup<T>,
        group_id: GroupId,
    ) -> Option<ExprId>;

    /// Intern a predicate.
    fn add_new_pred(&mut self, pred_node: ArcPredNode<T>) -> PredId;

    /// Get the group id of an expression. Volatile across group merges.
    fn get_group_id(&self, expr_id: ExprId) -> GroupId;

    /// Get the memoized representation of a node.
    fn get_expr_memoed(&self, expr_id: ExprId) -> ArcMemoPlanNode<T>;

    /// Get all group IDs in the memo table.
    fn get_all_group_ids(&self) -> Vec<GroupId>;

    fn get_group(&self, group_id: GroupId) -> &Group;

    fn get_pred(&self, pred_id: PredId) -> ArcPredNode<T>;

    /// Update the winner of a search goal.
    fn update_winner(&mut self, group_id: GroupId, subgoal_id: SubGoalId, winner: Winner);

    /// Create a search goal on the group for a winner satisfying the required physical
    /// properties. Idempotent: an existing goal with the same properties is returned as-is.
    fn create_or_get_subgoal(
        &mut self,
        group_id: GroupId,
        required_phys_props: RequiredPhysicalProperties,
    ) -> SubGoalId;

    /// Look up an existing search goal by its required properties.
    fn get_subgoal(
        &self,
        group_id: GroupId,
        required_phys_props: RequiredPhysicalProperties,
    ) -> SubGoalId;

    /// Get all search goals of a group.
    fn get_all_subgoal_ids(&self, group_id: GroupId) -> Vec<SubGoalId>;

    /// Get the required properties of a search goal.
    fn get_subgoal_goal(
        &self,
        group_id: GroupId,
        subgoal_id: SubGoalId,
    ) -> RequiredPhysicalProperties;

    /// Whether adding `node` to `group_id` would keep the group's logical properties intact.
    /// A rule that produces a node violating this is malformed and its output must be rejected.
    fn compatible_with_group(&self, node: &PlanNodeOrGroup<T>, group_id: GroupId) -> bool;

    /// Estimated plan space size, i.e., the number of expressions in the memo table. Used for
    /// the space exploration budget.
    fn estimated_plan_space(&self) -> usize;

    // The functions below can be overridden when an implementation has a faster path.

    /// Get all expressions in the group.
    fn get_all_exprs_in_group(&self, group_id: GroupId) -> Vec<ExprId> {
        let group = self.get_group(group_id);
        let mut exprs = group.group_exprs.iter().copied().collect_vec();
        // Sort for a stable processing order across platforms.
        exprs.sort();
        exprs
    }

    fn get_group_winner(&self, group_id: GroupId, subgoal_id: SubGoalId) -> &Winner {
        &self.get_group(group_id).winners[&subgoal_id].1
    }

    /// Extract the cheapest physical plan for a (group, goal) pair by walking the winners.
    /// Fails if any goal on the path has no winner.
    fn get_best_group_binding(
        &self,
        group_id: GroupId,
        subgoal_id: SubGoalId,
    ) -> Result<ArcPlanNode<T>> {
        let mut visited = HashSet::new();
        get_best_group_binding_inner(self, group_id, subgoal_id, &mut visited)
    }

    fn get_physical_property_builders(&self) -> &PhysicalPropertyBuilders<T>;
}

fn get_best_group_binding_inner<M: Memo<T> + ?Sized, T: NodeType>(
    this: &M,
    group_id: GroupId,
    subgoal_id: SubGoalId,
    visited: &mut HashSet<(GroupId, SubGoalId)>,
) -> Result<ArcPlanNode<T>> {
    let winner = this.get_group_winner(group_id, subgoal_id);

    if visited.contains(&(group_id, subgoal_id)) {
        bail!(
            "cycle detected in the winner result: group_id={}, subgoal_id={}",
            group_id,
            subgoal_id
        );
    }
    visited.insert((group_id, subgoal_id));

    if let Winner::Full(WinnerInfo {
        expr_id,
        derived_physical_properties,
        ..
    }) = winner
    {
        let required_phys_props = this.get_subgoal_goal(group_id, subgoal_id);
        if !this
            .get_physical_property_builders()
            .satisfies_many(derived_physical_properties, &required_phys_props)
        {
            bail!(
                "winner of group {} does not provide the required physical properties: \
                 derived [{}], required [{}]",
                group_id,
                derived_physical_properties.iter().map(|x| x.to_string()).join(", "),
                required_phys_props.iter().map(|x| x.to_string()).join(", ")
            );
        }
        match expr_id {
            WinnerExpr::Expr { expr_id } => {
                let expr = this.get_expr_memoed(*expr_id);
                let predicates = expr
                    .predicates
                    .iter()
                    .map(|x| this.get_pred(*x))
                    .collect_vec();
                let required_child_phys_props = this
                    .get_physical_property_builders()
                    .passthrough_many(
                        expr.typ.clone(),
                        &predicates,
                        &required_phys_props,
                        expr.children.len(),
                    )
                    .into_iter()
                    .map(Arc::<[_]>::from)
                    .collect_vec();
                let mut children = Vec::with_capacity(expr.children.len());
                for (child_idx, &child) in expr.children.iter().enumerate() {
                    let child_subgoal_id =
                        this.get_subgoal(child, required_child_phys_props[child_idx].clone());
                    children.push(PlanNodeOrGroup::PlanNode(
                        get_best_group_binding_inner(this, child, child_subgoal_id, visited)
                            .with_context(|| format!("when processing expr {}", expr_id))?,
                    ));
                }
                let node = Arc::new(PlanNode {
                    typ: expr.typ.clone(),
                    children,
                    predicates,
                });
                visited.remove(&(group_id, subgoal_id));
                return Ok(node);
            }
            WinnerExpr::Enforcer {
                expr_id,
                child_goal_id,
            } => {
                let expr = this.get_expr_memoed(*expr_id);
                assert_eq!(expr.children.len(), 1);
                let child_group_id = expr.children[0];
                let child_node =
                    get_best_group_binding_inner(this, child_group_id, *child_goal_id, visited)?;
                let node = Arc::new(PlanNode {
                    typ: expr.typ.clone(),
                    children: vec![PlanNodeOrGroup::PlanNode(child_node)],
                    predicates: expr
                        .predicates
                        .iter()
                        .map(|x| this.get_pred(*x))
                        .collect_vec(),
                });
                visited.remove(&(group_id, subgoal_id));
                return Ok(node);
            }
            WinnerExpr::Propagate {
                group_id: child_group_id,
                subgoal_id: child_subgoal_id,
            } => {
                let node = get_best_group_binding_inner(
                    this,
                    *child_group_id,
                    *child_subgoal_id,
                    visited,
                )?;
                visited.remove(&(group_id, subgoal_id));
                return Ok(node);
            }
        }
    }
    let required_phys_props = this.get_subgoal_goal(group_id, subgoal_id);
    bail!(
        "no plan found for group {} satisfying the required physical properties [{}]; \
         candidate expressions: {}",
        group_id,
        required_phys_props.iter().map(|x| x.to_string()).join(", "),
        this.get_all_exprs_in_group(group_id)
            .iter()
            .map(|x| this.get_expr_memoed(*x).to_string())
            .join(", ")
    )
}

/// A naive, simple, and unoptimized memo table implementation.
pub struct NaiveMemo<T: NodeType> {
    // Source of truth.
    groups: HashMap<GroupId, Group>,
    expr_id_to_expr_node: HashMap<ExprId, ArcMemoPlanNode<T>>,

    // Predicate interning.
    pred_id_to_pred_node: HashMap<PredId, ArcPredNode<T>>,
    pred_node_to_pred_id: HashMap<ArcPredNode<T>, PredId>,

    // Internal states.
    group_expr_counter: usize,
    logical_property_builders: Arc<[Box<dyn LogicalPropertyBuilderAny<T>>]>,
    physical_property_builders: PhysicalPropertyBuilders<T>,

    // Indexes.
    expr_node_to_expr_id: HashMap<MemoPlanNode<T>, ExprId>,
    expr_id_to_group_id: HashMap<ExprId, GroupId>,

    // We update all group IDs in the memo table upon group merging, but
    // there might be edge cases that some tasks still hold the old group ID.
    // In this case, we need this mapping to redirect to the merged group ID.
    merged_group_mapping: HashMap<GroupId, GroupId>,
    dup_expr_mapping: HashMap<ExprId, ExprId>,
}

impl<T: NodeType> Memo<T> for NaiveMemo<T> {
    fn create_or_get_subgoal(
        &mut self,
        group_id: GroupId,
        required_phys_props: RequiredPhysicalProperties,
    ) -> SubGoalId {
        assert_eq!(
            required_phys_props.len(),
            self.physical_property_builders.len()
        );
        let group_id = self.reduce_group(group_id);
        let group = self.groups.get_mut(&group_id).unwrap();
        for (subgoal_id, (props, _)) in group.winners.iter() {
            if self
                .physical_property_builders
                .exactly_eq(props, &required_phys_props)
            {
                return *subgoal_id;
            }
        }
        let subgoal_id = self.next_subgoal_id();
        let group = self.groups.get_mut(&group_id).unwrap();
        group
            .winners
            .insert(subgoal_id, (required_phys_props, Winner::Unknown));
        subgoal_id
    }

    fn get_subgoal(
        &self,
        group_id: GroupId,
        required_phys_props: RequiredPhysicalProperties,
    ) -> SubGoalId {
        let group_id = self.reduce_group(group_id);
        let group = self.groups.get(&group_id).unwrap();
        for (subgoal_id, (props, _)) in group.winners.iter() {
            if self
                .physical_property_builders
                .exactly_eq(props, &required_phys_props)
            {
                return *subgoal_id;
            }
        }
        unreachable!("subgoal not found")
    }

    fn get_subgoal_goal(
        &self,
        group_id: GroupId,
        subgoal_id: SubGoalId,
    ) -> RequiredPhysicalProperties {
        let group_id = self.reduce_group(group_id);
        self.groups[&group_id].winners[&subgoal_id].0.clone()
    }

    fn get_all_subgoal_ids(&self, group_id: GroupId) -> Vec<SubGoalId> {
        let group_id = self.reduce_group(group_id);
        let mut subgoals = self.groups[&group_id].winners.keys().copied().collect_vec();
        subgoals.sort();
        subgoals
    }

    fn get_physical_property_builders(&self) -> &PhysicalPropertyBuilders<T> {
        &self.physical_property_builders
    }

    fn add_new_expr(&mut self, rel_node: ArcPlanNode<T>) -> (GroupId, ExprId) {
        let (group_id, expr_id) = self
            .add_new_group_expr_inner(rel_node, None)
            .expect("should not trigger merge group");
        self.verify_integrity();
        (group_id, expr_id)
    }

    fn add_expr_to_group(
        &mut self,
        rel_node: PlanNodeOrGroup<T>,
        group_id: GroupId,
    ) -> Option<ExprId> {
        match rel_node {
            PlanNodeOrGroup::Group(input_group) => {
                let input_group = self.reduce_group(input_group);
                let group_id = self.reduce_group(group_id);
                self.merge_group_inner(input_group, group_id);
                None
            }
            PlanNodeOrGroup::PlanNode(rel_node) => {
                let reduced_group_id = self.reduce_group(group_id);
                let (returned_group_id, expr_id) = self
                    .add_new_group_expr_inner(rel_node, Some(reduced_group_id))
                    .unwrap();
                assert_eq!(returned_group_id, reduced_group_id);
                self.verify_integrity();
                Some(expr_id)
            }
        }
    }

    fn add_new_pred(&mut self, pred_node: ArcPredNode<T>) -> PredId {
        let pred_id = self.next_pred_id();
        if let Some(id) = self.pred_node_to_pred_id.get(&pred_node) {
            return *id;
        }
        self.pred_node_to_pred_id.insert(pred_node.clone(), pred_id);
        self.pred_id_to_pred_node.insert(pred_id, pred_node);
        pred_id
    }

    fn get_pred(&self, pred_id: PredId) -> ArcPredNode<T> {
        self.pred_id_to_pred_node[&pred_id].clone()
    }

    fn get_group_id(&self, mut expr_id: ExprId) -> GroupId {
        while let Some(new_expr_id) = self.dup_expr_mapping.get(&expr_id) {
            expr_id = *new_expr_id;
        }
        *self
            .expr_id_to_group_id
            .get(&expr_id)
            .expect("expr not found in group mapping")
    }

    fn get_expr_memoed(&self, mut expr_id: ExprId) -> ArcMemoPlanNode<T> {
        while let Some(new_expr_id) = self.dup_expr_mapping.get(&expr_id) {
            expr_id = *new_expr_id;
        }
        self.expr_id_to_expr_node
            .get(&expr_id)
            .expect("expr not found in expr mapping")
            .clone()
    }

    fn get_all_group_ids(&self) -> Vec<GroupId> {
        let mut ids = self.groups.keys().copied().collect_vec();
        ids.sort();
        ids
    }

    fn get_group(&self, group_id: GroupId) -> &Group {
        let group_id = self.reduce_group(group_id);
        self.groups.get(&group_id).as_ref().unwrap()
    }

    fn update_winner(&mut self, group_id: GroupId, subgoal_id: SubGoalId, winner: Winner) {
        let group_id = self.reduce_group(group_id);
        let group = self.groups.get_mut(&group_id).unwrap();
        if let Winner::Full(WinnerInfo {
            total_weighted_cost,
            expr_id,
            ..
        }) = &winner
        {
            if let WinnerExpr::Expr { expr_id } = expr_id {
                assert!(
                    *total_weighted_cost != 0.0,
                    "{}",
                    self.expr_id_to_expr_node[expr_id]
                );
            } else {
                assert!(*total_weighted_cost != 0.0);
            }
        }
        let (winner_prop, current_winner) = group.winners.get_mut(&subgoal_id).unwrap();
        *current_winner = winner.clone();
        let winner_prop = winner_prop.clone();
        // Keep goals with identical properties in sync (they can appear through group merges).
        for (prop, other_winner) in group.winners.values_mut() {
            if self
                .physical_property_builders
                .exactly_eq(prop, &winner_prop)
            {
                *other_winner = winner.clone();
            }
        }
    }

    fn compatible_with_group(&self, node: &PlanNodeOrGroup<T>, group_id: GroupId) -> bool {
        let group_id = self.reduce_group(group_id);
        let group_props = self.groups[&group_id].logical_properties.clone();
        let node_props = match node {
            PlanNodeOrGroup::Group(other) => {
                let other = self.reduce_group(*other);
                self.groups[&other].logical_properties.clone()
            }
            PlanNodeOrGroup::PlanNode(node) => self.infer_node_properties(node).into(),
        };
        assert_eq!(node_props.len(), group_props.len());
        self.logical_property_builders
            .iter()
            .zip(node_props.iter())
            .zip(group_props.iter())
            .all(|((builder, a), b)| builder.exactly_eq_any(a.as_ref(), b.as_ref()))
    }

    fn estimated_plan_space(&self) -> usize {
        self.expr_id_to_expr_node.len()
    }
}

impl<T: NodeType> NaiveMemo<T> {
    pub fn new(
        logical_property_builders: Arc<[Box<dyn LogicalPropertyBuilderAny<T>>]>,
        physical_property_builders: PhysicalPropertyBuilders<T>,
    ) -> Self {
        Self {
            expr_id_to_group_id: HashMap::new(),
            expr_id_to_expr_node: HashMap::new(),
            expr_node_to_expr_id: HashMap::new(),
            pred_id_to_pred_node: HashMap::new(),
            pred_node_to_pred_id: HashMap::new(),
            groups: HashMap::new(),
            group_expr_counter: 0,
            merged_group_mapping: HashMap::new(),
            logical_property_builders,
            physical_property_builders,
            dup_expr_mapping: HashMap::new(),
        }
    }

    /// Group, goal, expr, and pred IDs share the same counter, so as to make it easier to
    /// debug...
    fn next_group_id(&mut self) -> GroupId {
        let id = self.group_expr_counter;
        self.group_expr_counter += 1;
        GroupId(id)
    }

    fn next_subgoal_id(&mut self) -> SubGoalId {
        let id = self.group_expr_counter;
        self.group_expr_counter += 1;
        SubGoalId(id)
    }

    fn next_expr_id(&mut self) -> ExprId {
        let id = self.group_expr_counter;
        self.group_expr_counter += 1;
        ExprId(id)
    }

    fn next_pred_id(&mut self) -> PredId {
        let id = self.group_expr_counter;
        self.group_expr_counter += 1;
        PredId(id)
    }

    fn verify_integrity(&self) {
        if cfg!(debug_assertions) {
            let num_of_exprs = self.expr_id_to_expr_node.len();
            assert_eq!(num_of_exprs, self.expr_node_to_expr_id.len());
            assert_eq!(num_of_exprs, self.expr_id_to_group_id.len());

            let mut valid_groups = HashSet::new();
            for to in self.merged_group_mapping.values() {
                assert_eq!(self.merged_group_mapping[to], *to);
                valid_groups.insert(*to);
            }
            assert_eq!(valid_groups.len(), self.groups.len());

            for (id, node) in self.expr_id_to_expr_node.iter() {
                assert_eq!(self.expr_node_to_expr_id[node], *id);
                for child in &node.children {
                    assert!(
                        valid_groups.contains(child),
                        "invalid group used in expression {}, where {} does not exist any more",
                        node,
                        child
                    );
                }
            }

            let mut cnt = 0;
            for (group_id, group) in &self.groups {
                assert!(valid_groups.contains(group_id));
                cnt += group.group_exprs.len();
                assert!(!group.group_exprs.is_empty());
                for expr in &group.group_exprs {
                    assert_eq!(self.expr_id_to_group_id[expr], *group_id);
                }
            }
            assert_eq!(cnt, num_of_exprs);
        }
    }

    fn reduce_group(&self, group_id: GroupId) -> GroupId {
        self.merged_group_mapping[&group_id]
    }

    fn merge_group_inner(&mut self, merge_into: GroupId, merge_from: GroupId) {
        if merge_into == merge_from {
            return;
        }
        trace!(event = "merge_group", merge_into = %merge_into, merge_from = %merge_from);
        let group_merge_from = self.groups.remove(&merge_from).unwrap();
        let group_merge_into = self.groups.get_mut(&merge_into).unwrap();
        for from_expr in group_merge_from.group_exprs {
            let ret = self.expr_id_to_group_id.insert(from_expr, merge_into);
            assert!(ret.is_some());
            group_merge_into.group_exprs.insert(from_expr);
        }
        group_merge_into.winners.extend(group_merge_from.winners);
        let mut new_winners = HashMap::new();
        fn better_winner<'a>(a: &'a Winner, b: &'a Winner) -> &'a Winner {
            match (a, b) {
                (left @ Winner::Full(a), right @ Winner::Full(b)) => {
                    if a.total_weighted_cost < b.total_weighted_cost {
                        left
                    } else {
                        right
                    }
                }
                (left @ Winner::Full(_), _) => left,
                (_, right @ Winner::Full(_)) => right,
                (_, other) => other,
            }
        }
        struct HashableGoal<T: NodeType> {
            props: RequiredPhysicalProperties,
            builder: PhysicalPropertyBuilders<T>,
        }
        impl<T: NodeType> PartialEq for HashableGoal<T> {
            fn eq(&self, other: &Self) -> bool {
                self.builder.exactly_eq(&self.props, &other.props)
            }
        }
        impl<T: NodeType> Eq for HashableGoal<T> {}
        impl<T: NodeType> std::hash::Hash for HashableGoal<T> {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.builder.hash_any(&self.props, state);
            }
        }

        // Merging can produce several goals with the same properties; keep the cheapest winner
        // for each and propagate it to all of them.
        for (required_prop, winner) in group_merge_into.winners.values() {
            let entry = new_winners
                .entry(HashableGoal {
                    props: required_prop.clone(),
                    builder: self.physical_property_builders.clone(),
                })
                .or_insert_with(|| winner.clone());
            *entry = better_winner(entry, winner).clone();
        }
        for (required_prop, winner) in group_merge_into.winners.values_mut() {
            let entry = new_winners
                .get(&HashableGoal {
                    props: required_prop.clone(),
                    builder: self.physical_property_builders.clone(),
                })
                .unwrap();
            *winner = entry.clone();
        }

        self.merged_group_mapping.insert(merge_from, merge_into);

        // Update all indexes and other data structures
        // 1. update merged group mapping -- could be optimized with union find
        for (_, mapped_to) in self.merged_group_mapping.iter_mut() {
            if *mapped_to == merge_from {
                *mapped_to = merge_into;
            }
        }

        let mut pending_recursive_merge = Vec::new();
        // 2. update all group expressions and indexes
        for (group_id, group) in self.groups.iter_mut() {
            let mut new_expr_list = HashSet::new();
            for expr_id in group.group_exprs.iter() {
                let expr = self.expr_id_to_expr_node[expr_id].clone();
                if expr.children.contains(&merge_from) {
                    // Create the new expr node
                    let old_expr = expr.as_ref().clone();
                    let mut new_expr = expr.as_ref().clone();
                    new_expr.children.iter_mut().for_each(|x| {
                        if *x == merge_from {
                            *x = merge_into;
                        }
                    });
                    // Update all existing entries and indexes
                    self.expr_id_to_expr_node
                        .insert(*expr_id, Arc::new(new_expr.clone()));
                    self.expr_node_to_expr_id.remove(&old_expr);
                    if let Some(dup_expr) = self.expr_node_to_expr_id.get(&new_expr) {
                        // If new_expr == some_other_old_expr in the memo table, unless they
                        // belong to the same group, we should merge the two groups. Drop this
                        // expression either way.
                        let dup_group_id = self.expr_id_to_group_id[dup_expr];
                        if dup_group_id != *group_id {
                            pending_recursive_merge.push((dup_group_id, *group_id));
                        }
                        self.expr_id_to_expr_node.remove(expr_id);
                        self.expr_id_to_group_id.remove(expr_id);
                        self.dup_expr_mapping.insert(*expr_id, *dup_expr);
                        new_expr_list.insert(*dup_expr); // adding this temporarily -- should be
                                                         // removed once recursive merge finishes
                    } else {
                        self.expr_node_to_expr_id.insert(new_expr, *expr_id);
                        new_expr_list.insert(*expr_id);
                    }
                } else {
                    new_expr_list.insert(*expr_id);
                }
            }
            assert!(!new_expr_list.is_empty());
            group.group_exprs = new_expr_list;
        }
        for (merge_from, merge_into) in pending_recursive_merge {
            // We need to reduce because each merge would probably invalidate some groups in the
            // last loop iteration.
            let merge_from = self.reduce_group(merge_from);
            let merge_into = self.reduce_group(merge_into);
            self.merge_group_inner(merge_into, merge_from);
        }
    }

    fn add_new_group_expr_inner(
        &mut self,
        rel_node: ArcPlanNode<T>,
        add_to_group_id: Option<GroupId>,
    ) -> anyhow::Result<(GroupId, ExprId)> {
        let children_group_ids = rel_node
            .children
            .iter()
            .map(|child| match child {
                PlanNodeOrGroup::Group(group) => self.reduce_group(*group),
                PlanNodeOrGroup::PlanNode(child) => {
                    // No merge / modification to the memo should occur for the following
                    // operation
                    let (group, _) = self
                        .add_new_group_expr_inner(child.clone(), None)
                        .expect("should not trigger merge group");
                    self.reduce_group(group)
                }
            })
            .collect::<Vec<_>>();
        let memo_node = MemoPlanNode {
            typ: rel_node.typ.clone(),
            children: children_group_ids,
            predicates: rel_node
                .predicates
                .iter()
                .map(|x| self.add_new_pred(x.clone()))
                .collect(),
        };
        if let Some(&expr_id) = self.expr_node_to_expr_id.get(&memo_node) {
            let group_id = self.expr_id_to_group_id[&expr_id];
            if let Some(add_to_group_id) = add_to_group_id {
                let add_to_group_id = self.reduce_group(add_to_group_id);
                self.merge_group_inner(add_to_group_id, group_id);
                return Ok((add_to_group_id, expr_id));
            }
            return Ok((group_id, expr_id));
        }
        let expr_id = self.next_expr_id();
        let group_id = if let Some(group_id) = add_to_group_id {
            group_id
        } else {
            self.next_group_id()
        };
        self.expr_id_to_expr_node
            .insert(expr_id, memo_node.clone().into());
        self.expr_id_to_group_id.insert(expr_id, group_id);
        self.expr_node_to_expr_id.insert(memo_node.clone(), expr_id);
        self.append_expr_to_group(expr_id, group_id, memo_node);
        Ok((group_id, expr_id))
    }

    /// This is inefficient: usually the optimizer should have a memo reference instead of
    /// passing the full rel node. Should be only used for debugging purposes.
    #[cfg(test)]
    pub(crate) fn get_expr_info(&self, rel_node: ArcPlanNode<T>) -> (GroupId, ExprId) {
        let children_group_ids = rel_node
            .children
            .iter()
            .map(|child| match child {
                PlanNodeOrGroup::Group(group) => *group,
                PlanNodeOrGroup::PlanNode(child) => self.get_expr_info(child.clone()).0,
            })
            .collect::<Vec<_>>();
        let memo_node = MemoPlanNode {
            typ: rel_node.typ.clone(),
            children: children_group_ids,
            predicates: rel_node
                .predicates
                .iter()
                .map(|x| self.pred_node_to_pred_id[x])
                .collect(),
        };
        let Some(&expr_id) = self.expr_node_to_expr_id.get(&memo_node) else {
            unreachable!("not found {}", memo_node)
        };
        let group_id = self.expr_id_to_group_id[&expr_id];
        (group_id, expr_id)
    }

    fn infer_properties(&self, memo_node: MemoPlanNode<T>) -> Vec<Box<dyn LogicalProperty>> {
        let child_properties = memo_node
            .children
            .iter()
            .map(|child| self.groups[child].logical_properties.clone())
            .collect_vec();
        let mut props = Vec::with_capacity(self.logical_property_builders.len());
        for (id, builder) in self.logical_property_builders.iter().enumerate() {
            let child_properties = child_properties
                .iter()
                .map(|x| x[id].as_ref())
                .collect::<Vec<_>>();
            let predicates = memo_node
                .predicates
                .iter()
                .map(|x| self.pred_id_to_pred_node[x].clone())
                .collect_vec();
            let prop = builder.derive_any(
                memo_node.typ.clone(),
                &predicates,
                child_properties.as_slice(),
            );
            props.push(prop);
        }
        props
    }

    /// Infer the logical properties of a node that is not (yet) in the memo table. Materialized
    /// children are resolved recursively; group children use the group's properties.
    fn infer_node_properties(&self, node: &ArcPlanNode<T>) -> Vec<Box<dyn LogicalProperty>> {
        let child_properties = node
            .children
            .iter()
            .map(|child| match child {
                PlanNodeOrGroup::Group(group) => {
                    let group = self.reduce_group(*group);
                    self.groups[&group].logical_properties.clone()
                }
                PlanNodeOrGroup::PlanNode(child) => self.infer_node_properties(child).into(),
            })
            .collect_vec();
        let mut props = Vec::with_capacity(self.logical_property_builders.len());
        for (id, builder) in self.logical_property_builders.iter().enumerate() {
            let child_properties = child_properties
                .iter()
                .map(|x| x[id].as_ref())
                .collect::<Vec<_>>();
            props.push(builder.derive_any(
                node.typ.clone(),
                &node.predicates,
                child_properties.as_slice(),
            ));
        }
        props
    }

    /// If group_id exists, it adds expr_id to the existing group.
    /// Otherwise, it creates a new group of that group_id and inserts expr_id into the new group.
    fn append_expr_to_group(
        &mut self,
        expr_id: ExprId,
        group_id: GroupId,
        memo_node: MemoPlanNode<T>,
    ) {
        trace!(event = "add_expr_to_group", group_id = %group_id, expr_id = %expr_id, memo_node = %memo_node);
        if let Entry::Occupied(mut entry) = self.groups.entry(group_id) {
            let group = entry.get_mut();
            group.group_exprs.insert(expr_id);
            return;
        }
        // Create group and infer properties (only upon initializing a group).
        let mut group = Group {
            group_exprs: HashSet::new(),
            winners: Default::default(),
            logical_properties: self.infer_properties(memo_node).into(),
        };
        group.group_exprs.insert(expr_id);
        self.groups.insert(group_id, group);
        self.merged_group_mapping.insert(group_id, group_id);
    }

    pub fn clear_winner(&mut self) {
        for group in self.groups.values_mut() {
            for (_, (_, winner)) in group.winners.iter_mut() {
                *winner = Winner::Unknown;
            }
        }
    }
}
