use std::sync::Arc;

use itertools::Itertools;
use tracing::trace;

use super::memo::{Winner, WinnerExpr, WinnerInfo};
use super::optimizer::RuleId;
use super::rule_match::match_and_pick_expr;
use super::{CascadesOptimizer, ExprId, GroupId, Memo, RelNodeContext, SubGoalId};
use crate::nodes::{NodeType, PlanNode, PlanNodeOrGroup};
use crate::rules::{RuleCall, RuleMatcher};

/// The recursive driver of one optimization pass. Holds the step counter used for the
/// exploration budget.
pub struct TaskContext<'a, T: NodeType, M: Memo<T>> {
    optimizer: &'a mut CascadesOptimizer<T, M>,
    steps: usize,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum TaskDesc {
    OptimizeExpr(ExprId, SubGoalId, GroupId),
    OptimizeInput(ExprId, SubGoalId, GroupId),
}

impl<'a, T: NodeType, M: Memo<T>> TaskContext<'a, T, M> {
    pub fn new(optimizer: &'a mut CascadesOptimizer<T, M>) -> Self {
        Self {
            optimizer,
            steps: 0,
        }
    }

    pub fn fire_optimize(&mut self, group_id: GroupId, subgoal_id: SubGoalId) {
        self.optimize_group(group_id, subgoal_id);
    }

    fn optimize_group(&mut self, group_id: GroupId, subgoal_id: SubGoalId) {
        self.steps += 1;
        trace!(event = "task_begin", task = "optimize_group", group_id = %group_id, subgoal_id = %subgoal_id);

        if self.optimizer.is_group_explored(group_id, subgoal_id) {
            trace!(
                event = "task_finish",
                task = "optimize_group",
                group_id = %group_id,
                subgoal_id = %subgoal_id,
                outcome = "already explored, skipping",
            );
            return;
        }
        self.optimizer.mark_group_explored(group_id, subgoal_id);
        self.optimizer.mark_goal_in_flight(group_id, subgoal_id);

        let exprs = self.optimizer.get_all_exprs_in_group(group_id);
        // First, optimize all physical expressions
        for &expr_id in &exprs {
            let expr = self.optimizer.get_expr_memoed(expr_id);
            if !expr.typ.is_logical() {
                self.optimize_input(group_id, subgoal_id, expr_id);
            }
        }
        // Then, optimize all logical expressions
        for &expr_id in &exprs {
            let typ = self.optimizer.get_expr_memoed(expr_id).typ.clone();
            if typ.is_logical() {
                self.optimize_expr(group_id, subgoal_id, expr_id, false);
            }
        }

        self.optimizer.unmark_goal_in_flight(group_id, subgoal_id);
        trace!(event = "task_finish", task = "optimize_group", group_id = %group_id, subgoal_id = %subgoal_id);
    }

    fn optimize_expr(
        &mut self,
        group_id: GroupId,
        subgoal_id: SubGoalId,
        expr_id: ExprId,
        exploring: bool,
    ) {
        self.steps += 1;
        let desc = TaskDesc::OptimizeExpr(expr_id, subgoal_id, group_id);
        if self.optimizer.has_task_started(&desc) {
            trace!(event = "task_skip", task = "optimize_expr", expr_id = %expr_id, subgoal_id = %subgoal_id);
            return;
        }
        self.optimizer.mark_task_start(&desc);

        fn top_matches<T: NodeType>(matcher: &RuleMatcher<T>, match_typ: T) -> bool {
            match matcher {
                RuleMatcher::MatchNode { typ, .. } => typ == &match_typ,
                RuleMatcher::MatchDiscriminant {
                    typ_discriminant, ..
                } => std::mem::discriminant(&match_typ) == *typ_discriminant,
                _ => panic!("IR should have root node of match"),
            }
        }
        let expr = self.optimizer.get_expr_memoed(expr_id);
        assert!(expr.typ.is_logical());
        trace!(event = "task_begin", task = "optimize_expr", expr_id = %expr_id, subgoal_id = %subgoal_id, expr = %expr);
        for (rule_id, rule) in self.optimizer.rules().iter().enumerate() {
            if self.optimizer.is_rule_fired(expr_id, rule_id) {
                continue;
            }
            // Skip impl rules when exploring
            if exploring && rule.is_impl_rule() {
                continue;
            }
            // Skip transformation rules when budget is used
            if self.optimizer.ctx.budget_used && !rule.is_impl_rule() {
                continue;
            }
            if top_matches(rule.matcher(), expr.typ.clone()) {
                for &input_group_id in &expr.children {
                    let child_subgoal_id = self.optimizer.create_or_get_subgoal(
                        input_group_id,
                        self.optimizer
                            .memo()
                            .get_physical_property_builders()
                            .default_many()
                            .into(),
                    );
                    self.explore_group(input_group_id, child_subgoal_id);
                }
                self.apply_rule(group_id, subgoal_id, rule_id, expr_id, exploring);
            }
        }

        // A logical expression that is itself a property-enforcing operation can satisfy the
        // goal by searching its input directly with the adjusted requirement.
        let predicates = expr
            .predicates
            .iter()
            .map(|x| self.optimizer.get_pred(*x))
            .collect_vec();
        let goal = self.optimizer.memo().get_subgoal_goal(group_id, subgoal_id);
        for idx in 0..goal.len() {
            let Some(new_prop) = self.optimizer.memo().get_physical_property_builders().0[idx]
                .search_goal_any(expr.typ.clone(), &predicates, goal[idx].as_ref())
            else {
                continue;
            };
            let mut new_goal = goal.iter().map(|x| x.to_boxed()).collect_vec();
            new_goal[idx] = new_prop;
            assert_eq!(expr.children.len(), 1);
            let child_group_id = expr.children[0];
            let new_goal_id = self
                .optimizer
                .create_or_get_subgoal(child_group_id, new_goal.into());
            trace!(event = "new_goal", task = "optimize_expr", expr_id = %expr_id, subgoal_id = %subgoal_id, expr = %expr, child_group_id = %child_group_id, new_goal_id = %new_goal_id);
            self.optimize_group(child_group_id, new_goal_id);
            if let Some(winner) = self
                .optimizer
                .get_group_winner(child_group_id, new_goal_id)
                .as_full_winner()
            {
                let winner_info = WinnerInfo {
                    expr_id: WinnerExpr::Propagate {
                        group_id: child_group_id,
                        subgoal_id: new_goal_id,
                    },
                    ..winner.clone()
                };
                self.update_winner_if_better(group_id, subgoal_id, winner_info);
            }
        }
        self.optimizer.mark_task_end(&desc);
        trace!(event = "task_end", task = "optimize_expr", expr_id = %expr_id, subgoal_id = %subgoal_id, expr = %expr);
    }

    fn explore_group(&mut self, group_id: GroupId, subgoal_id: SubGoalId) {
        self.steps += 1;
        trace!(event = "task_begin", task = "explore_group", group_id = %group_id, subgoal_id = %subgoal_id);
        let exprs = self.optimizer.get_all_exprs_in_group(group_id);
        for expr in exprs {
            let typ = self.optimizer.get_expr_memoed(expr).typ.clone();
            if typ.is_logical() {
                self.optimize_expr(group_id, subgoal_id, expr, true);
            }
        }
        trace!(
            event = "task_finish",
            task = "explore_group",
            group_id = %group_id,
            subgoal_id = %subgoal_id,
            outcome = "expanded group"
        );
    }

    fn check_budget(&mut self) {
        if self.optimizer.ctx.budget_used {
            return;
        }
        let plan_space = self.optimizer.memo().estimated_plan_space();
        if let Some(partial_explore_space) = self.optimizer.prop.partial_explore_space {
            if plan_space > partial_explore_space {
                tracing::warn!(
                    event = "budget_used",
                    budget = "plan_space",
                    plan_space = %plan_space,
                    "plan space budget used, not applying logical rules any more"
                );
                self.optimizer.ctx.budget_used = true;
                if self.optimizer.prop.panic_on_budget {
                    panic!("plan space size budget used");
                }
            }
        }
        if let Some(partial_explore_iter) = self.optimizer.prop.partial_explore_iter {
            if self.steps > partial_explore_iter {
                tracing::warn!(
                    event = "budget_used",
                    budget = "iter",
                    steps = %self.steps,
                    "iteration budget used, not applying logical rules any more"
                );
                self.optimizer.ctx.budget_used = true;
                if self.optimizer.prop.panic_on_budget {
                    panic!("iteration budget used");
                }
            }
        }
    }

    fn apply_rule(
        &mut self,
        group_id: GroupId,
        subgoal_id: SubGoalId,
        rule_id: RuleId,
        expr_id: ExprId,
        exploring: bool,
    ) {
        self.steps += 1;
        trace!(event = "task_begin", task = "apply_rule", expr_id = %expr_id, subgoal_id = %subgoal_id, exploring = %exploring);
        if self.optimizer.is_rule_fired(expr_id, rule_id) {
            trace!(event = "task_end", task = "apply_rule", expr_id = %expr_id, subgoal_id = %subgoal_id, outcome = "rule already fired");
            return;
        }

        if self.optimizer.is_rule_disabled(rule_id) {
            trace!(event = "task_end", task = "apply_rule", expr_id = %expr_id, subgoal_id = %subgoal_id, outcome = "rule disabled");
            return;
        }

        self.optimizer.mark_rule_fired(expr_id, rule_id);

        let rule = self.optimizer.rules()[rule_id].clone();

        let binding_exprs = match_and_pick_expr(rule.matcher(), expr_id, self.optimizer);
        for binding in binding_exprs {
            self.check_budget();
            if self.optimizer.ctx.budget_used && !rule.is_impl_rule() {
                continue;
            }

            if !rule.matches(self.optimizer, &binding) {
                trace!(event = "rule_predicate_reject", task = "apply_rule", rule = %rule.name(), input_binding = %binding);
                continue;
            }

            trace!(event = "before_apply_rule", task = "apply_rule", rule = %rule.name(), input_binding = %binding);
            let mut call = RuleCall::new(self.optimizer, binding);
            rule.apply(&mut call);
            let proposals = call.into_proposals();
            self.optimizer.ctx.rules_applied += 1;

            for proposal in proposals {
                trace!(event = "after_apply_rule", task = "apply_rule", rule = %rule.name(), output_binding = %proposal);
                if !self
                    .optimizer
                    .memo()
                    .compatible_with_group(&proposal, group_id)
                {
                    // The proposal would change the row type of the group. The rule is
                    // malformed; reject the proposal instead of corrupting the group.
                    tracing::error!(
                        event = "rule_output_rejected",
                        task = "apply_rule",
                        rule = %rule.name(),
                        group_id = %group_id,
                        output_binding = %proposal,
                        "rule produced an expression with mismatched logical properties"
                    );
                    continue;
                }
                if let Some(new_expr_id) = self.optimizer.add_expr_to_group(proposal, group_id) {
                    let typ = self.optimizer.get_expr_memoed(new_expr_id).typ.clone();
                    if typ.is_logical() {
                        self.optimize_expr(group_id, subgoal_id, new_expr_id, exploring);
                    } else {
                        self.optimize_input(group_id, subgoal_id, new_expr_id);
                    }
                    trace!(event = "apply_rule", expr_id = %expr_id, rule_id = %rule_id, new_expr_id = %new_expr_id);
                } else {
                    trace!(event = "apply_rule", expr_id = %expr_id, rule_id = %rule_id, "triggered group merge");
                }
            }

            // Conversion requests made by the rule register search goals; optimize them now so
            // that the goals have winners by extraction time.
            let conversions = self.optimizer.take_pending_conversions();
            for (conv_group_id, conv_subgoal_id) in conversions {
                self.optimize_group(conv_group_id, conv_subgoal_id);
            }
        }
        trace!(event = "task_end", task = "apply_rule", expr_id = %expr_id, rule_id = %rule_id);
    }

    fn update_winner_if_better(
        &mut self,
        group_id: GroupId,
        subgoal_id: SubGoalId,
        proposed_winner: WinnerInfo,
    ) {
        let mut update_cost = false;
        let current_winner = self.optimizer.get_group_winner(group_id, subgoal_id);
        if let Some(winner) = current_winner.as_full_winner() {
            if winner.total_weighted_cost > proposed_winner.total_weighted_cost {
                update_cost = true;
            }
        } else {
            update_cost = true;
        }
        if update_cost {
            trace!(
                event = "update_winner",
                task = "optimize_inputs",
                subgoal_id = %subgoal_id,
                expr_id = ?proposed_winner.expr_id,
                total_weighted_cost = %proposed_winner.total_weighted_cost,
                operation_weighted_cost = %proposed_winner.operation_weighted_cost,
            );
            self.optimizer
                .update_group_winner(group_id, subgoal_id, Winner::Full(proposed_winner));
        }
    }

    fn optimize_input(&mut self, group_id: GroupId, subgoal_id: SubGoalId, expr_id: ExprId) {
        self.steps += 1;
        let desc = TaskDesc::OptimizeInput(expr_id, subgoal_id, group_id);
        if self.optimizer.has_task_started(&desc) {
            trace!(event = "task_skip", task = "optimize_input", subgoal_id = %subgoal_id, expr_id = %expr_id);
            return;
        }
        self.optimizer.mark_task_start(&desc);

        trace!(event = "task_begin", task = "optimize_inputs", subgoal_id = %subgoal_id, expr_id = %expr_id);

        let expr = self.optimizer.get_expr_memoed(expr_id);
        let cost = self.optimizer.cost();
        let builders = self
            .optimizer
            .memo()
            .get_physical_property_builders()
            .clone();

        let predicates = expr
            .predicates
            .iter()
            .map(|pred_id| self.optimizer.get_pred(*pred_id))
            .collect_vec();

        let goal = self.optimizer.memo().get_subgoal_goal(group_id, subgoal_id);

        if !builders.can_passthrough_any_many(expr.typ.clone(), &predicates, &goal) {
            // The expression cannot passthrough all required physical properties, so we relax
            // one requirement at a time and enforce it on top of the relaxed winner.
            for idx in 0..goal.len() {
                let builder = &builders.0[idx];
                let default_prop = builder.default_any();
                if builder.exactly_eq_any(goal[idx].as_ref(), default_prop.as_ref()) {
                    continue;
                }
                let mut new_goal = goal.iter().map(|x| x.to_boxed()).collect_vec();
                new_goal[idx] = default_prop;
                let new_goal_id = self
                    .optimizer
                    .create_or_get_subgoal(group_id, new_goal.into());
                self.optimize_input(group_id, new_goal_id, expr_id);
                if let Some(child_winner) = self
                    .optimizer
                    .get_group_winner(group_id, new_goal_id)
                    .as_full_winner()
                {
                    let child_winner = child_winner.clone();
                    let (e_typ, e_preds) = builder.enforce_any(goal[idx].as_ref());
                    let enforcer_node = Arc::new(PlanNode {
                        typ: e_typ.clone(),
                        predicates: e_preds.clone(),
                        children: vec![PlanNodeOrGroup::Group(group_id)],
                    });
                    // The enforcer expression gets its own group, which is not explored as
                    // part of the search.
                    let (_, enforcer_expr_id) = self.optimizer.add_new_expr(enforcer_node);
                    let operation_cost = cost.compute_operation_cost(
                        &e_typ,
                        &e_preds,
                        &[child_winner.total_cost.clone()],
                        RelNodeContext {
                            group_id,
                            expr_id: enforcer_expr_id,
                            children_group_ids: vec![group_id],
                        },
                    );
                    let total_cost =
                        cost.sum(&operation_cost, &[child_winner.total_cost.clone()]);
                    let derived_physical_properties = builders.derive_many(
                        e_typ,
                        &e_preds,
                        &[child_winner.derived_physical_properties.clone()],
                        1,
                    );
                    if !builders.satisfies_many(&derived_physical_properties, &goal) {
                        // The enforcer for this kind can destroy a property of another kind
                        // (a gather erases the sort order); such a candidate never satisfies
                        // the goal and must not become its winner.
                        trace!(
                            event = "enforcer_violates_goal",
                            task = "optimize_inputs",
                            subgoal_id = %subgoal_id,
                            expr_id = %expr_id,
                            enforced = %builder.property_name(),
                        );
                        continue;
                    }
                    let winner_info = WinnerInfo {
                        expr_id: WinnerExpr::Enforcer {
                            expr_id: enforcer_expr_id,
                            child_goal_id: new_goal_id,
                        },
                        total_weighted_cost: cost.weighted_cost(&total_cost),
                        operation_weighted_cost: cost.weighted_cost(&operation_cost),
                        total_cost,
                        operation_cost,
                        derived_physical_properties: derived_physical_properties.into(),
                    };
                    self.update_winner_if_better(group_id, subgoal_id, winner_info);
                }
            }
            self.optimizer.mark_task_end(&desc);
            return;
        }

        let child_group_passthrough_properties =
            builders.passthrough_many(expr.typ.clone(), &predicates, &goal, expr.children.len());

        let children_subgoal_ids = expr
            .children
            .iter()
            .zip(child_group_passthrough_properties)
            .map(|(child_group_id, required_props)| {
                self.optimizer
                    .create_or_get_subgoal(*child_group_id, required_props.into())
            })
            .collect_vec();

        for (input_group_idx, &child_group_id) in expr.children.iter().enumerate() {
            let child_subgoal_id = children_subgoal_ids[input_group_idx];
            if !self
                .optimizer
                .get_group_winner(child_group_id, child_subgoal_id)
                .has_full_winner()
            {
                self.optimize_group(child_group_id, child_subgoal_id);
                if !self
                    .optimizer
                    .get_group_winner(child_group_id, child_subgoal_id)
                    .has_full_winner()
                {
                    self.optimizer.mark_task_end(&desc);
                    trace!(event = "task_finish", task = "optimize_inputs", expr_id = %expr_id, result = "impossible");
                    return;
                }
            }
        }

        let mut children_costs = Vec::with_capacity(expr.children.len());
        let mut children_props = Vec::with_capacity(expr.children.len());
        for (input_group_idx, &child_group_id) in expr.children.iter().enumerate() {
            let winner = self
                .optimizer
                .get_group_winner(child_group_id, children_subgoal_ids[input_group_idx])
                .as_full_winner()
                .expect("full winner for all children")
                .clone();
            children_costs.push(winner.total_cost);
            children_props.push(winner.derived_physical_properties);
        }
        let operation_cost = cost.compute_operation_cost(
            &expr.typ,
            &predicates,
            &children_costs,
            RelNodeContext {
                group_id,
                expr_id,
                children_group_ids: expr.children.clone(),
            },
        );
        let total_cost = cost.sum(&operation_cost, &children_costs);
        let derived_physical_properties = builders.derive_many(
            expr.typ.clone(),
            &predicates,
            &children_props,
            expr.children.len(),
        );
        let proposed_winner = WinnerInfo {
            expr_id: WinnerExpr::Expr { expr_id },
            total_weighted_cost: cost.weighted_cost(&total_cost),
            operation_weighted_cost: cost.weighted_cost(&operation_cost),
            total_cost,
            operation_cost,
            derived_physical_properties: derived_physical_properties.into(),
        };
        self.update_winner_if_better(group_id, subgoal_id, proposed_winner);
        trace!(event = "task_finish", task = "optimize_inputs", subgoal_id = %subgoal_id, expr_id = %expr_id, result = "resolved");
        self.optimizer.mark_task_end(&desc);
    }
}
