// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

mod ir;

pub use ir::RuleMatcher;

use crate::nodes::{ArcPlanNode, NodeType, PlanNodeOrGroup};
use crate::optimizer::Optimizer;
use crate::physical_property::PhysicalProperty;

/// The context a rule fires in. It carries the matched binding, gives the rule access to the
/// optimizer, and collects the replacements the rule proposes.
pub struct RuleCall<'a, T: NodeType, O: Optimizer<T>> {
    optimizer: &'a mut O,
    binding: ArcPlanNode<T>,
    proposals: Vec<PlanNodeOrGroup<T>>,
}

impl<'a, T: NodeType, O: Optimizer<T>> RuleCall<'a, T, O> {
    pub fn new(optimizer: &'a mut O, binding: ArcPlanNode<T>) -> Self {
        Self {
            optimizer,
            binding,
            proposals: Vec::new(),
        }
    }

    /// The plan node bound by the rule matcher. Children matched with `Any`/`AnyMany` are group
    /// references rather than materialized nodes.
    pub fn binding(&self) -> ArcPlanNode<T> {
        self.binding.clone()
    }

    pub fn optimizer(&self) -> &O {
        self.optimizer
    }

    /// Request a version of `input` satisfying `required_props`. See
    /// [`Optimizer::request_converted`]. Returns `None` when no conversion is available, in
    /// which case the rule should typically propose nothing.
    pub fn request_converted(
        &mut self,
        input: PlanNodeOrGroup<T>,
        required_props: &[&dyn PhysicalProperty],
    ) -> Option<PlanNodeOrGroup<T>> {
        self.optimizer.request_converted(input, required_props)
    }

    /// Propose a replacement equivalent to the binding. A rule may propose any number of
    /// replacements; proposing is additive and never removes existing expressions from the
    /// search space.
    pub fn propose(&mut self, node: impl Into<PlanNodeOrGroup<T>>) {
        self.proposals.push(node.into());
    }

    pub fn into_proposals(self) -> Vec<PlanNodeOrGroup<T>> {
        self.proposals
    }
}

pub trait Rule<T: NodeType, O: Optimizer<T>>: 'static + Send + Sync {
    /// The structural pattern the rule matches on.
    fn matcher(&self) -> &RuleMatcher<T>;

    /// The predicate stage, evaluated on each binding after the structural match succeeds. The
    /// rule fires only when this returns true; a false return leaves the search space untouched.
    fn matches(&self, optimizer: &O, binding: &ArcPlanNode<T>) -> bool {
        let _ = (optimizer, binding);
        true
    }

    /// The firing stage. Inspect the binding and register replacements through
    /// [`RuleCall::propose`].
    fn apply(&self, call: &mut RuleCall<'_, T, O>);

    fn name(&self) -> &'static str;

    /// Whether this is an implementation rule (producing physical expressions). Implementation
    /// rules keep firing after the exploration budget runs out so that a plan can always be
    /// produced.
    fn is_impl_rule(&self) -> bool {
        false
    }
}
