// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use anyhow::Result;

use crate::logical_property::LogicalPropertyBuilder;
use crate::nodes::{ArcPlanNode, NodeType, PlanNodeOrGroup};
use crate::physical_property::PhysicalProperty;

/// The interface rules use to talk to the optimizer driving them.
pub trait Optimizer<T: NodeType> {
    /// Optimize a plan with the weakest requirement on every physical property.
    fn optimize(&mut self, root_rel: ArcPlanNode<T>) -> Result<ArcPlanNode<T>>;

    /// Optimize a plan so that the produced plan satisfies the required physical properties,
    /// in the same order as the registered property builders.
    fn optimize_with_required_props(
        &mut self,
        root_rel: ArcPlanNode<T>,
        required_props: &[&dyn PhysicalProperty],
    ) -> Result<ArcPlanNode<T>>;

    /// Request a version of `input` that satisfies `required_props`. The request registers a
    /// search goal and is idempotent: requesting the same input with the same properties twice
    /// resolves to the same goal. Returns `None` if no conversion is available, e.g., when the
    /// request would cycle back into the goal currently being produced.
    fn request_converted(
        &mut self,
        input: PlanNodeOrGroup<T>,
        required_props: &[&dyn PhysicalProperty],
    ) -> Option<PlanNodeOrGroup<T>>;

    /// Get the `idx`-th logical property of a node, where `idx` follows the order of the
    /// registered logical property builders.
    fn get_logical_property<P: LogicalPropertyBuilder<T>>(
        &self,
        root_rel: PlanNodeOrGroup<T>,
        idx: usize,
    ) -> P::Prop;
}
