// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! A relational plan representation on top of the relopt cascades core: operators, predicates,
//! schema/sort/distribution properties, the default rule set, and a simple cost model.

#![allow(clippy::new_without_default)]

pub mod cost;
pub mod plan_nodes;
pub mod properties;
pub mod rules;
pub mod testing;

use std::sync::Arc;

use anyhow::Result;
use cost::RelCostModel;
use plan_nodes::{ArcRelPlanNode, RelNodeType};
use properties::distribution::{DistributionProp, DistributionPropertyBuilder};
use properties::schema::{Catalog, SchemaPropertyBuilder};
use properties::sort::{SortProp, SortPropertyBuilder};
use relopt_core::cascades::{CascadesOptimizer, GroupId, OptimizerProperties};
use relopt_core::physical_property::{PhysicalProperty, PhysicalPropertyBuilderAny};
use relopt_core::rules::Rule;
use rules::{EliminateFilterRule, LimitRule, LimitSortRule, PhysicalConversionRule, SortRule};

pub type CascadesRelOptimizer = CascadesOptimizer<RelNodeType>;

/// The cascades optimizer wired up with the default rule set, the schema/sort/distribution
/// properties, and the fixed-weight cost model.
pub struct RelOptimizer {
    cascades_optimizer: CascadesRelOptimizer,
}

impl RelOptimizer {
    pub fn default_rules() -> Vec<Arc<dyn Rule<RelNodeType, CascadesRelOptimizer>>> {
        let mut rules = PhysicalConversionRule::all_conversions();
        rules.push(Arc::new(SortRule::new()));
        rules.push(Arc::new(LimitRule::new()));
        rules.push(Arc::new(LimitSortRule::new()));
        rules.push(Arc::new(EliminateFilterRule::new()));
        rules
    }

    pub fn new_physical(catalog: Arc<dyn Catalog>) -> Self {
        Self::new_physical_with_rules(Self::default_rules(), catalog)
    }

    pub fn new_physical_with_rules(
        rules: Vec<Arc<dyn Rule<RelNodeType, CascadesRelOptimizer>>>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        let cost_model = RelCostModel;
        Self {
            cascades_optimizer: CascadesOptimizer::new_with_options(
                rules,
                Box::new(cost_model),
                Arc::new([Box::new(SchemaPropertyBuilder::new(catalog))]),
                Arc::new([
                    Box::new(SortPropertyBuilder::new())
                        as Box<dyn PhysicalPropertyBuilderAny<RelNodeType>>,
                    Box::new(DistributionPropertyBuilder::new()),
                ]),
                OptimizerProperties {
                    partial_explore_iter: Some(1 << 20),
                    partial_explore_space: Some(1 << 10),
                    ..Default::default()
                },
            ),
        }
    }

    /// Optimize a logical plan into a physical one, requiring the result on a single node and
    /// in no particular order.
    pub fn optimize(&mut self, root_rel: ArcRelPlanNode) -> Result<ArcRelPlanNode> {
        self.optimize_with_required_props(
            root_rel,
            &[&SortProp::any_order(), &DistributionProp::Single],
        )
    }

    /// Optimize a logical plan so that the result satisfies `required_props`, given in the
    /// builder registration order: sort, then distribution.
    pub fn optimize_with_required_props(
        &mut self,
        root_rel: ArcRelPlanNode,
        required_props: &[&dyn PhysicalProperty],
    ) -> Result<ArcRelPlanNode> {
        self.cascades_optimizer.step_clear();
        let (group_id, subgoal_id) = self
            .cascades_optimizer
            .step_optimize_rel(root_rel, required_props)?;
        self.cascades_optimizer
            .step_get_optimize_rel(group_id, subgoal_id)
    }

    /// Re-optimize keeping the memo table, e.g., after enabling or disabling rules.
    pub fn optimize_keep_memo(&mut self, root_rel: ArcRelPlanNode) -> Result<ArcRelPlanNode> {
        self.cascades_optimizer.step_clear_winner();
        let (group_id, subgoal_id) = self.cascades_optimizer.step_optimize_rel(
            root_rel,
            &[&SortProp::any_order(), &DistributionProp::Single],
        )?;
        self.cascades_optimizer
            .step_get_optimize_rel(group_id, subgoal_id)
    }

    /// The row type of an optimized group.
    pub fn schema_of(&self, group_id: GroupId) -> properties::schema::Schema {
        self.cascades_optimizer
            .get_property_by_group::<SchemaPropertyBuilder>(group_id, 0)
    }

    pub fn dump(&self) -> String {
        let mut buf = String::new();
        self.cascades_optimizer.dump(&mut buf).unwrap();
        buf
    }

    pub fn cascades_optimizer(&self) -> &CascadesRelOptimizer {
        &self.cascades_optimizer
    }

    pub fn cascades_optimizer_mut(&mut self) -> &mut CascadesRelOptimizer {
        &mut self.cascades_optimizer
    }
}
