// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::mem;
use std::sync::Arc;

use relopt_core::nodes::{NodeType, PlanNode};
use relopt_core::optimizer::Optimizer;
use relopt_core::rules::{Rule, RuleCall, RuleMatcher};

use crate::plan_nodes::RelNodeType;

/// Implements a logical node as its physical counterpart, one-to-one. Operators that need more
/// than a type swap (the sort family) have their own rules.
pub struct PhysicalConversionRule {
    matcher: RuleMatcher<RelNodeType>,
}

impl PhysicalConversionRule {
    pub fn new(logical_typ: RelNodeType) -> Self {
        assert!(logical_typ.is_logical());
        Self {
            matcher: RuleMatcher::MatchDiscriminant {
                typ_discriminant: mem::discriminant(&logical_typ),
                children: vec![RuleMatcher::AnyMany],
            },
        }
    }

    pub fn all_conversions<O: Optimizer<RelNodeType>>() -> Vec<Arc<dyn Rule<RelNodeType, O>>> {
        vec![
            Arc::new(PhysicalConversionRule::new(RelNodeType::Scan)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::Filter)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::Projection)),
        ]
    }
}

impl<O: Optimizer<RelNodeType>> Rule<RelNodeType, O> for PhysicalConversionRule {
    fn matcher(&self) -> &RuleMatcher<RelNodeType> {
        &self.matcher
    }

    fn apply(&self, call: &mut RuleCall<'_, RelNodeType, O>) {
        let PlanNode {
            typ,
            children,
            predicates,
        } = Arc::unwrap_or_clone(call.binding());
        let physical_typ = match typ {
            RelNodeType::Scan => RelNodeType::PhysicalScan,
            RelNodeType::Filter => RelNodeType::PhysicalFilter,
            RelNodeType::Projection => RelNodeType::PhysicalProjection,
            _ => return,
        };
        call.propose(PlanNode {
            typ: physical_typ,
            children,
            predicates,
        });
    }

    fn name(&self) -> &'static str {
        "physical_conversion"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}
