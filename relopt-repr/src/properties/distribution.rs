// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use itertools::Itertools;
use relopt_core::nodes::NodeType;
use relopt_core::physical_property::{PhysicalProperty, PhysicalPropertyBuilder};

use crate::plan_nodes::{ArcRelPredNode, ColumnRefPred, ListPred, RelNodeType, RelReprPredNode};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DistributionProp {
    /// Any distribution. Only meaningful as a requirement.
    Any,
    /// All rows on a single node.
    Single,
    /// Sharded by a hash of the key columns.
    HashShard(Vec<usize>),
}

impl std::fmt::Display for DistributionProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl PhysicalProperty for DistributionProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn to_boxed(&self) -> Box<dyn PhysicalProperty> {
        Box::new(self.clone())
    }
}

pub struct DistributionPropertyBuilder;

impl DistributionPropertyBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl PhysicalPropertyBuilder<RelNodeType> for DistributionPropertyBuilder {
    type Prop = DistributionProp;

    fn derive(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            RelNodeType::PhysicalScan => DistributionProp::Single,
            RelNodeType::PhysicalGather => DistributionProp::Single,
            RelNodeType::PhysicalHashShuffle => {
                let keys = ListPred::from_pred_node(predicates[0].clone()).unwrap();
                let columns = keys
                    .to_vec()
                    .iter()
                    .map(|x| ColumnRefPred::from_pred_node(x.clone()).unwrap().index())
                    .collect_vec();
                DistributionProp::HashShard(columns)
            }
            _ if typ.is_logical() => unreachable!("logical node should not be called"),
            _ if children.len() == 1 => children[0].clone(),
            other => unimplemented!("derive distribution prop for {other}"),
        }
    }

    fn passthrough(
        &self,
        typ: RelNodeType,
        _predicates: &[ArcRelPredNode],
        required: &Self::Prop,
    ) -> Vec<Self::Prop> {
        match typ {
            RelNodeType::PhysicalFilter => vec![required.clone()],
            // We do not know how a projection remaps columns, so a hash requirement cannot be
            // pushed through it.
            RelNodeType::PhysicalProjection => match required {
                DistributionProp::HashShard(_) => vec![DistributionProp::Any],
                x => vec![x.clone()],
            },
            RelNodeType::PhysicalScan => vec![],
            // Sorts and limits can only be done on a single node.
            RelNodeType::PhysicalSort
            | RelNodeType::PhysicalLimit
            | RelNodeType::PhysicalLimitSort => vec![DistributionProp::Single],
            RelNodeType::PhysicalGather | RelNodeType::PhysicalHashShuffle => {
                vec![DistributionProp::Any]
            }
            _ if typ.is_logical() => unreachable!("logical node should not be called"),
            other => unimplemented!("passthrough distribution prop for {other}"),
        }
    }

    fn satisfies(&self, prop: &DistributionProp, required: &DistributionProp) -> bool {
        match (prop, required) {
            (_, DistributionProp::Any) => true,
            (DistributionProp::Single, DistributionProp::Single) => true,
            (DistributionProp::HashShard(x), DistributionProp::HashShard(y)) => x == y,
            _ => false,
        }
    }

    fn default(&self) -> Self::Prop {
        DistributionProp::Any
    }

    fn enforce(&self, prop: &Self::Prop) -> (RelNodeType, Vec<ArcRelPredNode>) {
        match prop {
            DistributionProp::Single => (RelNodeType::PhysicalGather, Vec::new()),
            DistributionProp::HashShard(columns) => {
                let keys = ListPred::new(
                    columns
                        .iter()
                        .map(|col| ColumnRefPred::new(*col).into_pred_node())
                        .collect_vec(),
                )
                .into_pred_node();
                (RelNodeType::PhysicalHashShuffle, vec![keys])
            }
            DistributionProp::Any => unreachable!(),
        }
    }

    fn property_name(&self) -> &'static str {
        "distribution"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_lattice() {
        let builder = DistributionPropertyBuilder::new();
        let hashed = DistributionProp::HashShard(vec![0, 1]);
        assert!(builder.satisfies(&DistributionProp::Single, &DistributionProp::Any));
        assert!(builder.satisfies(&hashed, &DistributionProp::Any));
        assert!(builder.satisfies(&DistributionProp::Single, &DistributionProp::Single));
        assert!(!builder.satisfies(&hashed, &DistributionProp::Single));
        assert!(!builder.satisfies(&hashed, &DistributionProp::HashShard(vec![1, 0])));
        assert!(builder.satisfies(&hashed, &DistributionProp::HashShard(vec![0, 1])));
    }
}
