// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use itertools::Itertools;
use relopt_core::logical_property::{LogicalProperty, LogicalPropertyBuilder};

use crate::plan_nodes::{
    ArcRelPredNode, ColumnRefPred, ConstantPred, ConstantType, ListPred, RelNodeType, RelPredType,
    RelReprPredNode,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub typ: ConstantType,
    pub nullable: bool,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.typ)
    }
}

impl Field {
    /// A placeholder for projected expressions we cannot name, e.g., constants.
    pub fn placeholder(typ: ConstantType) -> Self {
        Self {
            name: "unnamed".to_string(),
            typ,
            nullable: true,
        }
    }
}

/// The row type of a group. Every expression added to a group must derive the same schema as
/// the group, otherwise the optimizer rejects it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.fields.iter().map(|x| x.to_string()).join(", "))
    }
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl LogicalProperty for Schema {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Resolves table names to schemas.
pub trait Catalog: Send + Sync + 'static {
    fn get(&self, name: &str) -> Schema;
}

pub struct SchemaPropertyBuilder {
    catalog: Arc<dyn Catalog>,
}

impl SchemaPropertyBuilder {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    fn derive_for_projection(child: &Schema, exprs: ListPred) -> Schema {
        let fields = exprs
            .to_vec()
            .into_iter()
            .map(|expr| match &expr.typ {
                RelPredType::ColumnRef => {
                    let idx = ColumnRefPred::from_pred_node(expr).unwrap().index();
                    child.fields[idx].clone()
                }
                RelPredType::Constant(_) => {
                    let constant = ConstantPred::from_pred_node(expr).unwrap();
                    Field::placeholder(constant.constant_type())
                }
                other => unimplemented!("projection of {other}"),
            })
            .collect();
        Schema::new(fields)
    }
}

impl LogicalPropertyBuilder<RelNodeType> for SchemaPropertyBuilder {
    type Prop = Schema;

    fn derive(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            RelNodeType::Scan | RelNodeType::PhysicalScan => {
                let table = ConstantPred::from_pred_node(predicates[0].clone())
                    .unwrap()
                    .value()
                    .as_str();
                self.catalog.get(&table)
            }
            RelNodeType::Projection | RelNodeType::PhysicalProjection => {
                Self::derive_for_projection(
                    children[0],
                    ListPred::from_pred_node(predicates[0].clone()).unwrap(),
                )
            }
            RelNodeType::Filter
            | RelNodeType::Sort
            | RelNodeType::PhysicalFilter
            | RelNodeType::PhysicalSort
            | RelNodeType::PhysicalLimit
            | RelNodeType::PhysicalLimitSort
            | RelNodeType::PhysicalGather
            | RelNodeType::PhysicalHashShuffle => children[0].clone(),
        }
    }

    fn property_name(&self) -> &'static str {
        "schema"
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::plan_nodes::{RelReprPredNode, Value};
    use crate::testing::MemCatalog;

    fn t1_schema() -> Schema {
        Schema::new(vec![
            Field {
                name: "a".to_string(),
                typ: ConstantType::Int64,
                nullable: false,
            },
            Field {
                name: "b".to_string(),
                typ: ConstantType::Utf8String,
                nullable: true,
            },
        ])
    }

    #[test]
    fn derive_scan_schema() {
        let mut catalog = MemCatalog::default();
        catalog.insert("t1", t1_schema());
        let builder = SchemaPropertyBuilder::new(Arc::new(catalog));
        let schema = builder.derive(
            RelNodeType::Scan,
            &[ConstantPred::string("t1").into_pred_node()],
            &[],
        );
        assert_eq!(schema, t1_schema());
    }

    #[test]
    fn derive_projection_schema() {
        let mut catalog = MemCatalog::default();
        catalog.insert("t1", t1_schema());
        let builder = SchemaPropertyBuilder::new(Arc::new(catalog));
        let child = t1_schema();
        let schema = builder.derive(
            RelNodeType::Projection,
            &[ListPred::new(vec![
                ColumnRefPred::new(1).into_pred_node(),
                ConstantPred::new(Value::Int64(42)).into_pred_node(),
            ])
            .into_pred_node()],
            &[&child],
        );
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.fields[0], t1_schema().fields[1]);
        assert_eq!(schema.fields[1].typ, ConstantType::Int64);
    }
}
