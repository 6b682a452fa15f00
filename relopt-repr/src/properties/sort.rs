// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use relopt_core::nodes::NodeType;
use relopt_core::physical_property::{PhysicalProperty, PhysicalPropertyBuilder};
use tracing::trace;

use crate::plan_nodes::{
    ArcRelPredNode, BoundPred, ColumnRefPred, ListPred, RelNodeType, RelReprPredNode,
    SortOrderPred, SortOrderType,
};

pub struct SortPropertyBuilder;

impl SortPropertyBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SortPropType {
    AnySorted, // Only used as required prop, Asc/Desc all satisfies this
    Asc,
    Desc,
}

/// A sort order over column indexes. The empty order is the weakest property and doubles as
/// "no requirement".
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortProp(pub Vec<(SortPropType, usize)>);

impl std::fmt::Display for SortProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<any>");
        }
        write!(f, "[")?;
        for (idx, (order, col)) in self.0.iter().enumerate() {
            if idx != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}#{}", order, col)?;
        }
        write!(f, "]")
    }
}

impl PhysicalProperty for SortProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn to_boxed(&self) -> Box<dyn PhysicalProperty> {
        Box::new(self.clone())
    }
}

impl SortProp {
    pub fn any_order() -> Self {
        SortProp(vec![])
    }

    pub fn asc(column_idx: usize) -> Self {
        SortProp(vec![(SortPropType::Asc, column_idx)])
    }

    pub fn satisfies(prop: &SortProp, required: &SortProp) -> bool {
        // required should be a prefix of the current property
        for i in 0..required.0.len() {
            if i >= prop.0.len() {
                return false;
            }
            if prop.0[i].1 != required.0[i].1 {
                return false;
            }
            match (prop.0[i].0, required.0[i].0) {
                (SortPropType::AnySorted, SortPropType::AnySorted)
                | (SortPropType::Asc, SortPropType::Asc)
                | (SortPropType::Desc, SortPropType::Desc)
                | (SortPropType::Asc, SortPropType::AnySorted)
                | (SortPropType::Desc, SortPropType::AnySorted) => {}
                (SortPropType::Asc, SortPropType::Desc)
                | (SortPropType::Desc, SortPropType::Asc)
                | (SortPropType::AnySorted, SortPropType::Asc)
                | (SortPropType::AnySorted, SortPropType::Desc) => return false,
            }
        }
        true
    }

    pub fn from_sort_order_predicates(preds: ListPred) -> Option<Self> {
        let mut columns = Vec::new();
        for pred in preds.to_vec() {
            let order = SortOrderPred::from_pred_node(pred).unwrap();
            // TODO: return None in case we sort by an expression
            let col_ref = ColumnRefPred::from_pred_node(order.child()).unwrap();
            let order = match order.order() {
                SortOrderType::Asc => SortPropType::Asc,
                SortOrderType::Desc => SortPropType::Desc,
            };
            columns.push((order, col_ref.index()));
        }
        Some(SortProp(columns))
    }
}

impl PhysicalPropertyBuilder<RelNodeType> for SortPropertyBuilder {
    type Prop = SortProp;

    fn derive(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            RelNodeType::PhysicalSort | RelNodeType::PhysicalLimitSort => {
                match SortProp::from_sort_order_predicates(
                    ListPred::from_pred_node(predicates[0].clone()).unwrap(),
                ) {
                    Some(prop) => prop,
                    None => SortProp::any_order(),
                }
            }
            RelNodeType::PhysicalFilter | RelNodeType::PhysicalLimit => children[0].clone(),
            RelNodeType::PhysicalScan => SortProp::any_order(),
            RelNodeType::PhysicalProjection => SortProp::any_order(),
            // Gather interleaves shards and destroys the order; a hash shuffle moves whole rows
            // and keeps the per-shard order.
            RelNodeType::PhysicalGather => SortProp::any_order(),
            RelNodeType::PhysicalHashShuffle => children[0].clone(),
            _ if typ.is_logical() => unreachable!("logical node should not be called"),
            _ => SortProp::any_order(),
        }
    }

    fn passthrough(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        required: &Self::Prop,
    ) -> Vec<Self::Prop> {
        match typ {
            RelNodeType::PhysicalFilter => vec![required.clone()],
            RelNodeType::PhysicalProjection => vec![SortProp::any_order()],
            RelNodeType::PhysicalScan => vec![],
            RelNodeType::PhysicalSort => {
                let this_prop = SortProp::from_sort_order_predicates(
                    ListPred::from_pred_node(predicates[0].clone()).unwrap(),
                );
                match this_prop {
                    Some(this_prop) if self.satisfies(required, &this_prop) => {
                        vec![this_prop]
                    }
                    _ => vec![SortProp::any_order()],
                }
            }
            // Requiring a sorted input below a limit would change which rows survive the limit,
            // so a limit never passes an order requirement down.
            RelNodeType::PhysicalLimit | RelNodeType::PhysicalLimitSort => {
                vec![SortProp::any_order()]
            }
            RelNodeType::PhysicalGather | RelNodeType::PhysicalHashShuffle => {
                vec![SortProp::any_order()]
            }
            _ if typ.is_logical() => unreachable!("logical node should not be called"),
            node => unimplemented!("passthrough for {:?}", node),
        }
    }

    fn satisfies(&self, prop: &SortProp, required: &SortProp) -> bool {
        SortProp::satisfies(prop, required)
    }

    fn default(&self) -> Self::Prop {
        SortProp::any_order()
    }

    fn search_goal(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        required: &Self::Prop,
    ) -> Option<Self::Prop> {
        match typ {
            RelNodeType::Sort => {
                // A sort with a row window is more than a property enforcer; it must be
                // implemented by a rule instead.
                let offset = BoundPred::from_pred_node(predicates[1].clone()).unwrap();
                let fetch = BoundPred::from_pred_node(predicates[2].clone()).unwrap();
                if offset.is_specified() || fetch.is_specified() {
                    trace!(
                        event = "search_goal_rejected",
                        required = %required,
                        "sort with a row window cannot satisfy the goal through its input"
                    );
                    return None;
                }
                let prop = SortProp::from_sort_order_predicates(
                    ListPred::from_pred_node(predicates[0].clone()).unwrap(),
                );
                match prop {
                    Some(prop) if SortProp::satisfies(&prop, required) => Some(prop),
                    Some(prop) if SortProp::satisfies(required, &prop) => Some(required.clone()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn enforce(&self, prop: &Self::Prop) -> (RelNodeType, Vec<ArcRelPredNode>) {
        let mut predicates = Vec::new();
        for (order, col_idx) in &prop.0 {
            let order = match order {
                SortPropType::Asc => SortOrderType::Asc,
                SortPropType::Desc => SortOrderType::Desc,
                SortPropType::AnySorted => SortOrderType::Asc,
            };
            predicates.push(
                SortOrderPred::new(order, ColumnRefPred::new(*col_idx).into_pred_node())
                    .into_pred_node(),
            );
        }
        (
            RelNodeType::PhysicalSort,
            vec![ListPred::new(predicates).into_pred_node()],
        )
    }

    fn property_name(&self) -> &'static str {
        "sort"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_satisfies() {
        let ab = SortProp(vec![(SortPropType::Asc, 0), (SortPropType::Asc, 1)]);
        let a = SortProp(vec![(SortPropType::Asc, 0)]);
        assert!(SortProp::satisfies(&ab, &a));
        assert!(!SortProp::satisfies(&a, &ab));
        assert!(SortProp::satisfies(&a, &SortProp::any_order()));
        assert!(!SortProp::satisfies(&SortProp::any_order(), &a));
    }

    #[test]
    fn any_sorted_lattice() {
        let asc = SortProp(vec![(SortPropType::Asc, 0)]);
        let desc = SortProp(vec![(SortPropType::Desc, 0)]);
        let any_sorted = SortProp(vec![(SortPropType::AnySorted, 0)]);
        assert!(SortProp::satisfies(&asc, &any_sorted));
        assert!(SortProp::satisfies(&desc, &any_sorted));
        assert!(!SortProp::satisfies(&any_sorted, &asc));
        assert!(!SortProp::satisfies(&asc, &desc));
    }

    #[test]
    fn sort_with_window_is_not_a_search_goal() {
        let builder = SortPropertyBuilder::new();
        let collation = ListPred::new(vec![SortOrderPred::new(
            SortOrderType::Asc,
            ColumnRefPred::new(0).into_pred_node(),
        )
        .into_pred_node()])
        .into_pred_node();
        let unbounded = vec![
            collation.clone(),
            BoundPred::unspecified().into_pred_node(),
            BoundPred::unspecified().into_pred_node(),
        ];
        let bounded = vec![
            collation,
            BoundPred::new(Some(5)).into_pred_node(),
            BoundPred::unspecified().into_pred_node(),
        ];
        let required = SortProp::asc(0);
        assert_eq!(
            builder.search_goal(RelNodeType::Sort, &unbounded, &required),
            Some(SortProp::asc(0))
        );
        assert_eq!(
            builder.search_goal(RelNodeType::Sort, &bounded, &required),
            None
        );
    }
}
