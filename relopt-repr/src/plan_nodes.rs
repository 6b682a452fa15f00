// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The relational plan representation: a closed set of logical and physical operators, typed
//! wrappers over the generic plan nodes, and the predicate (scalar expression) vocabulary.

mod filter;
mod gather;
mod limit;
pub(crate) mod macros;
mod predicates;
mod projection;
mod scan;
mod sort;

pub use filter::{LogicalFilter, PhysicalFilter};
pub use gather::{PhysicalGather, PhysicalHashShuffle};
pub use limit::{PhysicalLimit, PhysicalLimitSort};
pub use predicates::{
    BoundPred, ColumnRefPred, ConstantPred, ConstantType, ListPred, SortOrderPred, SortOrderType,
};
pub use pretty_xmlish::{Pretty, PrettyConfig};
pub use projection::{LogicalProjection, PhysicalProjection};
use relopt_core::nodes::NodeType;
pub use relopt_core::nodes::{ArcPlanNode, ArcPredNode, PlanNode, PlanNodeOrGroup, PredNode, Value};
pub use scan::{LogicalScan, PhysicalScan};
pub use sort::{LogicalSort, PhysicalSort};

/// All supported operators.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelNodeType {
    // Logical plan nodes.
    Scan,
    Filter,
    Projection,
    /// A sort with an optional row window: collation, offset, and fetch in one operator. A pure
    /// limit is a sort with an empty collation.
    Sort,
    // Physical plan nodes.
    PhysicalScan,
    PhysicalFilter,
    PhysicalProjection,
    PhysicalSort,
    PhysicalLimit,
    /// A fused top-k operator covering collation, offset, and fetch at once.
    PhysicalLimitSort,
    PhysicalGather,
    PhysicalHashShuffle,
}

impl std::fmt::Display for RelNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl NodeType for RelNodeType {
    type PredType = RelPredType;

    fn is_logical(&self) -> bool {
        matches!(
            self,
            Self::Scan | Self::Filter | Self::Projection | Self::Sort
        )
    }
}

/// All supported predicate (scalar expression) kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelPredType {
    List,
    ColumnRef,
    SortOrder(SortOrderType),
    Constant(ConstantType),
    /// An optional row bound (offset or fetch). `data == None` means unspecified.
    Bound,
}

impl std::fmt::Display for RelPredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type RelPlanNode = PlanNode<RelNodeType>;
pub type ArcRelPlanNode = ArcPlanNode<RelNodeType>;
pub type RelPredNode = PredNode<RelNodeType>;
pub type ArcRelPredNode = ArcPredNode<RelNodeType>;

/// A typed wrapper around a plan node, e.g., [`LogicalSort`].
pub trait RelReprPlanNode: 'static + Clone {
    fn into_plan_node(self) -> ArcRelPlanNode;

    fn from_plan_node(plan_node: ArcRelPlanNode) -> Option<Self>
    where
        Self: Sized;

    fn explain(&self) -> Pretty<'static>;
}

/// A typed wrapper around a predicate node, e.g., [`ColumnRefPred`].
pub trait RelReprPredNode: 'static + Clone {
    fn into_pred_node(self) -> ArcRelPredNode;

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self>
    where
        Self: Sized;

    fn explain(&self) -> Pretty<'static>;
}

// An untyped predicate is its own wrapper. This lets operators carry arbitrary scalar
// expressions (e.g., a filter condition) without committing to a concrete predicate kind.
impl RelReprPredNode for ArcRelPredNode {
    fn into_pred_node(self) -> ArcRelPredNode {
        self
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        Some(pred_node)
    }

    fn explain(&self) -> Pretty<'static> {
        dispatch_pred_explain(self.clone())
    }
}

pub fn dispatch_explain(plan_node: ArcRelPlanNode) -> Pretty<'static> {
    match plan_node.typ {
        RelNodeType::Scan => LogicalScan::from_plan_node(plan_node).unwrap().explain(),
        RelNodeType::Filter => LogicalFilter::from_plan_node(plan_node).unwrap().explain(),
        RelNodeType::Projection => LogicalProjection::from_plan_node(plan_node)
            .unwrap()
            .explain(),
        RelNodeType::Sort => LogicalSort::from_plan_node(plan_node).unwrap().explain(),
        RelNodeType::PhysicalScan => PhysicalScan::from_plan_node(plan_node).unwrap().explain(),
        RelNodeType::PhysicalFilter => PhysicalFilter::from_plan_node(plan_node)
            .unwrap()
            .explain(),
        RelNodeType::PhysicalProjection => PhysicalProjection::from_plan_node(plan_node)
            .unwrap()
            .explain(),
        RelNodeType::PhysicalSort => PhysicalSort::from_plan_node(plan_node).unwrap().explain(),
        RelNodeType::PhysicalLimit => PhysicalLimit::from_plan_node(plan_node).unwrap().explain(),
        RelNodeType::PhysicalLimitSort => PhysicalLimitSort::from_plan_node(plan_node)
            .unwrap()
            .explain(),
        RelNodeType::PhysicalGather => PhysicalGather::from_plan_node(plan_node)
            .unwrap()
            .explain(),
        RelNodeType::PhysicalHashShuffle => PhysicalHashShuffle::from_plan_node(plan_node)
            .unwrap()
            .explain(),
    }
}

pub fn dispatch_pred_explain(pred_node: ArcRelPredNode) -> Pretty<'static> {
    match &pred_node.typ {
        RelPredType::List => ListPred::from_pred_node(pred_node).unwrap().explain(),
        RelPredType::ColumnRef => ColumnRefPred::from_pred_node(pred_node).unwrap().explain(),
        RelPredType::SortOrder(_) => SortOrderPred::from_pred_node(pred_node).unwrap().explain(),
        RelPredType::Constant(_) => ConstantPred::from_pred_node(pred_node).unwrap().explain(),
        RelPredType::Bound => BoundPred::from_pred_node(pred_node).unwrap().explain(),
    }
}

pub fn explain_plan_node(plan_node: ArcRelPlanNode) -> String {
    let mut config = PrettyConfig {
        need_boundaries: false,
        reduced_spaces: false,
        width: 300,
        ..Default::default()
    };
    let mut out = String::new();
    config.unicode(&mut out, &dispatch_explain(plan_node));
    out
}
