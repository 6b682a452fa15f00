// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use itertools::Itertools;

use crate::{
    cascades::{GroupId, RelNodeContext},
    cost::{Cost, CostModel},
    logical_property::{LogicalProperty, LogicalPropertyBuilder},
    nodes::{ArcPlanNode, ArcPredNode, NodeType, PlanNode, PlanNodeOrGroup, PredNode, Value},
    physical_property::{PhysicalProperty, PhysicalPropertyBuilder},
};

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TestNodeType {
    Join,
    Project,
    Scan,
    Filter,
    PhysicalNestedLoopJoin,
    PhysicalProject,
    PhysicalFilter,
    PhysicalScan,
    PhysicalSortedScan,
    PhysicalSort,
    PhysicalGather,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TestPredType {
    List,
    Expr,
    TableName,
    ColumnRef,
}

impl std::fmt::Display for TestNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::fmt::Display for TestPredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl NodeType for TestNodeType {
    type PredType = TestPredType;

    fn is_logical(&self) -> bool {
        matches!(self, Self::Project | Self::Scan | Self::Join | Self::Filter)
    }
}

pub(crate) fn join(
    left: impl Into<PlanNodeOrGroup<TestNodeType>>,
    right: impl Into<PlanNodeOrGroup<TestNodeType>>,
    cond: ArcPredNode<TestNodeType>,
) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::Join,
        children: vec![left.into(), right.into()],
        predicates: vec![cond],
    })
}

pub(crate) fn scan(table: &str) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::Scan,
        children: vec![],
        predicates: vec![table_name(table)],
    })
}

pub(crate) fn table_name(table: &str) -> ArcPredNode<TestNodeType> {
    Arc::new(PredNode {
        typ: TestPredType::TableName,
        children: vec![],
        data: Some(Value::String(table.to_string().into())),
    })
}

pub(crate) fn project(
    input: impl Into<PlanNodeOrGroup<TestNodeType>>,
    expr_list: ArcPredNode<TestNodeType>,
) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::Project,
        children: vec![input.into()],
        predicates: vec![expr_list],
    })
}

pub(crate) fn filter(
    input: impl Into<PlanNodeOrGroup<TestNodeType>>,
    cond: ArcPredNode<TestNodeType>,
) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::Filter,
        children: vec![input.into()],
        predicates: vec![cond],
    })
}

#[allow(dead_code)]
pub(crate) fn physical_nested_loop_join(
    left: impl Into<PlanNodeOrGroup<TestNodeType>>,
    right: impl Into<PlanNodeOrGroup<TestNodeType>>,
    cond: ArcPredNode<TestNodeType>,
) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::PhysicalNestedLoopJoin,
        children: vec![left.into(), right.into()],
        predicates: vec![cond],
    })
}

pub(crate) fn physical_filter(
    input: impl Into<PlanNodeOrGroup<TestNodeType>>,
    cond: ArcPredNode<TestNodeType>,
) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::PhysicalFilter,
        children: vec![input.into()],
        predicates: vec![cond],
    })
}

pub(crate) fn physical_scan(table: &str) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::PhysicalScan,
        children: vec![],
        predicates: vec![table_name(table)],
    })
}

pub(crate) fn physical_sort(
    input: impl Into<PlanNodeOrGroup<TestNodeType>>,
    sort_expr: ArcPredNode<TestNodeType>,
) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::PhysicalSort,
        children: vec![input.into()],
        predicates: vec![sort_expr],
    })
}

/// A scan that reads an index already ordered on `sort_expr`, staying sharded.
pub(crate) fn physical_sorted_scan(
    table: &str,
    sort_expr: ArcPredNode<TestNodeType>,
) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::PhysicalSortedScan,
        children: vec![],
        predicates: vec![table_name(table), sort_expr],
    })
}

pub(crate) fn physical_gather(
    input: impl Into<PlanNodeOrGroup<TestNodeType>>,
) -> ArcPlanNode<TestNodeType> {
    Arc::new(PlanNode {
        typ: TestNodeType::PhysicalGather,
        children: vec![input.into()],
        predicates: vec![],
    })
}

pub(crate) fn list(items: Vec<ArcPredNode<TestNodeType>>) -> ArcPredNode<TestNodeType> {
    Arc::new(PredNode {
        typ: TestPredType::List,
        children: items,
        data: None,
    })
}

pub(crate) fn expr(data: Value) -> ArcPredNode<TestNodeType> {
    Arc::new(PredNode {
        typ: TestPredType::Expr,
        children: vec![],
        data: Some(data),
    })
}

pub(crate) fn column_ref(col: &str) -> ArcPredNode<TestNodeType> {
    Arc::new(PredNode {
        typ: TestPredType::ColumnRef,
        children: vec![],
        data: Some(Value::String(col.to_string().into())),
    })
}

pub(crate) fn group(group_id: GroupId) -> PlanNodeOrGroup<TestNodeType> {
    PlanNodeOrGroup::Group(group_id)
}

pub struct RowCountPropertyBuilder;

/// An estimated row count, standing in for the row type of a group. Two equivalent expressions
/// must derive the same row count.
#[derive(Clone, Debug, PartialEq)]
pub struct RowCountProp(pub usize);

impl std::fmt::Display for RowCountProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LogicalProperty for RowCountProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl LogicalPropertyBuilder<TestNodeType> for RowCountPropertyBuilder {
    type Prop = RowCountProp;

    fn derive(
        &self,
        typ: TestNodeType,
        _predicates: &[ArcPredNode<TestNodeType>],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            TestNodeType::Scan
            | TestNodeType::PhysicalScan
            | TestNodeType::PhysicalSortedScan => RowCountProp(1000),
            TestNodeType::Join | TestNodeType::PhysicalNestedLoopJoin => {
                RowCountProp(children[0].0 * children[1].0)
            }
            _ => children[0].clone(),
        }
    }

    fn property_name(&self) -> &'static str {
        "row_count"
    }
}

pub struct SortPropertyBuilder;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortProp(pub Vec<String>);

impl std::fmt::Display for SortProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
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

impl PhysicalPropertyBuilder<TestNodeType> for SortPropertyBuilder {
    type Prop = SortProp;

    fn derive(
        &self,
        typ: TestNodeType,
        predicates: &[ArcPredNode<TestNodeType>],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            TestNodeType::PhysicalScan => SortProp(vec![]),
            TestNodeType::PhysicalNestedLoopJoin => children[0].clone(),
            TestNodeType::PhysicalProject => children[0].clone(),
            TestNodeType::PhysicalFilter => children[0].clone(),
            // gathering shards interleaves rows, losing the order
            TestNodeType::PhysicalGather => SortProp(vec![]),
            // assume the sort is not stable, the derived property is simply the sort keys
            TestNodeType::PhysicalSort | TestNodeType::PhysicalSortedScan => {
                let columns = predicates
                    .last()
                    .unwrap()
                    .children
                    .iter()
                    .map(|x| {
                        assert_eq!(x.typ, TestPredType::ColumnRef);
                        x.unwrap_data().as_str().to_string()
                    })
                    .collect_vec();
                SortProp(columns)
            }
            _ => panic!("unsupported type"),
        }
    }

    fn passthrough(
        &self,
        typ: TestNodeType,
        _predicates: &[ArcPredNode<TestNodeType>],
        required: &Self::Prop,
    ) -> Vec<Self::Prop> {
        match typ {
            TestNodeType::PhysicalScan | TestNodeType::PhysicalSortedScan => vec![],
            // a sort node provides the order itself, its input is unconstrained
            TestNodeType::PhysicalSort => vec![SortProp(vec![])],
            TestNodeType::PhysicalGather => vec![SortProp(vec![])],
            TestNodeType::PhysicalNestedLoopJoin => vec![required.clone(), SortProp(vec![])],
            TestNodeType::PhysicalProject => vec![required.clone()],
            TestNodeType::PhysicalFilter => vec![required.clone()],
            _ => panic!("unsupported type"),
        }
    }

    fn satisfies(&self, prop: &SortProp, required: &SortProp) -> bool {
        // required should be a prefix of the provided property
        for i in 0..required.0.len() {
            if i >= prop.0.len() || prop.0[i] != required.0[i] {
                return false;
            }
        }
        true
    }

    fn default(&self) -> Self::Prop {
        SortProp(vec![])
    }

    fn enforce(&self, prop: &Self::Prop) -> (TestNodeType, Vec<ArcPredNode<TestNodeType>>) {
        let mut predicates = Vec::new();
        for column in &prop.0 {
            predicates.push(column_ref(column));
        }
        (TestNodeType::PhysicalSort, vec![list(predicates)])
    }

    fn property_name(&self) -> &'static str {
        "sort"
    }
}

pub struct DistributionPropertyBuilder;

/// Where the rows of a plan live: spread over shards (`Any`) or gathered on one node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DistProp {
    Any,
    Single,
}

impl std::fmt::Display for DistProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Single => write!(f, "single"),
        }
    }
}

impl PhysicalProperty for DistProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn to_boxed(&self) -> Box<dyn PhysicalProperty> {
        Box::new(self.clone())
    }
}

impl PhysicalPropertyBuilder<TestNodeType> for DistributionPropertyBuilder {
    type Prop = DistProp;

    fn derive(
        &self,
        typ: TestNodeType,
        _predicates: &[ArcPredNode<TestNodeType>],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            TestNodeType::PhysicalScan | TestNodeType::PhysicalSortedScan => DistProp::Any,
            TestNodeType::PhysicalGather => DistProp::Single,
            _ => children[0].clone(),
        }
    }

    fn passthrough(
        &self,
        typ: TestNodeType,
        _predicates: &[ArcPredNode<TestNodeType>],
        required: &Self::Prop,
    ) -> Vec<Self::Prop> {
        match typ {
            TestNodeType::PhysicalScan | TestNodeType::PhysicalSortedScan => vec![],
            TestNodeType::PhysicalGather => vec![DistProp::Any],
            TestNodeType::PhysicalSort
            | TestNodeType::PhysicalProject
            | TestNodeType::PhysicalFilter => vec![required.clone()],
            _ => panic!("unsupported type"),
        }
    }

    fn satisfies(&self, prop: &Self::Prop, required: &Self::Prop) -> bool {
        match (prop, required) {
            (_, DistProp::Any) => true,
            (DistProp::Single, DistProp::Single) => true,
            _ => false,
        }
    }

    fn default(&self) -> Self::Prop {
        DistProp::Any
    }

    fn enforce(&self, _required: &Self::Prop) -> (TestNodeType, Vec<ArcPredNode<TestNodeType>>) {
        (TestNodeType::PhysicalGather, vec![])
    }

    fn property_name(&self) -> &'static str {
        "distribution"
    }
}

/// Charges a constant cost per operator so that winner selection is deterministic. Sorts are
/// expensive to make the engine prefer passthrough over enforcement.
pub struct TestCostModel;

impl CostModel<TestNodeType> for TestCostModel {
    fn compute_operation_cost(
        &self,
        node: &TestNodeType,
        _predicates: &[ArcPredNode<TestNodeType>],
        _children_costs: &[Cost],
        _context: RelNodeContext,
    ) -> Cost {
        let cost = match node {
            TestNodeType::PhysicalScan => 100.0,
            TestNodeType::PhysicalSortedScan => 10.0,
            TestNodeType::PhysicalSort => 50.0,
            _ => 1.0,
        };
        Cost(vec![cost])
    }

    fn explain_cost(&self, cost: &Cost) -> String {
        format!("{}", cost.0[0])
    }

    fn accumulate(&self, total_cost: &mut Cost, cost: &Cost) {
        total_cost.0[0] += cost.0[0];
    }

    fn zero(&self) -> Cost {
        Cost(vec![0.0])
    }

    fn weighted_cost(&self, cost: &Cost) -> f64 {
        cost.0[0]
    }
}
