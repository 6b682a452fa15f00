// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The representation of plan nodes and scalar predicates that flows through the optimizer.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::cascades::GroupId;

/// The type of a plan node. Implemented by the representation crate as a closed enum over all
/// supported operators, both logical and physical.
pub trait NodeType:
    PartialEq + Eq + Hash + Clone + 'static + Display + Debug + Send + Sync
{
    type PredType: PartialEq + Eq + Hash + Clone + 'static + Display + Debug + Send + Sync;

    fn is_logical(&self) -> bool;
}

/// A scalar constant embedded in a predicate node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    UInt64(u64),
    Int64(i64),
    Float(OrderedFloat<f64>),
    String(Arc<str>),
    Bool(bool),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UInt64(x) => write!(f, "{x}(u64)"),
            Self::Int64(x) => write!(f, "{x}(i64)"),
            Self::Float(x) => write!(f, "{x}(float)"),
            Self::String(x) => write!(f, "\"{x}\""),
            Self::Bool(x) => write!(f, "{x}"),
        }
    }
}

impl Value {
    pub fn as_u64(&self) -> u64 {
        match self {
            Value::UInt64(i) => *i,
            _ => panic!("Value is not an u64"),
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Int64(i) => *i,
            _ => panic!("Value is not an i64"),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Float(i) => **i,
            _ => panic!("Value is not an f64"),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            _ => panic!("Value is not a bool"),
        }
    }

    pub fn as_str(&self) -> Arc<str> {
        match self {
            Value::String(s) => s.clone(),
            _ => panic!("Value is not a string"),
        }
    }
}

pub type ArcPlanNode<T> = Arc<PlanNode<T>>;
pub type ArcPredNode<T> = Arc<PredNode<T>>;

/// A reference to a plan node input: either a materialized plan node, or an equivalence class
/// (group) in the memo table. Rule bindings and conversion requests use the group form so that a
/// single binding can stand for every member of the class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlanNodeOrGroup<T: NodeType> {
    PlanNode(ArcPlanNode<T>),
    Group(GroupId),
}

impl<T: NodeType> PlanNodeOrGroup<T> {
    pub fn is_materialized(&self) -> bool {
        match self {
            PlanNodeOrGroup::PlanNode(_) => true,
            PlanNodeOrGroup::Group(_) => false,
        }
    }

    pub fn unwrap_typ(&self) -> T {
        self.unwrap_plan_node().typ.clone()
    }

    pub fn unwrap_plan_node(&self) -> ArcPlanNode<T> {
        match self {
            PlanNodeOrGroup::PlanNode(node) => node.clone(),
            PlanNodeOrGroup::Group(_) => panic!("expect plan node, found group"),
        }
    }

    pub fn unwrap_group(&self) -> GroupId {
        match self {
            PlanNodeOrGroup::PlanNode(_) => panic!("expect group, found plan node"),
            PlanNodeOrGroup::Group(group_id) => *group_id,
        }
    }
}

impl<T: NodeType> Display for PlanNodeOrGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanNodeOrGroup::PlanNode(node) => Display::fmt(node, f),
            PlanNodeOrGroup::Group(group_id) => Display::fmt(group_id, f),
        }
    }
}

impl<T: NodeType> From<PlanNode<T>> for PlanNodeOrGroup<T> {
    fn from(node: PlanNode<T>) -> Self {
        Self::PlanNode(Arc::new(node))
    }
}

impl<T: NodeType> From<ArcPlanNode<T>> for PlanNodeOrGroup<T> {
    fn from(node: ArcPlanNode<T>) -> Self {
        Self::PlanNode(node)
    }
}

impl<T: NodeType> From<GroupId> for PlanNodeOrGroup<T> {
    fn from(group_id: GroupId) -> Self {
        Self::Group(group_id)
    }
}

/// An operator in the plan, with its semantic parameters stored as predicate nodes. Two plan
/// nodes with the same type, children, and predicates are the same expression as far as the
/// memo table is concerned.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlanNode<T: NodeType> {
    pub typ: T,
    pub children: Vec<PlanNodeOrGroup<T>>,
    pub predicates: Vec<ArcPredNode<T>>,
}

impl<T: NodeType> Display for PlanNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}", self.typ)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        for pred in &self.predicates {
            write!(f, " {}", pred)?;
        }
        write!(f, ")")
    }
}

impl<T: NodeType> PlanNode<T> {
    pub fn child(&self, idx: usize) -> PlanNodeOrGroup<T> {
        self.children[idx].clone()
    }

    /// Gets the `idx`-th child, assuming it is materialized.
    pub fn child_rel(&self, idx: usize) -> ArcPlanNode<T> {
        self.child(idx).unwrap_plan_node()
    }

    pub fn predicate(&self, idx: usize) -> ArcPredNode<T> {
        self.predicates[idx].clone()
    }
}

/// A scalar expression attached to a plan node, i.e., anything that is not an input relation:
/// sort keys, filter conditions, limit bounds, and the like.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PredNode<T: NodeType> {
    pub typ: T::PredType,
    pub children: Vec<ArcPredNode<T>>,
    pub data: Option<Value>,
}

impl<T: NodeType> Display for PredNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}", self.typ)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        if let Some(data) = &self.data {
            write!(f, " {}", data)?;
        }
        write!(f, ")")
    }
}

impl<T: NodeType> PredNode<T> {
    pub fn child(&self, idx: usize) -> ArcPredNode<T> {
        self.children[idx].clone()
    }

    pub fn unwrap_data(&self) -> Value {
        self.data.clone().unwrap()
    }
}
