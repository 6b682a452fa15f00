// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use pretty_xmlish::Pretty;
use serde::{Deserialize, Serialize};

use crate::plan_nodes::{ArcRelPredNode, RelPredNode, RelPredType, RelReprPredNode, Value};

/// The type of a constant, also used as the column type in a schema.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ConstantType {
    Bool,
    UInt64,
    Int64,
    Float64,
    Utf8String,
}

impl std::fmt::Display for ConstantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ConstantType {
    pub fn get_data_type_from_value(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ConstantType::Bool,
            Value::UInt64(_) => ConstantType::UInt64,
            Value::Int64(_) => ConstantType::Int64,
            Value::Float(_) => ConstantType::Float64,
            Value::String(_) => ConstantType::Utf8String,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConstantPred(pub ArcRelPredNode);

impl ConstantPred {
    pub fn new(value: Value) -> Self {
        let typ = ConstantType::get_data_type_from_value(&value);
        Self::new_with_type(value, typ)
    }

    pub fn new_with_type(value: Value, typ: ConstantType) -> Self {
        ConstantPred(
            RelPredNode {
                typ: RelPredType::Constant(typ),
                children: vec![],
                data: Some(value),
            }
            .into(),
        )
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Value::Bool(value))
    }

    pub fn uint64(value: u64) -> Self {
        Self::new(Value::UInt64(value))
    }

    pub fn string(value: impl AsRef<str>) -> Self {
        Self::new(Value::String(value.as_ref().into()))
    }

    /// Gets the constant value.
    pub fn value(&self) -> Value {
        self.0.unwrap_data()
    }

    pub fn constant_type(&self) -> ConstantType {
        if let RelPredType::Constant(typ) = self.0.typ {
            typ
        } else {
            panic!("not a constant")
        }
    }
}

impl RelReprPredNode for ConstantPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if !matches!(pred_node.typ, RelPredType::Constant(_)) {
            return None;
        }
        Some(Self(pred_node))
    }

    fn explain(&self) -> Pretty<'static> {
        Pretty::display(&self.value())
    }
}
