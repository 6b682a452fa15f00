// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use pretty_xmlish::Pretty;

use crate::plan_nodes::{ArcRelPredNode, RelPredNode, RelPredType, RelReprPredNode, Value};

/// An optional row bound, used for the offset and fetch parameters of a sort or limit. An
/// unspecified bound is a node with no data, so that "offset 0" and "no offset" stay distinct.
#[derive(Clone, Debug)]
pub struct BoundPred(pub ArcRelPredNode);

impl BoundPred {
    pub fn new(value: Option<u64>) -> Self {
        BoundPred(
            RelPredNode {
                typ: RelPredType::Bound,
                children: vec![],
                data: value.map(Value::UInt64),
            }
            .into(),
        )
    }

    pub fn unspecified() -> Self {
        Self::new(None)
    }

    pub fn value(&self) -> Option<u64> {
        self.0.data.as_ref().map(|x| x.as_u64())
    }

    pub fn is_specified(&self) -> bool {
        self.0.data.is_some()
    }
}

impl RelReprPredNode for BoundPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if pred_node.typ != RelPredType::Bound {
            return None;
        }
        Some(Self(pred_node))
    }

    fn explain(&self) -> Pretty<'static> {
        match self.value() {
            Some(value) => Pretty::display(&value),
            None => Pretty::display(&"<unspecified>"),
        }
    }
}
