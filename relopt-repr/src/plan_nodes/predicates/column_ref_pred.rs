// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use pretty_xmlish::Pretty;

use crate::plan_nodes::{ArcRelPredNode, RelPredNode, RelPredType, RelReprPredNode, Value};

#[derive(Clone, Debug)]
pub struct ColumnRefPred(pub ArcRelPredNode);

impl ColumnRefPred {
    pub fn new(column_idx: usize) -> ColumnRefPred {
        ColumnRefPred(
            RelPredNode {
                typ: RelPredType::ColumnRef,
                children: vec![],
                data: Some(Value::UInt64(column_idx as u64)),
            }
            .into(),
        )
    }

    /// Gets the column index.
    pub fn index(&self) -> usize {
        self.0.unwrap_data().as_u64() as usize
    }
}

impl RelReprPredNode for ColumnRefPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if pred_node.typ != RelPredType::ColumnRef {
            return None;
        }
        Some(Self(pred_node))
    }

    fn explain(&self) -> Pretty<'static> {
        Pretty::display(&format!("#{}", self.index()))
    }
}
