// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::nodes::NodeType;

/// The pattern of a rule, matched top-down against memo expressions.
pub enum RuleMatcher<T: NodeType> {
    /// Match a node of a specific type with the given children.
    MatchNode { typ: T, children: Vec<Self> },
    /// Match a node by its enum discriminant, ignoring any payload in the type. Useful for
    /// rules that apply to a family of operators.
    MatchDiscriminant {
        typ_discriminant: std::mem::Discriminant<T>,
        children: Vec<Self>,
    },
    /// Match any single subtree without inspecting it.
    Any,
    /// Match all remaining children without inspecting them. Must be the last child matcher.
    AnyMany,
}
