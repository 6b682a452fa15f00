// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The cascades search engine: a memo table of equivalence classes, search goals keyed by
//! required physical properties, and a fixed-point rule-firing loop with cost-based winner
//! selection.

mod memo;
mod optimizer;
mod rule_match;
mod tasks;

pub use memo::{
    ArcMemoPlanNode, Group, Memo, MemoPlanNode, NaiveMemo, RequiredPhysicalProperties, Winner,
    WinnerExpr, WinnerInfo,
};
pub use optimizer::{
    CascadesOptimizer, ExprId, GroupId, OptimizerContext, OptimizerProperties, PredId,
    RelNodeContext, SubGoalId,
};
