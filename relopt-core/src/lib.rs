// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::new_without_default)]

pub mod cascades;
pub mod cost;
pub mod logical_property;
pub mod nodes;
pub mod optimizer;
pub mod physical_property;
pub mod rules;

#[cfg(test)]
pub(crate) mod tests;
