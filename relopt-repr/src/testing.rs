// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;
use std::sync::Arc;

use crate::plan_nodes::ConstantType;
use crate::properties::schema::{Catalog, Field, Schema};
use crate::RelOptimizer;

/// An in-memory catalog for tests and demos.
#[derive(Default)]
pub struct MemCatalog {
    tables: HashMap<String, Schema>,
}

impl MemCatalog {
    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) {
        self.tables.insert(name.into(), schema);
    }
}

impl Catalog for MemCatalog {
    fn get(&self, name: &str) -> Schema {
        self.tables
            .get(name)
            .unwrap_or_else(|| panic!("table {name} not found"))
            .clone()
    }
}

/// An optimizer over a catalog with a single two-column table `t1(v1 int64, v2 int64)`.
pub fn new_test_optimizer() -> RelOptimizer {
    let mut catalog = MemCatalog::default();
    catalog.insert(
        "t1",
        Schema::new(vec![
            Field {
                name: "v1".to_string(),
                typ: ConstantType::Int64,
                nullable: false,
            },
            Field {
                name: "v2".to_string(),
                typ: ConstantType::Int64,
                nullable: false,
            },
        ]),
    );
    RelOptimizer::new_physical(Arc::new(catalog))
}
