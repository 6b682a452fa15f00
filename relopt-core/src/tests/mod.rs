// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

pub(crate) mod common;

mod conversion;
mod physical_property_enforcement;
