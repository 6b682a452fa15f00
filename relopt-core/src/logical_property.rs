// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::any::Any;
use std::fmt::{Debug, Display};

use crate::nodes::{ArcPredNode, NodeType};

/// A logical property, shared by all expressions within a group (e.g., the schema of the rows the
/// group produces).
pub trait LogicalProperty: 'static + Any + Send + Sync + Debug + Display {
    fn as_any(&self) -> &dyn Any;
}

/// A builder that derives a logical property of a plan node from the properties of its children.
pub trait LogicalPropertyBuilder<T: NodeType>: 'static + Send + Sync {
    type Prop: LogicalProperty + Clone + Sized + PartialEq;

    /// Derive the property of a node based on its type, predicates, and children properties.
    fn derive(&self, typ: T, predicates: &[ArcPredNode<T>], children: &[&Self::Prop])
        -> Self::Prop;

    fn property_name(&self) -> &'static str;
}

/// The type-erased version of [`LogicalPropertyBuilder`], stored in the optimizer and the memo.
pub trait LogicalPropertyBuilderAny<T: NodeType>: 'static + Send + Sync {
    fn derive_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[&dyn LogicalProperty],
    ) -> Box<dyn LogicalProperty>;

    /// Whether two derived properties are identical. Used to reject rule output that would
    /// change the row type of a group.
    fn exactly_eq_any(&self, a: &dyn LogicalProperty, b: &dyn LogicalProperty) -> bool;

    fn property_name(&self) -> &'static str;
}

impl<T: NodeType, P: LogicalPropertyBuilder<T>> LogicalPropertyBuilderAny<T> for P {
    fn derive_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[&dyn LogicalProperty],
    ) -> Box<dyn LogicalProperty> {
        let children = children
            .iter()
            .map(|child| {
                child
                    .as_any()
                    .downcast_ref::<P::Prop>()
                    .expect("invalid logical property type")
            })
            .collect::<Vec<_>>();
        Box::new(self.derive(typ, predicates, &children))
    }

    fn exactly_eq_any(&self, a: &dyn LogicalProperty, b: &dyn LogicalProperty) -> bool {
        let (Some(a), Some(b)) = (
            a.as_any().downcast_ref::<P::Prop>(),
            b.as_any().downcast_ref::<P::Prop>(),
        ) else {
            return false;
        };
        a == b
    }

    fn property_name(&self) -> &'static str {
        LogicalPropertyBuilder::property_name(self)
    }
}
