// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The physical property (trait) framework: per-kind property builders, and the collection that
//! treats one value per kind as a trait set.

use std::any::Any;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::Arc;

use itertools::Itertools;

use crate::nodes::{ArcPredNode, NodeType};

/// A physical property of a plan, e.g., sort order or data distribution.
pub trait PhysicalProperty: 'static + Any + Send + Sync + Debug + Display {
    fn as_any(&self) -> &dyn Any;
    fn to_boxed(&self) -> Box<dyn PhysicalProperty>;
}

/// A builder for a single kind of physical property. Each kind defines how a property is
/// derived, required from children, satisfied, and enforced.
pub trait PhysicalPropertyBuilder<T: NodeType>: 'static + Send + Sync {
    type Prop: PhysicalProperty + Clone + Sized + PartialEq + Eq + Hash;

    /// Derive the output property of a physical node from the properties of its children.
    fn derive(&self, typ: T, predicates: &[ArcPredNode<T>], children: &[&Self::Prop])
        -> Self::Prop;

    /// Convert a requirement on a node into requirements on each of its children so that the
    /// node's derived property satisfies the requirement. If the node cannot provide the
    /// property, return the weakest (default) requirement for each child.
    fn passthrough(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &Self::Prop,
    ) -> Vec<Self::Prop>;

    /// Whether the node can satisfy `required` purely by requiring things of its children.
    fn can_passthrough(&self, typ: T, predicates: &[ArcPredNode<T>], required: &Self::Prop) -> bool {
        let child_required = self.passthrough(typ.clone(), predicates, required);
        let child_required = child_required.iter().collect_vec();
        let derived = self.derive(typ, predicates, &child_required);
        self.satisfies(&derived, required)
    }

    /// Whether `prop` satisfies `required`. This does not need to be an equality check; for
    /// example, a sort on `a, b` satisfies a requirement of `a`.
    fn satisfies(&self, prop: &Self::Prop, required: &Self::Prop) -> bool;

    /// Build an enforcer operator that produces `required` on top of any input.
    fn enforce(&self, required: &Self::Prop) -> (T, Vec<ArcPredNode<T>>);

    /// If a logical node is itself a property-enforcing operation (e.g., a sort), convert the
    /// requirement on the node into a search goal on its single child.
    fn search_goal(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &Self::Prop,
    ) -> Option<Self::Prop> {
        let _ = (typ, predicates, required);
        None
    }

    /// The weakest property of this kind, i.e., no requirement.
    fn default(&self) -> Self::Prop;

    /// Whether two properties are identical (not the satisfaction relationship). Used for
    /// deduplicating search goals.
    fn exactly_eq(&self, a: &Self::Prop, b: &Self::Prop) -> bool {
        a == b
    }

    fn property_name(&self) -> &'static str;
}

/// The type-erased version of [`PhysicalPropertyBuilder`].
pub trait PhysicalPropertyBuilderAny<T: NodeType>: 'static + Send + Sync {
    fn derive_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[&dyn PhysicalProperty],
    ) -> Box<dyn PhysicalProperty>;

    fn passthrough_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &dyn PhysicalProperty,
    ) -> Vec<Box<dyn PhysicalProperty>>;

    fn can_passthrough_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &dyn PhysicalProperty,
    ) -> bool;

    fn satisfies_any(&self, prop: &dyn PhysicalProperty, required: &dyn PhysicalProperty) -> bool;

    fn enforce_any(&self, required: &dyn PhysicalProperty) -> (T, Vec<ArcPredNode<T>>);

    fn search_goal_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &dyn PhysicalProperty,
    ) -> Option<Box<dyn PhysicalProperty>>;

    fn default_any(&self) -> Box<dyn PhysicalProperty>;

    fn exactly_eq_any(&self, a: &dyn PhysicalProperty, b: &dyn PhysicalProperty) -> bool;

    fn hash_any(&self, prop: &dyn PhysicalProperty, state: &mut dyn std::hash::Hasher);

    fn property_name(&self) -> &'static str;
}

impl<T: NodeType, P: PhysicalPropertyBuilder<T>> PhysicalPropertyBuilderAny<T> for P {
    fn derive_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[&dyn PhysicalProperty],
    ) -> Box<dyn PhysicalProperty> {
        let children = children
            .iter()
            .map(|child| {
                child
                    .as_any()
                    .downcast_ref::<P::Prop>()
                    .expect("invalid physical property type")
            })
            .collect_vec();
        Box::new(self.derive(typ, predicates, &children))
    }

    fn passthrough_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &dyn PhysicalProperty,
    ) -> Vec<Box<dyn PhysicalProperty>> {
        let required = required
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("invalid physical property type");
        self.passthrough(typ, predicates, required)
            .into_iter()
            .map(|x| Box::new(x) as Box<dyn PhysicalProperty>)
            .collect()
    }

    fn can_passthrough_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &dyn PhysicalProperty,
    ) -> bool {
        let required = required
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("invalid physical property type");
        self.can_passthrough(typ, predicates, required)
    }

    fn satisfies_any(&self, prop: &dyn PhysicalProperty, required: &dyn PhysicalProperty) -> bool {
        let prop = prop
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("invalid physical property type");
        let required = required
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("invalid physical property type");
        self.satisfies(prop, required)
    }

    fn enforce_any(&self, required: &dyn PhysicalProperty) -> (T, Vec<ArcPredNode<T>>) {
        let required = required
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("invalid physical property type");
        self.enforce(required)
    }

    fn search_goal_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &dyn PhysicalProperty,
    ) -> Option<Box<dyn PhysicalProperty>> {
        let required = required
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("invalid physical property type");
        self.search_goal(typ, predicates, required)
            .map(|x| Box::new(x) as Box<dyn PhysicalProperty>)
    }

    fn default_any(&self) -> Box<dyn PhysicalProperty> {
        Box::new(PhysicalPropertyBuilder::default(self))
    }

    fn exactly_eq_any(&self, a: &dyn PhysicalProperty, b: &dyn PhysicalProperty) -> bool {
        let (Some(a), Some(b)) = (
            a.as_any().downcast_ref::<P::Prop>(),
            b.as_any().downcast_ref::<P::Prop>(),
        ) else {
            return false;
        };
        self.exactly_eq(a, b)
    }

    fn hash_any(&self, prop: &dyn PhysicalProperty, mut state: &mut dyn std::hash::Hasher) {
        let prop = prop
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("invalid physical property type");
        prop.hash(&mut state);
    }

    fn property_name(&self) -> &'static str {
        PhysicalPropertyBuilder::property_name(self)
    }
}

/// A set of physical property values, one per registered kind, in builder order. This is the
/// trait-set representation used for search goals and derived winner properties.
pub type PhysicalPropertySet = Vec<Box<dyn PhysicalProperty>>;

/// All property builders registered with the optimizer, treated as a single builder over trait
/// sets. All `*_many` operations apply the per-kind builders pointwise.
#[derive(Clone)]
pub struct PhysicalPropertyBuilders<T: NodeType>(pub Arc<[Box<dyn PhysicalPropertyBuilderAny<T>>]>);

impl<T: NodeType> PhysicalPropertyBuilders<T> {
    pub fn new_empty_for_test() -> Self {
        Self(Arc::new([]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derive the output trait set of a node. `children` is indexed by child then by kind.
    pub fn derive_many<X>(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[X],
        children_len: usize,
    ) -> PhysicalPropertySet
    where
        X: AsRef<[Box<dyn PhysicalProperty>]>,
    {
        assert_eq!(children.len(), children_len);
        let mut result = Vec::with_capacity(self.0.len());
        for (i, builder) in self.0.iter().enumerate() {
            let children = children
                .iter()
                .map(|child| {
                    let child = child.as_ref();
                    assert_eq!(child.len(), self.0.len());
                    child[i].as_ref()
                })
                .collect_vec();
            result.push(builder.derive_any(typ.clone(), predicates, &children));
        }
        result
    }

    /// Compute the required trait set of each child given a requirement on the node. Returns
    /// `children_len` trait sets.
    pub fn passthrough_many(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &[Box<dyn PhysicalProperty>],
        children_len: usize,
    ) -> Vec<PhysicalPropertySet> {
        assert_eq!(required.len(), self.0.len());
        let mut result: Vec<PhysicalPropertySet> = (0..children_len)
            .map(|_| Vec::with_capacity(self.0.len()))
            .collect();
        for (i, builder) in self.0.iter().enumerate() {
            let child_required =
                builder.passthrough_any(typ.clone(), predicates, required[i].as_ref());
            assert_eq!(
                child_required.len(),
                children_len,
                "passthrough of {} returned the wrong number of children",
                builder.property_name()
            );
            for (child, prop) in result.iter_mut().zip(child_required) {
                child.push(prop);
            }
        }
        result
    }

    pub fn can_passthrough_any_many(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &[Box<dyn PhysicalProperty>],
    ) -> bool {
        assert_eq!(required.len(), self.0.len());
        self.0
            .iter()
            .zip(required)
            .all(|(builder, required)| {
                builder.can_passthrough_any(typ.clone(), predicates, required.as_ref())
            })
    }

    pub fn satisfies_many(
        &self,
        props: &[Box<dyn PhysicalProperty>],
        required: &[Box<dyn PhysicalProperty>],
    ) -> bool {
        assert_eq!(props.len(), self.0.len());
        assert_eq!(required.len(), self.0.len());
        self.0
            .iter()
            .zip(props)
            .zip(required)
            .all(|((builder, prop), required)| {
                builder.satisfies_any(prop.as_ref(), required.as_ref())
            })
    }

    pub fn exactly_eq(
        &self,
        a: &[Box<dyn PhysicalProperty>],
        b: &[Box<dyn PhysicalProperty>],
    ) -> bool {
        assert_eq!(a.len(), self.0.len());
        assert_eq!(b.len(), self.0.len());
        self.0
            .iter()
            .zip(a)
            .zip(b)
            .all(|((builder, a), b)| builder.exactly_eq_any(a.as_ref(), b.as_ref()))
    }

    pub fn hash_any(&self, props: &[Box<dyn PhysicalProperty>], state: &mut dyn std::hash::Hasher) {
        assert_eq!(props.len(), self.0.len());
        for (builder, prop) in self.0.iter().zip(props) {
            builder.hash_any(prop.as_ref(), state);
        }
    }

    /// The weakest trait set: the default property of each kind.
    pub fn default_many(&self) -> PhysicalPropertySet {
        self.0.iter().map(|builder| builder.default_any()).collect()
    }
}
