// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

macro_rules! define_matcher {
    ( ( $typ:expr $(, $children:tt )* ) ) => {
        RuleMatcher::MatchNode {
            typ: $typ,
            children: vec![
                $( crate::rules::macros::define_matcher!($children) ),*
            ],
        }
    };
    ( $pick_one:tt ) => {
        RuleMatcher::Any
    };
}

macro_rules! define_rule_inner {
    ($rule_type:expr, $name:ident, $apply:ident, $($matcher:tt)+) => {
        pub struct $name {
            matcher: RuleMatcher<RelNodeType>,
        }

        impl $name {
            pub fn new() -> Self {
                #[allow(unused_imports)]
                use RelNodeType::*;
                let matcher = crate::rules::macros::define_matcher!($($matcher)+);
                Self { matcher }
            }
        }

        impl<O: Optimizer<RelNodeType>> Rule<RelNodeType, O> for $name {
            fn matcher(&self) -> &RuleMatcher<RelNodeType> {
                &self.matcher
            }

            fn apply(&self, call: &mut RuleCall<'_, RelNodeType, O>) {
                $apply(call)
            }

            camelpaste::paste! {
                fn name(&self) -> &'static str {
                    stringify!([< $name:snake >])
                }
            }

            fn is_impl_rule(&self) -> bool {
                $rule_type
            }
        }
    };
}

macro_rules! define_rule {
    ($name:ident, $apply:ident, $($matcher:tt)+) => {
        crate::rules::macros::define_rule_inner! { false, $name, $apply, $($matcher)+ }
    };
}

macro_rules! define_impl_rule {
    ($name:ident, $apply:ident, $($matcher:tt)+) => {
        crate::rules::macros::define_rule_inner! { true, $name, $apply, $($matcher)+ }
    };
}

#[allow(unused_imports)]
pub(crate) use define_impl_rule;
pub(crate) use define_matcher;
pub(crate) use define_rule;
pub(crate) use define_rule_inner;
