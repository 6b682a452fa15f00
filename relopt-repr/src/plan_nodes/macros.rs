// Copyright (c) 2024-2025 relopt contributors
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

macro_rules! define_plan_node {
    (
        $struct_name:ident : $meta_typ:tt,
        $variant:ident,
        [ $({ $child_id:literal, $child_name:ident : $child_meta_typ:ty }),* ] ,
        [ $({ $attr_id:literal, $attr_name:ident : $attr_meta_typ:ty }),* ]
    ) => {
        impl RelReprPlanNode for $struct_name {
            fn into_plan_node(self) -> ArcRelPlanNode {
                self.0
            }

            fn from_plan_node(plan_node: ArcRelPlanNode) -> Option<Self> {
                if let RelNodeType :: $variant = plan_node.typ {
                    Some(Self(plan_node))
                } else {
                    None
                }
            }

            fn explain(&self) -> pretty_xmlish::Pretty<'static> {
                #[allow(unused_imports)]
                use crate::plan_nodes::RelReprPredNode;

                pretty_xmlish::Pretty::simple_record(
                    stringify!($struct_name),
                    vec![
                        $( (stringify!($attr_name), self.$attr_name().explain()) ),*
                    ],
                    vec![
                        $( crate::plan_nodes::dispatch_explain(self.$child_name().unwrap_plan_node()) ),*
                    ],
                )
            }
        }

        impl $struct_name {
            pub fn new(
                $($child_name : $child_meta_typ,)*
                $($attr_name : $attr_meta_typ),*
            ) -> $struct_name {
                #[allow(unused_imports)]
                use crate::plan_nodes::RelReprPredNode;
                #[allow(unused_mut, unused)]
                $struct_name(
                    RelPlanNode {
                        typ: RelNodeType::$variant,
                        children: vec![
                            $($child_name.into(),)*
                        ],
                        predicates: vec![
                            $($attr_name.into_pred_node(),)*
                        ],
                    }
                    .into(),
                )
            }

            pub fn new_unchecked(
                $($child_name : impl Into<relopt_core::nodes::PlanNodeOrGroup<RelNodeType>>,)*
                $($attr_name : $attr_meta_typ),*
            ) -> $struct_name {
                #[allow(unused_imports)]
                use crate::plan_nodes::RelReprPredNode;
                #[allow(unused_mut, unused)]
                $struct_name(
                    RelPlanNode {
                        typ: RelNodeType::$variant,
                        children: vec![
                            $($child_name.into(),)*
                        ],
                        predicates: vec![
                            $($attr_name.into_pred_node()),*
                        ],
                    }
                    .into(),
                )
            }

            $(
                pub fn $child_name(&self) -> relopt_core::nodes::PlanNodeOrGroup<RelNodeType> {
                    self.0.child($child_id)
                }
            )*

            $(
                pub fn $attr_name(&self) -> $attr_meta_typ {
                    #[allow(unused_imports)]
                    use crate::plan_nodes::RelReprPredNode;
                    <$attr_meta_typ>::from_pred_node(self.0.predicate($attr_id)).unwrap()
                }
            )*
        }
    };
}

pub(crate) use define_plan_node;

#[cfg(test)]
mod test {
    use crate::plan_nodes::*;

    fn get_explain_str(pretty: &Pretty) -> String {
        let mut config = PrettyConfig {
            need_boundaries: false,
            reduced_spaces: false,
            width: 300,
            ..Default::default()
        };
        let mut out = String::new();
        config.unicode(&mut out, pretty);
        out
    }

    #[test]
    fn explain_sort_over_scan() {
        let plan = LogicalSort::new(
            LogicalScan::new(ConstantPred::string("t1")).into_plan_node(),
            ListPred::new(vec![SortOrderPred::new(
                SortOrderType::Asc,
                ColumnRefPred::new(0).into_pred_node(),
            )
            .into_pred_node()]),
            BoundPred::new(Some(5)),
            BoundPred::unspecified(),
        );
        let explained = get_explain_str(&plan.explain());
        assert!(explained.contains("LogicalSort"), "{explained}");
        assert!(explained.contains("LogicalScan"), "{explained}");
        assert!(explained.contains("SortOrder"), "{explained}");
    }
}
