use crate::cascades::RelNodeContext;
use crate::nodes::{ArcPredNode, NodeType};

/// The cost of an operation or a plan, as a vector so that models can track multiple dimensions
/// (e.g., compute and I/O) and weight them at the very end.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Cost(pub Vec<f64>);

pub trait CostModel<T: NodeType>: 'static + Send + Sync {
    /// Compute the cost of a single operation, excluding its inputs.
    fn compute_operation_cost(
        &self,
        node: &T,
        predicates: &[ArcPredNode<T>],
        children_costs: &[Cost],
        context: RelNodeContext,
    ) -> Cost;

    fn explain_cost(&self, cost: &Cost) -> String;

    fn accumulate(&self, total_cost: &mut Cost, cost: &Cost);

    fn sum(&self, operation_cost: &Cost, inputs_cost: &[Cost]) -> Cost {
        let mut total_cost = operation_cost.clone();
        for input in inputs_cost {
            self.accumulate(&mut total_cost, input);
        }
        total_cost
    }

    fn zero(&self) -> Cost;

    /// Fold a cost vector into the scalar the search engine compares winners by.
    fn weighted_cost(&self, cost: &Cost) -> f64;
}
