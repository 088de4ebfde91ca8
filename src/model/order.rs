//! Topological linearization of the node arena.

use bit_set::BitSet;

use crate::errors::{GraphError, GraphResult};
use crate::model::Node;

/// Computes an evaluation order covering `targets` and their transitive
/// dependencies.
///
/// Iterative, with an explicit work stack: a node stays on the stack until
/// every producer of its inputs is done, so stack depth is bounded by the
/// graph size rather than its depth. Shared subgraphs are emitted once.
/// Ties among independent branches fall out of stack discovery order and
/// are not part of the contract.
pub fn eval_order_for_nodes(nodes: &[Node], targets: &[usize]) -> GraphResult<Vec<usize>> {
    let mut done = BitSet::with_capacity(nodes.len());
    let mut needed: Vec<usize> = vec![];
    let mut order: Vec<usize> = vec![];
    for &t in targets {
        if t >= nodes.len() {
            return Err(GraphError::Internal(format!(
                "build target refers to unmaterialized node {} (arena holds {})",
                t,
                nodes.len()
            )));
        }
        needed.push(t);
    }
    while let Some(&node) = needed.last() {
        if done.contains(node) {
            needed.pop();
            continue;
        }
        if nodes[node].inputs.iter().all(|i| done.contains(i.node)) {
            order.push(node);
            needed.pop();
            done.insert(node);
        } else {
            for input in nodes[node].inputs.iter().rev() {
                if input.node >= nodes.len() {
                    return Err(GraphError::Internal(format!(
                        "node {} depends on unmaterialized node {}",
                        node, input.node
                    )));
                }
                if !done.contains(input.node) {
                    needed.push(input.node);
                }
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendGraph;
    use crate::datum::DatumType;
    use crate::model::{OperandFact, Outlet, OutletId};
    use crate::ops::{InputRef, Operator};
    use crate::{tvec, GraphResult, TVec};

    #[derive(Debug)]
    struct Probe;

    impl Operator for Probe {
        fn name(&self) -> &'static str {
            "Probe"
        }

        fn output_facts(&self, _inputs: &[InputRef]) -> GraphResult<TVec<OperandFact>> {
            Ok(tvec!(OperandFact::dt_shape(DatumType::F32, [1])))
        }

        fn lower(&self, _node: &Node, _graph: &mut dyn BackendGraph) -> GraphResult<()> {
            Ok(())
        }
    }

    fn node(id: usize, inputs: &[usize]) -> Node {
        Node {
            id,
            name: format!("probe_{}", id),
            op: Box::new(Probe),
            inputs: inputs.iter().map(|&n| OutletId::new(n, 0)).collect(),
            outputs: tvec!(Outlet { fact: OperandFact::dt_shape(DatumType::F32, [1]) }),
        }
    }

    #[test]
    fn chain() {
        let nodes = vec![node(0, &[]), node(1, &[0]), node(2, &[1])];
        assert_eq!(eval_order_for_nodes(&nodes, &[2]).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn diamond_is_deduplicated() {
        // 0 feeds 1 and 2, both feed 3
        let nodes = vec![node(0, &[]), node(1, &[0]), node(2, &[0]), node(3, &[1, 2])];
        let order = eval_order_for_nodes(&nodes, &[3]).unwrap();
        assert_eq!(order.iter().filter(|&&n| n == 0).count(), 1);
        assert_eq!(order.len(), 4);
        assert_dependencies_first(&nodes, &order);
    }

    #[test]
    fn only_needed_nodes_are_emitted() {
        let nodes = vec![node(0, &[]), node(1, &[0]), node(2, &[])];
        assert_eq!(eval_order_for_nodes(&nodes, &[1]).unwrap(), vec![0, 1]);
    }

    #[test]
    fn multiple_targets() {
        let nodes = vec![node(0, &[]), node(1, &[0]), node(2, &[0])];
        let order = eval_order_for_nodes(&nodes, &[1, 2]).unwrap();
        assert_eq!(order.len(), 3);
        assert_dependencies_first(&nodes, &order);
    }

    #[test]
    fn dangling_target_is_an_internal_error() {
        let nodes = vec![node(0, &[])];
        let err = eval_order_for_nodes(&nodes, &[12]).unwrap_err();
        assert!(matches!(err, GraphError::Internal(_)));
    }

    fn assert_dependencies_first(nodes: &[Node], order: &[usize]) {
        let position =
            |id: usize| order.iter().position(|&n| n == id).expect("node missing from order");
        for &id in order {
            for input in &nodes[id].inputs {
                assert!(position(input.node) < position(id));
            }
        }
    }
}
