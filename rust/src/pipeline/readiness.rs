//! Operand readiness for operator nodes.

use crate::tree::{ExpressionTree, NodeId};

use super::grid::Tact;
use super::state::SessionState;

/// Tact at which `operand` is available: 0 for a constant, one tact after the
/// finish of an allocated operator, `None` for an operator not yet allocated.
pub fn operand_ready(tree: &ExpressionTree, state: &SessionState, operand: NodeId) -> Option<Tact> {
    if tree.is_constant(operand) {
        return Some(0);
    }
    state.allocation(operand).map(|a| a.finish + 1)
}

/// Earliest tact at which both operands of `node` are available.
///
/// Returns `None` while either operand is an unallocated operator; such a node
/// must not be selected at all.
pub fn early_start(tree: &ExpressionTree, state: &SessionState, node: NodeId) -> Option<Tact> {
    let (left, right) = tree.children(node)?;
    let left = operand_ready(tree, state, left)?;
    let right = operand_ready(tree, state, right)?;
    Some(left.max(right))
}

/// True when `node` is an operator whose operands are both available.
pub fn is_ready(tree: &ExpressionTree, state: &SessionState, node: NodeId) -> bool {
    early_start(tree, state, node).is_some()
}

/// Initial candidates: the deepest operators whose operands are both constants.
///
/// The descent stops at the first qualifying node on each path, so an ancestor
/// of a seeded node is never seeded itself. Left subtrees are visited first,
/// which fixes the discovery order used for tie-breaking.
pub fn seed_candidates(tree: &ExpressionTree) -> Vec<NodeId> {
    let mut seeds = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        let Some((left, right)) = tree.children(node) else {
            continue;
        };
        if tree.is_constant(left) && tree.is_constant(right) {
            seeds.push(node);
            continue;
        }
        stack.push(right);
        stack.push(left);
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::Allocation;
    use crate::tree::OperatorKind;

    /// ((1 + 2) * 3) - (4 + 5)
    fn make_tree() -> (ExpressionTree, [NodeId; 4]) {
        let mut b = ExpressionTree::builder();
        let c1 = b.constant(1.0);
        let c2 = b.constant(2.0);
        let inner = b.operator(OperatorKind::Add, c1, c2);
        let c3 = b.constant(3.0);
        let mul = b.operator(OperatorKind::Multiply, inner, c3);
        let c4 = b.constant(4.0);
        let c5 = b.constant(5.0);
        let right = b.operator(OperatorKind::Add, c4, c5);
        let root = b.operator(OperatorKind::Subtract, mul, right);
        (b.build(root), [inner, mul, right, root])
    }

    #[test]
    fn test_seed_stops_at_first_qualifying_node() {
        let (tree, [inner, _, right, _]) = make_tree();
        assert_eq!(seed_candidates(&tree), vec![inner, right]);
    }

    #[test]
    fn test_seed_order_is_left_first() {
        // ((1 + 2) * (3 + 4)) + (5 - 6)
        let mut b = ExpressionTree::builder();
        let c1 = b.constant(1.0);
        let c2 = b.constant(2.0);
        let a = b.operator(OperatorKind::Add, c1, c2);
        let c3 = b.constant(3.0);
        let c4 = b.constant(4.0);
        let c = b.operator(OperatorKind::Add, c3, c4);
        let mul = b.operator(OperatorKind::Multiply, a, c);
        let c5 = b.constant(5.0);
        let c6 = b.constant(6.0);
        let d = b.operator(OperatorKind::Subtract, c5, c6);
        let root = b.operator(OperatorKind::Add, mul, d);
        let tree = b.build(root);

        assert_eq!(seed_candidates(&tree), vec![a, c, d]);
    }

    #[test]
    fn test_seed_deep_chain() {
        // 1 + (1 + (1 + ... (1 + 1)))
        let mut b = ExpressionTree::builder();
        let one = b.constant(1.0);
        let other = b.constant(1.0);
        let bottom = b.operator(OperatorKind::Add, one, other);
        let mut acc = bottom;
        for _ in 0..200_000 {
            let one = b.constant(1.0);
            acc = b.operator(OperatorKind::Add, one, acc);
        }
        let tree = b.build(acc);

        assert_eq!(seed_candidates(&tree), vec![bottom]);
    }

    #[test]
    fn test_unallocated_operand_blocks() {
        let (tree, [inner, mul, _, root]) = make_tree();
        let mut state = SessionState::new(tree.len(), 2, 64);

        assert_eq!(early_start(&tree, &state, inner), Some(0));
        assert_eq!(early_start(&tree, &state, mul), None);
        assert!(!is_ready(&tree, &state, root));

        state
            .record(inner, Allocation { start: 0, finish: 3 })
            .unwrap();
        assert_eq!(early_start(&tree, &state, mul), Some(4));
        // Root still waits on its right operand
        assert_eq!(early_start(&tree, &state, root), None);
    }

    #[test]
    fn test_constant_operand_is_ready_at_zero() {
        let (tree, _) = make_tree();
        let state = SessionState::new(tree.len(), 2, 64);
        assert_eq!(operand_ready(&tree, &state, 0), Some(0));
    }
}
