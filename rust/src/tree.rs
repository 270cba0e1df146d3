//! Arena-backed arithmetic expression tree.
//!
//! Nodes live in a flat `Vec` and refer to each other by [`NodeId`]. Children are
//! owned by position in the arena; the parent link is a plain index used only for
//! readiness propagation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Index of a node in an [`ExpressionTree`] arena.
pub type NodeId = usize;

/// Closed set of binary operators the pipeline knows how to schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperatorKind {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 4] = [
        OperatorKind::Add,
        OperatorKind::Subtract,
        OperatorKind::Multiply,
        OperatorKind::Divide,
    ];

    /// Source symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }

    /// Apply the operator to two operand values.
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            Self::Add => left + right,
            Self::Subtract => left - right,
            Self::Multiply => left * right,
            Self::Divide => left / right,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for OperatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Self::Add),
            "-" => Ok(Self::Subtract),
            "*" => Ok(Self::Multiply),
            "/" => Ok(Self::Divide),
            other => Err(other.to_string()),
        }
    }
}

/// Structural problems found while validating a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("operator node {node} is missing its {side} child")]
    MissingChild { node: NodeId, side: &'static str },
    #[error("node {node} refers to nonexistent node {target}")]
    InvalidNodeId { node: NodeId, target: NodeId },
    #[error("node {0} is reachable from more than one parent (shared node or cycle)")]
    SharedNode(NodeId),
    #[error("node {child} records parent {recorded:?} but is a child of {actual}")]
    ParentMismatch {
        child: NodeId,
        recorded: Option<NodeId>,
        actual: NodeId,
    },
    #[error("node {0} is not reachable from the root")]
    DetachedNode(NodeId),
    #[error("root node {0} has a parent")]
    RootHasParent(NodeId),
}

/// Payload of a single node.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Constant(f64),
    Operator {
        kind: OperatorKind,
        left: Option<NodeId>,
        right: Option<NodeId>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionNode {
    pub kind: NodeKind,
    /// Non-owning back link; `None` for the root.
    pub parent: Option<NodeId>,
}

impl ExpressionNode {
    pub fn is_constant(&self) -> bool {
        matches!(self.kind, NodeKind::Constant(_))
    }

    /// Operator kind, or `None` for constants.
    pub fn operator(&self) -> Option<OperatorKind> {
        match self.kind {
            NodeKind::Operator { kind, .. } => Some(kind),
            NodeKind::Constant(_) => None,
        }
    }

    /// Both children of an operator node, if both are present.
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        match self.kind {
            NodeKind::Operator {
                left: Some(l),
                right: Some(r),
                ..
            } => Some((l, r)),
            _ => None,
        }
    }
}

/// An immutable-shape expression tree handed to the scheduler.
#[derive(Clone, Debug)]
pub struct ExpressionTree {
    nodes: Vec<ExpressionNode>,
    root: NodeId,
}

impl ExpressionTree {
    pub fn builder() -> TreeBuilder {
        TreeBuilder::default()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&ExpressionNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ExpressionNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn is_constant(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.is_constant())
    }

    pub fn operator(&self, id: NodeId) -> Option<OperatorKind> {
        self.nodes.get(id).and_then(|n| n.operator())
    }

    pub fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        self.nodes.get(id).and_then(|n| n.children())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Operator nodes in arena order.
    pub fn operator_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.is_constant())
            .map(|(id, _)| id)
    }

    pub fn operator_count(&self) -> usize {
        self.operator_ids().count()
    }

    /// Number of operators on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self.root, 0)];
        while let Some((id, above)) = stack.pop() {
            if let Some((l, r)) = self.children(id) {
                deepest = deepest.max(above + 1);
                stack.push((l, above + 1));
                stack.push((r, above + 1));
            }
        }
        deepest
    }

    /// Arithmetic value of the expression. Requires a validated tree.
    pub fn evaluate(&self) -> Result<f64, TreeError> {
        enum Step {
            Visit(NodeId),
            Apply(OperatorKind),
        }

        let mut steps = vec![Step::Visit(self.root)];
        let mut values: Vec<f64> = Vec::new();
        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(id) => {
                    let node = self
                        .nodes
                        .get(id)
                        .ok_or(TreeError::InvalidNodeId { node: id, target: id })?;
                    match node.kind {
                        NodeKind::Constant(value) => values.push(value),
                        NodeKind::Operator { kind, left, right } => {
                            let left = left.ok_or(TreeError::MissingChild { node: id, side: "left" })?;
                            let right =
                                right.ok_or(TreeError::MissingChild { node: id, side: "right" })?;
                            steps.push(Step::Apply(kind));
                            steps.push(Step::Visit(right));
                            steps.push(Step::Visit(left));
                        }
                    }
                }
                Step::Apply(kind) => {
                    // Right operand was evaluated last
                    if let (Some(right), Some(left)) = (values.pop(), values.pop()) {
                        values.push(kind.apply(left, right));
                    }
                }
            }
        }
        Ok(values.pop().unwrap_or(f64::NAN))
    }

    /// Check that the arena forms a proper binary tree rooted at `root`.
    ///
    /// Every operator must have two children, every node must be reached exactly
    /// once from the root, and each child's parent link must point back at the
    /// operator that owns it.
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.root >= self.nodes.len() {
            return Err(TreeError::InvalidNodeId {
                node: self.root,
                target: self.root,
            });
        }
        if self.nodes[self.root].parent.is_some() {
            return Err(TreeError::RootHasParent(self.root));
        }

        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        seen[self.root] = true;

        while let Some(id) = stack.pop() {
            let NodeKind::Operator { left, right, .. } = self.nodes[id].kind else {
                continue;
            };
            for (side, child) in [("left", left), ("right", right)] {
                let child = child.ok_or(TreeError::MissingChild { node: id, side })?;
                if child >= self.nodes.len() {
                    return Err(TreeError::InvalidNodeId {
                        node: id,
                        target: child,
                    });
                }
                if seen[child] {
                    return Err(TreeError::SharedNode(child));
                }
                let recorded = self.nodes[child].parent;
                if recorded != Some(id) {
                    return Err(TreeError::ParentMismatch {
                        child,
                        recorded,
                        actual: id,
                    });
                }
                seen[child] = true;
                stack.push(child);
            }
        }

        match seen.iter().position(|visited| !visited) {
            Some(detached) => Err(TreeError::DetachedNode(detached)),
            None => Ok(()),
        }
    }

    /// Short label used in grid renderings, e.g. `+(3)`.
    pub fn label(&self, id: NodeId) -> String {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::Operator { kind, .. }) => format!("{}({})", kind, id),
            Some(NodeKind::Constant(value)) => format!("{}", value),
            None => "?".to_string(),
        }
    }
}

/// Incremental builder used by parsers (and tests) to assemble a tree.
///
/// The builder sets parent links as operators are added and performs no
/// validation; call [`ExpressionTree::validate`] (the scheduler does) before use.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<ExpressionNode>,
}

impl TreeBuilder {
    pub fn constant(&mut self, value: f64) -> NodeId {
        self.push(NodeKind::Constant(value))
    }

    pub fn operator(&mut self, kind: OperatorKind, left: NodeId, right: NodeId) -> NodeId {
        self.partial_operator(kind, Some(left), Some(right))
    }

    /// Add an operator whose children may be absent.
    pub fn partial_operator(
        &mut self,
        kind: OperatorKind,
        left: Option<NodeId>,
        right: Option<NodeId>,
    ) -> NodeId {
        let id = self.push(NodeKind::Operator { kind, left, right });
        for child in [left, right].into_iter().flatten() {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = Some(id);
            }
        }
        id
    }

    pub fn build(self, root: NodeId) -> ExpressionTree {
        ExpressionTree {
            nodes: self.nodes,
            root,
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(ExpressionNode { kind, parent: None });
        self.nodes.len() - 1
    }
}
