//! Arena holding the expression nodes of one formula

use super::{ExprId, Expression, ExpressionKind};
use crate::error::{FormulaError, FormulaResult};

/// The parsed form of a formula
///
/// Every chain edit keeps `node.next.prev == node`.
#[derive(Debug, Clone, Default)]
pub struct ExpressionGraph {
    nodes: Vec<Expression>,
    expressions: Vec<ExprId>,
    current: Option<ExprId>,
}

impl ExpressionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a detached node
    pub fn create(&mut self, kind: ExpressionKind, text: impl Into<String>) -> ExprId {
        let id = ExprId(self.nodes.len());
        self.nodes.push(Expression::new(kind, text));
        id
    }

    /// Append a node to the top-level chain
    pub fn add(&mut self, id: ExprId) {
        if let Some(current) = self.current {
            self.link(current, id);
        }
        self.expressions.push(id);
        self.current = Some(id);
    }

    /// Append `child` to `parent`, linking it after the previous child
    ///
    /// Children of an array constant stay unlinked, each is its own value.
    pub fn add_child(&mut self, parent: ExprId, child: ExprId) {
        let link_to = match self.nodes[parent.0].kind {
            ExpressionKind::Enumerable { .. } => None,
            _ => self.nodes[parent.0].children.last().copied(),
        };
        if let Some(last) = link_to {
            self.link(last, child);
        }
        self.nodes[parent.0].children.push(child);
    }

    pub fn node(&self, id: ExprId) -> &Expression {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: ExprId) -> &mut Expression {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: ExprId) -> &ExpressionKind {
        &self.nodes[id.0].kind
    }

    /// Top-level expressions in source order
    pub fn expressions(&self) -> &[ExprId] {
        &self.expressions
    }

    /// Last node added to the top-level chain
    pub fn current(&self) -> Option<ExprId> {
        self.current
    }

    pub fn children(&self, id: ExprId) -> &[ExprId] {
        &self.nodes[id.0].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    fn link(&mut self, first: ExprId, second: ExprId) {
        self.nodes[first.0].next = Some(second);
        self.nodes[second.0].prev = Some(first);
    }

    /// Relink `ids` as one chain in the given order
    pub fn link_chain(&mut self, ids: &[ExprId]) {
        for (i, id) in ids.iter().enumerate() {
            let node = &mut self.nodes[id.0];
            node.prev = i.checked_sub(1).map(|p| ids[p]);
            node.next = ids.get(i + 1).copied();
        }
    }

    /// Put `kind` in place of `old`, inheriting its links, operator and negation
    pub fn replace(&mut self, old: ExprId, kind: ExpressionKind) -> ExprId {
        let new = self.create(kind, String::new());
        let (prev, next, operator, negate) = {
            let node = &self.nodes[old.0];
            (node.prev, node.next, node.operator, node.negate)
        };

        let node = &mut self.nodes[new.0];
        node.operator = operator;
        node.negate = negate;
        if let Some(prev) = prev {
            self.link(prev, new);
        }
        if let Some(next) = next {
            self.link(new, next);
        }
        self.detach(old);
        new
    }

    /// Replace `id` and its successor by a single node of `kind`
    ///
    /// The merged node takes the successor's operator so reduction can
    /// continue along the chain.
    pub fn merge_with_next(&mut self, id: ExprId, kind: ExpressionKind) -> FormulaResult<ExprId> {
        let next = self.nodes[id.0].next.ok_or_else(|| {
            FormulaError::Parse("invalid formula syntax: operator missing expression".into())
        })?;

        let merged = self.create(kind, String::new());
        let prev = self.nodes[id.0].prev;
        let after = self.nodes[next.0].next;
        self.nodes[merged.0].operator = self.nodes[next.0].operator;

        if let Some(prev) = prev {
            self.link(prev, merged);
        }
        if let Some(after) = after {
            self.link(merged, after);
        }
        self.detach(id);
        self.detach(next);
        Ok(merged)
    }

    /// Unlink `id`, joining its neighbours
    pub fn remove(&mut self, id: ExprId) {
        let (prev, next) = (self.nodes[id.0].prev, self.nodes[id.0].next);
        match (prev, next) {
            (Some(p), Some(n)) => self.link(p, n),
            (Some(p), None) => self.nodes[p.0].next = None,
            (None, Some(n)) => self.nodes[n.0].prev = None,
            (None, None) => {}
        }
        self.detach(id);
    }

    fn detach(&mut self, id: ExprId) {
        let node = &mut self.nodes[id.0];
        node.prev = None;
        node.next = None;
    }

    /// Walk a chain from `head`
    pub fn chain(&self, head: Option<ExprId>) -> Vec<ExprId> {
        let mut ids = Vec::new();
        let mut cursor = head;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.nodes[id.0].next;
        }
        ids
    }

    /// Verify `next.prev == node` for every linked node
    pub fn check_chain(&self) -> bool {
        self.nodes.iter().enumerate().all(|(i, node)| {
            node.next
                .map_or(true, |next| self.nodes[next.0].prev == Some(ExprId(i)))
        })
    }

    /// Every address node reachable from the top-level expressions
    pub fn address_nodes(&self) -> Vec<ExprId> {
        let mut found = Vec::new();
        let mut stack: Vec<ExprId> = self.expressions.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            match &node.kind {
                ExpressionKind::ExcelAddress(_) => found.push(id),
                ExpressionKind::RangeOffset { start, end } => {
                    stack.push(*end);
                    stack.push(*start);
                }
                ExpressionKind::Colon { left, right } => {
                    stack.push(*right);
                    stack.push(*left);
                }
                _ => {}
            }
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    /// Flag an address node as referring to the cell being evaluated
    pub fn mark_circular(&mut self, id: ExprId) {
        if let ExpressionKind::ExcelAddress(address) = &mut self.nodes[id.0].kind {
            address.has_circular_reference = true;
        }
    }

    /// Force an address or name node to stay a range when compiled
    pub fn resolve_as_range(&mut self, id: ExprId) {
        match &mut self.nodes[id.0].kind {
            ExpressionKind::ExcelAddress(address) => address.resolve_as_range = true,
            ExpressionKind::NamedValue {
                resolve_as_range, ..
            } => *resolve_as_range = true,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int(graph: &mut ExpressionGraph, n: f64) -> ExprId {
        graph.create(ExpressionKind::Integer(n), n.to_string())
    }

    #[test]
    fn test_add_links_chain() {
        let mut graph = ExpressionGraph::new();
        let a = int(&mut graph, 1.0);
        let b = int(&mut graph, 2.0);
        graph.add(a);
        graph.add(b);

        assert_eq!(graph.node(a).next, Some(b));
        assert_eq!(graph.node(b).prev, Some(a));
        assert_eq!(graph.current(), Some(b));
        assert!(graph.check_chain());
    }

    #[test]
    fn test_merge_with_next() {
        let mut graph = ExpressionGraph::new();
        let ids: Vec<_> = (1..=4).map(|n| int(&mut graph, n as f64)).collect();
        graph.link_chain(&ids);

        let merged = graph
            .merge_with_next(ids[1], ExpressionKind::Integer(5.0))
            .unwrap();
        assert_eq!(graph.chain(Some(ids[0])), vec![ids[0], merged, ids[3]]);
        assert!(graph.check_chain());

        let err = graph.merge_with_next(ids[3], ExpressionKind::Empty);
        assert!(matches!(err, Err(FormulaError::Parse(_))));
    }

    #[test]
    fn test_replace_and_remove() {
        let mut graph = ExpressionGraph::new();
        let ids: Vec<_> = (1..=3).map(|n| int(&mut graph, n as f64)).collect();
        graph.link_chain(&ids);
        graph.node_mut(ids[1]).negate = true;

        let new = graph.replace(ids[1], ExpressionKind::Decimal(2.5));
        assert!(graph.node(new).negate);
        assert_eq!(graph.chain(Some(ids[0])), vec![ids[0], new, ids[2]]);

        graph.remove(new);
        assert_eq!(graph.chain(Some(ids[0])), vec![ids[0], ids[2]]);
        assert!(graph.check_chain());
    }

    #[test]
    fn test_enumerable_children_unlinked() {
        let mut graph = ExpressionGraph::new();
        let array = graph.create(ExpressionKind::Enumerable { row_breaks: vec![] }, "{");
        let a = int(&mut graph, 1.0);
        let b = int(&mut graph, 2.0);
        graph.add_child(array, a);
        graph.add_child(array, b);

        assert_eq!(graph.node(a).next, None);
        assert_eq!(graph.children(array), &[a, b]);
    }
}
