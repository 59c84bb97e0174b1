//! Dense graph container shared by the concrete and abstract layers.
//!
//! Nodes live in a contiguous `Vec` indexed by id, with their out-edges
//! stored inline. Ids are typed per graph through [`GraphId`] newtypes so a
//! node id minted for one graph cannot address another.

/// Typed node id. Implemented by per-graph newtype wrappers.
pub trait GraphId: Copy + Eq {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Edge<Id, EI> {
    pub target: Id,
    pub info: EI,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node<Id, NI, EI> {
    pub info: NI,
    pub edges: Vec<Edge<Id, EI>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Graph<Id, NI, EI> {
    nodes: Vec<Node<Id, NI, EI>>,
}

impl<Id: GraphId, NI, EI> Graph<Id, NI, EI> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { nodes: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends when `id == len`, replaces when `id < len`. Any other id is a
    /// programming error.
    pub fn add_node(&mut self, id: Id, info: NI) {
        let idx = id.index();
        if idx == self.nodes.len() {
            self.nodes.push(Node { info, edges: Vec::new() });
        } else if idx < self.nodes.len() {
            self.nodes[idx] = Node { info, edges: Vec::new() };
        } else {
            panic!("node id {} out of range (len {})", idx, self.nodes.len());
        }
    }

    /// Appends to `src`'s out-adjacency. No duplicate suppression.
    pub fn add_edge(&mut self, src: Id, target: Id, info: EI) {
        assert!(
            target.index() < self.nodes.len(),
            "edge target {} out of range (len {})",
            target.index(),
            self.nodes.len()
        );
        match self.nodes.get_mut(src.index()) {
            Some(node) => node.edges.push(Edge { target, info }),
            None => panic!("edge from non-existent node {}", src.index()),
        }
    }

    pub fn remove_last_node(&mut self) -> Option<Node<Id, NI, EI>> {
        self.nodes.pop()
    }

    pub fn remove_edges_from(&mut self, id: Id) {
        self.nodes[id.index()].edges.clear();
    }

    /// Removes every edge `src -> target`.
    pub fn remove_edge(&mut self, src: Id, target: Id) {
        self.nodes[src.index()].edges.retain(|e| e.target != target);
    }

    pub fn node(&self, id: Id) -> &Node<Id, NI, EI> {
        &self.nodes[id.index()]
    }

    pub fn node_info(&self, id: Id) -> &NI {
        &self.nodes[id.index()].info
    }

    pub fn edges(&self, id: Id) -> &[Edge<Id, EI>] {
        &self.nodes[id.index()].edges
    }

    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        (0..self.nodes.len()).map(Id::from_index)
    }
}

impl<Id: GraphId, NI, EI> Default for Graph<Id, NI, EI> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    struct TestId(u32);

    impl GraphId for TestId {
        fn from_index(index: usize) -> Self {
            TestId(index as u32)
        }
        fn index(self) -> usize {
            self.0 as usize
        }
    }

    #[test]
    fn append_and_replace() {
        let mut g: Graph<TestId, &str, u32> = Graph::new();
        g.add_node(TestId(0), "a");
        g.add_node(TestId(1), "b");
        g.add_edge(TestId(0), TestId(1), 5);
        assert_eq!(g.edges(TestId(0)).len(), 1);

        // Replacing a node drops its edges.
        g.add_node(TestId(0), "c");
        assert_eq!(*g.node_info(TestId(0)), "c");
        assert!(g.edges(TestId(0)).is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn add_node_beyond_len_panics() {
        let mut g: Graph<TestId, (), ()> = Graph::new();
        g.add_node(TestId(1), ());
    }

    #[test]
    #[should_panic(expected = "non-existent node")]
    fn add_edge_from_missing_node_panics() {
        let mut g: Graph<TestId, (), ()> = Graph::new();
        g.add_node(TestId(0), ());
        g.add_edge(TestId(3), TestId(0), ());
    }

    #[test]
    fn remove_edges_from_clears_only_one_adjacency() {
        let mut g: Graph<TestId, (), u32> = Graph::new();
        g.add_node(TestId(0), ());
        g.add_node(TestId(1), ());
        g.add_edge(TestId(0), TestId(1), 1);
        g.add_edge(TestId(1), TestId(0), 2);
        g.remove_edges_from(TestId(0));
        assert!(g.edges(TestId(0)).is_empty());
        assert_eq!(g.edges(TestId(1)).len(), 1);
    }

    #[test]
    fn rollback_restores_prior_state() {
        let mut g: Graph<TestId, u8, u32> = Graph::new();
        g.add_node(TestId(0), 10);
        g.add_node(TestId(1), 11);
        g.add_edge(TestId(0), TestId(1), 1);
        let snapshot = g.clone();

        g.add_node(TestId(2), 12);
        g.add_edge(TestId(2), TestId(0), 2);
        g.add_edge(TestId(0), TestId(2), 3);
        g.add_edge(TestId(1), TestId(2), 4);

        g.remove_edge(TestId(0), TestId(2));
        g.remove_edge(TestId(1), TestId(2));
        let popped = g.remove_last_node().unwrap();
        assert_eq!(popped.info, 12);
        assert_eq!(g, snapshot);
    }
}
