//! A* over any graph container instance. Binary-heap open list, flat
//! closed set, deterministic tie-breaking on (f, h, id).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::{Graph, GraphId};

pub struct SearchResult<Id> {
    pub cost: u32,
    pub nodes: Vec<Id>,
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct OpenEntry {
    f: u32,
    h: u32,
    index: usize,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Inverted so the max-heap pops the lowest f, then lowest h, then
        // lowest id.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs A* from `start` to `goal`. `filter` decides which nodes may be
/// expanded or entered; the heuristic must never overestimate.
pub fn astar<Id, NI, EI>(
    graph: &Graph<Id, NI, EI>,
    start: Id,
    goal: Id,
    edge_cost: impl Fn(&EI) -> u32,
    heuristic: impl Fn(Id) -> u32,
    filter: impl Fn(Id) -> bool,
) -> Option<SearchResult<Id>>
where
    Id: GraphId,
{
    if !filter(start) || !filter(goal) {
        return None;
    }
    if start == goal {
        return Some(SearchResult { cost: 0, nodes: vec![start] });
    }

    let len = graph.len();
    let mut g_score = vec![u32::MAX; len];
    let mut parent: Vec<Option<Id>> = vec![None; len];
    let mut closed = vec![false; len];
    let mut open = BinaryHeap::new();

    g_score[start.index()] = 0;
    let h0 = heuristic(start);
    open.push(OpenEntry { f: h0, h: h0, index: start.index() });

    while let Some(OpenEntry { index, .. }) = open.pop() {
        if closed[index] {
            continue;
        }
        closed[index] = true;
        let id = Id::from_index(index);
        if id == goal {
            return Some(SearchResult {
                cost: g_score[index],
                nodes: reconstruct(&parent, goal),
            });
        }

        for edge in graph.edges(id) {
            let target = edge.target;
            let t_index = target.index();
            if closed[t_index] || !filter(target) {
                continue;
            }
            let tentative = g_score[index].saturating_add(edge_cost(&edge.info));
            if tentative < g_score[t_index] {
                g_score[t_index] = tentative;
                parent[t_index] = Some(id);
                let h = heuristic(target);
                open.push(OpenEntry { f: tentative + h, h, index: t_index });
            }
        }
    }

    None
}

/// Zero-heuristic wrapper; the reference search in tests and validations.
pub fn dijkstra<Id, NI, EI>(
    graph: &Graph<Id, NI, EI>,
    start: Id,
    goal: Id,
    edge_cost: impl Fn(&EI) -> u32,
    filter: impl Fn(Id) -> bool,
) -> Option<SearchResult<Id>>
where
    Id: GraphId,
{
    astar(graph, start, goal, edge_cost, |_| 0, filter)
}

fn reconstruct<Id: GraphId>(parent: &[Option<Id>], goal: Id) -> Vec<Id> {
    let mut nodes = vec![goal];
    let mut current = goal;
    while let Some(prev) = parent[current.index()] {
        nodes.push(prev);
        current = prev;
    }
    nodes.reverse();
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

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

    fn diamond() -> Graph<TestId, (), u32> {
        // 0 -> {1, 2} -> 3, both branches cost 2 in total.
        let mut g = Graph::new();
        for i in 0..4 {
            g.add_node(TestId(i), ());
        }
        g.add_edge(TestId(0), TestId(1), 1);
        g.add_edge(TestId(0), TestId(2), 1);
        g.add_edge(TestId(1), TestId(3), 1);
        g.add_edge(TestId(2), TestId(3), 1);
        g
    }

    #[test]
    fn finds_shortest_path() {
        let g = diamond();
        let r = dijkstra(&g, TestId(0), TestId(3), |&c| c, |_| true).unwrap();
        assert_eq!(r.cost, 2);
        assert_eq!(r.nodes.len(), 3);
    }

    #[test]
    fn equal_cost_ties_break_on_lower_id() {
        let g = diamond();
        let r = dijkstra(&g, TestId(0), TestId(3), |&c| c, |_| true).unwrap();
        assert_eq!(r.nodes, vec![TestId(0), TestId(1), TestId(3)]);
    }

    #[test]
    fn filter_blocks_expansion() {
        let g = diamond();
        let r = dijkstra(&g, TestId(0), TestId(3), |&c| c, |id| id != TestId(1)).unwrap();
        assert_eq!(r.nodes, vec![TestId(0), TestId(2), TestId(3)]);
        assert!(dijkstra(&g, TestId(0), TestId(3), |&c| c, |id| id.0 < 3).is_none());
    }

    #[test]
    fn start_equals_goal() {
        let g = diamond();
        let r = astar(&g, TestId(2), TestId(2), |&c| c, |_| 0, |_| true).unwrap();
        assert_eq!(r.cost, 0);
        assert_eq!(r.nodes, vec![TestId(2)]);
    }

    #[test]
    fn unreachable_returns_none() {
        let mut g: Graph<TestId, (), u32> = Graph::new();
        g.add_node(TestId(0), ());
        g.add_node(TestId(1), ());
        assert!(dijkstra(&g, TestId(0), TestId(1), |&c| c, |_| true).is_none());
    }
}
