//! Inter-cluster edges: one bidirectional pair per entrance, stepping
//! across the border at the underlying concrete edge cost.

use std::collections::HashMap;

use log::debug;

use super::models::{AbstractEdgeInfo, AbstractNodeId, AbstractNodeInfo, EdgeKind, Entrance};
use crate::concrete::{ConcreteMap, ConcreteNodeId};
use crate::graph::Graph;

#[derive(Clone, Debug, Default)]
pub struct InterStats {
    pub entrances_examined: usize,
    pub edges_created: usize,
}

pub fn build_inter_edges(
    map: &ConcreteMap,
    entrances: &[Entrance],
    node_by_concrete: &HashMap<ConcreteNodeId, AbstractNodeId>,
    graph: &mut Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo>,
) -> InterStats {
    let mut stats = InterStats::default();

    for entrance in entrances {
        stats.entrances_examined += 1;
        let a = node_by_concrete[&entrance.node_a];
        let b = node_by_concrete[&entrance.node_b];
        let forward = crossing_cost(map, entrance.node_a, entrance.node_b);
        let backward = crossing_cost(map, entrance.node_b, entrance.node_a);
        graph.add_edge(a, b, AbstractEdgeInfo { cost: forward, level: 1, kind: EdgeKind::Inter, path: None });
        graph.add_edge(b, a, AbstractEdgeInfo { cost: backward, level: 1, kind: EdgeKind::Inter, path: None });
        stats.edges_created += 2;
    }

    debug!(
        "inter connector: {} edges from {} entrances",
        stats.edges_created, stats.entrances_examined
    );
    stats
}

fn crossing_cost(map: &ConcreteMap, from: ConcreteNodeId, to: ConcreteNodeId) -> u32 {
    map.graph()
        .edges(from)
        .iter()
        .find(|e| e.target == to)
        .unwrap_or_else(|| {
            panic!("entrance sides {} and {} are not adjacent", from.0, to.0)
        })
        .info
        .cost
}
