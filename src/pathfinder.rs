//! Query-time hierarchical pathfinder.
//!
//! Queries insert temporary abstract nodes for the endpoints, search the
//! abstract graph, refine the abstract path back into concrete tiles and
//! roll the insertions back. The abstract graph compares equal before and
//! after every query, whether it succeeds or not.

use std::collections::HashMap;

use anyhow::{bail, Result};
use log::trace;

use crate::abstraction::cluster_builder::ClusterLayout;
use crate::abstraction::config::Config;
use crate::abstraction::executor::ExecStats;
use crate::abstraction::models::{
    AbstractEdgeInfo, AbstractNodeId, AbstractNodeInfo, ClusterId, EdgeKind, Entrance,
};
use crate::concrete::{ConcreteMap, ConcreteNodeId};
use crate::geometry::Position;
use crate::graph::{Graph, GraphId};
use crate::search;
use crate::smoothing;

pub struct HierarchicalMap {
    concrete: ConcreteMap,
    config: Config,
    layout: ClusterLayout,
    entrances: Vec<Entrance>,
    graph: Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo>,
    node_by_concrete: HashMap<ConcreteNodeId, AbstractNodeId>,
    cluster_nodes: Vec<Vec<AbstractNodeId>>,
    stats: ExecStats,
}

struct InsertedEndpoint {
    id: AbstractNodeId,
    temporary: bool,
    /// Pre-existing nodes that received an edge into the temporary node.
    linked: Vec<AbstractNodeId>,
}

impl HierarchicalMap {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        concrete: ConcreteMap,
        config: Config,
        layout: ClusterLayout,
        entrances: Vec<Entrance>,
        graph: Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo>,
        node_by_concrete: HashMap<ConcreteNodeId, AbstractNodeId>,
        cluster_nodes: Vec<Vec<AbstractNodeId>>,
        stats: ExecStats,
    ) -> Self {
        Self { concrete, config, layout, entrances, graph, node_by_concrete, cluster_nodes, stats }
    }

    pub fn concrete(&self) -> &ConcreteMap {
        &self.concrete
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &ClusterLayout {
        &self.layout
    }

    pub fn entrances(&self) -> &[Entrance] {
        &self.entrances
    }

    pub fn abstract_graph(&self) -> &Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo> {
        &self.graph
    }

    pub fn build_stats(&self) -> &ExecStats {
        &self.stats
    }

    /// Shortest hierarchical path from `start` to `goal`, as concrete tile
    /// positions. Out-of-bounds endpoints are an error; unreachable or
    /// obstacle endpoints give an empty path.
    pub fn find_path(&mut self, start: Position, goal: Position) -> Result<Vec<Position>> {
        if !self.concrete.in_bounds(start) || !self.concrete.in_bounds(goal) {
            bail!(
                "endpoint out of bounds: {:?} -> {:?} on a {}x{} grid",
                start,
                goal,
                self.concrete.width(),
                self.concrete.height()
            );
        }
        if !self.concrete.is_passable(start) || !self.concrete.is_passable(goal) {
            return Ok(Vec::new());
        }
        if start == goal {
            return Ok(vec![start]);
        }

        let start_cluster = self.layout.cluster_at(start);
        let goal_cluster = self.layout.cluster_at(goal);
        if start_cluster == goal_cluster {
            let cluster = self.layout.cluster(start_cluster);
            if let Some((_, path)) =
                self.concrete.find_path_restricted(start, goal, |p| cluster.contains(p))
            {
                return Ok(self.finish(path));
            }
            // Cluster internally split by obstacles; the connecting path, if
            // any, leaves the cluster. Fall through to the hierarchy.
        }

        let watermark = self.graph.len();
        let inserted_start = self.insert_endpoint(start, start_cluster);
        let inserted_goal = self.insert_endpoint(goal, goal_cluster);

        let refined = self.search_and_refine(inserted_start.id, inserted_goal.id, goal);

        self.rollback(inserted_goal);
        self.rollback(inserted_start);
        debug_assert_eq!(self.graph.len(), watermark);

        match refined {
            Some(path) => Ok(self.finish(path)),
            None => {
                trace!("no abstract route {:?} -> {:?}", start, goal);
                Ok(Vec::new())
            }
        }
    }

    fn search_and_refine(
        &self,
        start_id: AbstractNodeId,
        goal_id: AbstractNodeId,
        goal: Position,
    ) -> Option<Vec<Position>> {
        let graph = &self.graph;
        let tile_type = self.concrete.tile_type();
        let result = search::astar(
            graph,
            start_id,
            goal_id,
            |info: &AbstractEdgeInfo| info.cost,
            |id| tile_type.heuristic(graph.node_info(id).position, goal),
            |_| true,
        )?;
        Some(self.refine(&result.nodes))
    }

    /// Binds `position` to an abstract node, creating a temporary one with
    /// intra-edges to its cluster's transition nodes unless the tile already
    /// is a transition.
    fn insert_endpoint(&mut self, position: Position, cluster_id: ClusterId) -> InsertedEndpoint {
        let concrete_id = self.concrete.node_id(position);
        if let Some(&existing) = self.node_by_concrete.get(&concrete_id) {
            return InsertedEndpoint { id: existing, temporary: false, linked: Vec::new() };
        }

        let id = AbstractNodeId(self.graph.len() as u32);
        self.graph.add_node(
            id,
            AbstractNodeInfo { cluster: cluster_id, level: 1, concrete: concrete_id, position },
        );

        let cluster = self.layout.cluster(cluster_id).clone();
        let transitions = self.cluster_nodes[cluster_id.0 as usize].clone();
        let mut linked = Vec::with_capacity(transitions.len());
        for transition in transitions {
            let target = self.graph.node_info(transition).position;
            if let Some((cost, path)) =
                self.concrete.find_path_restricted(position, target, |p| cluster.contains(p))
            {
                let forward = self.config.store_paths.then(|| path.clone());
                let backward = self.config.store_paths.then(|| {
                    let mut r = path;
                    r.reverse();
                    r
                });
                self.graph.add_edge(
                    id,
                    transition,
                    AbstractEdgeInfo { cost, level: 1, kind: EdgeKind::Intra, path: forward },
                );
                self.graph.add_edge(
                    transition,
                    id,
                    AbstractEdgeInfo { cost, level: 1, kind: EdgeKind::Intra, path: backward },
                );
                linked.push(transition);
            }
        }

        InsertedEndpoint { id, temporary: true, linked }
    }

    /// Removes a temporary endpoint. Insertions roll back LIFO, so the node
    /// being removed is always the graph's tail.
    fn rollback(&mut self, inserted: InsertedEndpoint) {
        if !inserted.temporary {
            return;
        }
        for src in inserted.linked {
            self.graph.remove_edge(src, inserted.id);
        }
        let popped = self.graph.remove_last_node();
        debug_assert!(popped.is_some());
        debug_assert_eq!(self.graph.len(), inserted.id.index());
    }

    /// Expands an abstract node sequence into concrete tiles, stitching the
    /// per-edge segments without duplicating joint tiles.
    fn refine(&self, nodes: &[AbstractNodeId]) -> Vec<Position> {
        let mut full: Vec<Position> = Vec::new();
        for pair in nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let edge = self
                .graph
                .edges(a)
                .iter()
                .filter(|e| e.target == b)
                .min_by_key(|e| e.info.cost)
                .unwrap_or_else(|| panic!("abstract path step {} -> {} has no edge", a.0, b.0));

            let segment: Vec<Position> = match edge.info.kind {
                EdgeKind::Inter => {
                    vec![self.graph.node_info(a).position, self.graph.node_info(b).position]
                }
                EdgeKind::Intra => match &edge.info.path {
                    Some(cached) => cached.clone(),
                    None => {
                        let from = self.graph.node_info(a).position;
                        let to = self.graph.node_info(b).position;
                        let cluster = self.layout.cluster(self.graph.node_info(a).cluster);
                        self.concrete
                            .find_path_restricted(from, to, |p| cluster.contains(p))
                            .map(|(_, p)| p)
                            .unwrap_or_else(|| {
                                panic!("intra edge {} -> {} lost its concrete path", a.0, b.0)
                            })
                    }
                },
            };

            if full.last() == segment.first() {
                full.extend_from_slice(&segment[1..]);
            } else {
                full.extend_from_slice(&segment);
            }
        }
        full
    }

    fn finish(&self, path: Vec<Position>) -> Vec<Position> {
        if self.config.smooth_paths {
            smoothing::smooth(&self.concrete, path)
        } else {
            path
        }
    }
}
