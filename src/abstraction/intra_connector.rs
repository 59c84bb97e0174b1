//! Intra-cluster edges: restricted all-pairs shortest paths between the
//! transition nodes of each cluster.
//!
//! Clusters are independent, so the searches fan out over rayon; results
//! are merged back in cluster order, keeping the built graph identical for
//! any thread count.

use log::debug;
use rayon::prelude::*;

use super::cluster_builder::ClusterLayout;
use super::config::Config;
use super::models::{AbstractEdgeInfo, AbstractNodeId, AbstractNodeInfo, EdgeKind};
use crate::concrete::ConcreteMap;
use crate::geometry::Position;
use crate::graph::Graph;

#[derive(Clone, Debug, Default)]
pub struct IntraStats {
    pub clusters_processed: usize,
    pub edges_created: usize,
}

struct IntraEdge {
    a: AbstractNodeId,
    b: AbstractNodeId,
    cost: u32,
    path: Option<Vec<Position>>,
}

pub fn build_intra_edges(
    map: &ConcreteMap,
    layout: &ClusterLayout,
    cluster_nodes: &[Vec<AbstractNodeId>],
    graph: &mut Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo>,
    cfg: &Config,
) -> IntraStats {
    let mut stats = IntraStats::default();

    let built: &Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo> = graph;
    let batches: Vec<Vec<IntraEdge>> = (0..layout.len())
        .into_par_iter()
        .map(|idx| connect_cluster(map, layout, cluster_nodes, built, idx, cfg.store_paths))
        .collect();

    for batch in batches {
        if !batch.is_empty() {
            stats.clusters_processed += 1;
        }
        for edge in batch {
            let reversed = edge.path.as_ref().map(|p| {
                let mut r = p.clone();
                r.reverse();
                r
            });
            graph.add_edge(
                edge.a,
                edge.b,
                AbstractEdgeInfo { cost: edge.cost, level: 1, kind: EdgeKind::Intra, path: edge.path },
            );
            graph.add_edge(
                edge.b,
                edge.a,
                AbstractEdgeInfo { cost: edge.cost, level: 1, kind: EdgeKind::Intra, path: reversed },
            );
            stats.edges_created += 2;
        }
    }

    debug!(
        "intra connector: {} edges across {} clusters",
        stats.edges_created, stats.clusters_processed
    );
    stats
}

fn connect_cluster(
    map: &ConcreteMap,
    layout: &ClusterLayout,
    cluster_nodes: &[Vec<AbstractNodeId>],
    graph: &Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo>,
    cluster_idx: usize,
    store_paths: bool,
) -> Vec<IntraEdge> {
    let nodes = &cluster_nodes[cluster_idx];
    if nodes.len() < 2 {
        return Vec::new();
    }
    let cluster = &layout.clusters()[cluster_idx];

    let mut edges = Vec::new();
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            let from = graph.node_info(nodes[i]).position;
            let to = graph.node_info(nodes[j]).position;
            if let Some((cost, path)) =
                map.find_path_restricted(from, to, |p| cluster.contains(p))
            {
                edges.push(IntraEdge {
                    a: nodes[i],
                    b: nodes[j],
                    cost,
                    path: store_paths.then_some(path),
                });
            }
        }
    }
    edges
}
