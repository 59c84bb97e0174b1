//! Runs the abstraction stages in order (clusters, entrances, abstract
//! nodes, inter edges, intra edges), validating each before the next.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use log::info;

use super::cluster_builder::{self, ClusterLayout};
use super::config::Config;
use super::entrance_discovery;
use super::inter_connector;
use super::intra_connector;
use super::models::{AbstractEdgeInfo, AbstractNodeId, AbstractNodeInfo, Entrance};
use crate::concrete::{ConcreteMap, ConcreteNodeId};
use crate::graph::Graph;
use crate::pathfinder::HierarchicalMap;

#[derive(Clone, Debug, Default)]
pub struct ExecStats {
    pub clusters_created: usize,
    pub entrances_created: usize,
    pub abstract_nodes_created: usize,
    pub inter_edges_created: usize,
    pub intra_edges_created: usize,
}

/// Builds the queryable hierarchical map from a concrete grid graph.
pub fn build_abstraction(concrete: ConcreteMap, cfg: Config) -> Result<HierarchicalMap> {
    cfg.validate()?;

    let (layout, build_stats) = cluster_builder::build_clusters(&concrete, &cfg);
    validate_layout(&concrete, &layout)?;

    let (entrances, entrance_stats) = entrance_discovery::discover_entrances(&concrete, &layout, &cfg);
    validate_entrances(&concrete, &entrances)?;

    let (mut graph, node_by_concrete, cluster_nodes) =
        create_abstract_nodes(&concrete, &layout, &entrances);

    let inter_stats =
        inter_connector::build_inter_edges(&concrete, &entrances, &node_by_concrete, &mut graph);

    let intra_stats = match cfg.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()?
            .install(|| {
                intra_connector::build_intra_edges(&concrete, &layout, &cluster_nodes, &mut graph, &cfg)
            }),
        None => intra_connector::build_intra_edges(&concrete, &layout, &cluster_nodes, &mut graph, &cfg),
    };

    validate_edges(&graph)?;

    let stats = ExecStats {
        clusters_created: build_stats.clusters_created,
        entrances_created: entrance_stats.entrances_created,
        abstract_nodes_created: graph.len(),
        inter_edges_created: inter_stats.edges_created,
        intra_edges_created: intra_stats.edges_created,
    };
    info!(
        "abstraction built: {} clusters, {} entrances, {} nodes, {} inter + {} intra edges",
        stats.clusters_created,
        stats.entrances_created,
        stats.abstract_nodes_created,
        stats.inter_edges_created,
        stats.intra_edges_created
    );

    Ok(HierarchicalMap::assemble(concrete, cfg, layout, entrances, graph, node_by_concrete, cluster_nodes, stats))
}

/// One abstract node per distinct concrete transition cell; entrances
/// sharing a cell coalesce onto the same node.
fn create_abstract_nodes(
    map: &ConcreteMap,
    layout: &ClusterLayout,
    entrances: &[Entrance],
) -> (
    Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo>,
    HashMap<ConcreteNodeId, AbstractNodeId>,
    Vec<Vec<AbstractNodeId>>,
) {
    let mut graph = Graph::new();
    let mut node_by_concrete: HashMap<ConcreteNodeId, AbstractNodeId> = HashMap::new();
    let mut cluster_nodes: Vec<Vec<AbstractNodeId>> = vec![Vec::new(); layout.len()];

    for entrance in entrances {
        for (concrete, cluster) in [
            (entrance.node_a, entrance.cluster_a),
            (entrance.node_b, entrance.cluster_b),
        ] {
            node_by_concrete.entry(concrete).or_insert_with(|| {
                let id = AbstractNodeId(graph.len() as u32);
                graph.add_node(
                    id,
                    AbstractNodeInfo { cluster, level: 1, concrete, position: map.position(concrete) },
                );
                cluster_nodes[cluster.0 as usize].push(id);
                id
            });
        }
    }

    (graph, node_by_concrete, cluster_nodes)
}

fn validate_layout(map: &ConcreteMap, layout: &ClusterLayout) -> Result<()> {
    let expected = (layout.rows() * layout.cols()) as usize;
    if layout.len() != expected {
        return Err(anyhow!("layout holds {} clusters, expected {}", layout.len(), expected));
    }
    let covered: i64 = layout.clusters().iter().map(|c| (c.width * c.height) as i64).sum();
    if covered != (map.width() as i64) * (map.height() as i64) {
        return Err(anyhow!("clusters cover {} tiles, grid has {}", covered, map.width() * map.height()));
    }
    Ok(())
}

fn validate_entrances(map: &ConcreteMap, entrances: &[Entrance]) -> Result<()> {
    for e in entrances {
        let a = map.position(e.node_a);
        let b = map.position(e.node_b);
        if (a.x - b.x).abs() + (a.y - b.y).abs() != 1 {
            return Err(anyhow!("entrance {} sides {:?} and {:?} are not adjacent", e.id.0, a, b));
        }
        if !map.is_passable(a) || !map.is_passable(b) {
            return Err(anyhow!("entrance {} touches an obstacle", e.id.0));
        }
    }
    Ok(())
}

fn validate_edges(graph: &Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo>) -> Result<()> {
    for id in graph.ids() {
        for edge in graph.edges(id) {
            if edge.info.cost == 0 {
                return Err(anyhow!(
                    "zero-cost abstract edge {} -> {}",
                    id.0,
                    edge.target.0
                ));
            }
        }
    }
    Ok(())
}
