//! Fixed-size cluster decomposition of the grid.

use log::debug;

use super::config::Config;
use super::models::{Cluster, ClusterId};
use crate::concrete::ConcreteMap;
use crate::geometry::Position;

#[derive(Clone, Debug, Default)]
pub struct BuildStats {
    pub clusters_created: usize,
    pub rows: i32,
    pub cols: i32,
}

/// Row-major cluster grid with constant-time lookups in both directions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterLayout {
    cluster_size: i32,
    rows: i32,
    cols: i32,
    clusters: Vec<Cluster>,
}

impl ClusterLayout {
    pub fn cluster_size(&self) -> i32 {
        self.cluster_size
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> &Cluster {
        &self.clusters[id.0 as usize]
    }

    pub fn id_for(&self, row: i32, col: i32) -> ClusterId {
        debug_assert!(row >= 0 && row < self.rows && col >= 0 && col < self.cols);
        ClusterId((row * self.cols + col) as u32)
    }

    pub fn cluster_at(&self, position: Position) -> ClusterId {
        self.id_for(position.y / self.cluster_size, position.x / self.cluster_size)
    }
}

pub fn build_clusters(map: &ConcreteMap, cfg: &Config) -> (ClusterLayout, BuildStats) {
    let cs = cfg.cluster_size;
    let rows = (map.height() + cs - 1) / cs;
    let cols = (map.width() + cs - 1) / cs;

    let mut clusters = Vec::with_capacity((rows * cols) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let origin = Position::new(col * cs, row * cs);
            let width = cs.min(map.width() - origin.x);
            let height = cs.min(map.height() - origin.y);
            clusters.push(Cluster {
                id: ClusterId((row * cols + col) as u32),
                row,
                col,
                origin,
                width,
                height,
            });
        }
    }

    let stats = BuildStats { clusters_created: clusters.len(), rows, cols };
    debug!(
        "cluster layout: {} clusters ({} rows x {} cols, size {})",
        stats.clusters_created, rows, cols, cs
    );
    (ClusterLayout { cluster_size: cs, rows, cols, clusters }, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TileType;

    fn open(width: i32, height: i32) -> ConcreteMap {
        ConcreteMap::build(width, height, TileType::Octile, &|_p: Position| (true, 1)).unwrap()
    }

    fn cfg(cluster_size: i32) -> Config {
        Config { cluster_size, ..Config::default() }
    }

    #[test]
    fn tiles_the_grid_row_major() {
        let (layout, stats) = build_clusters(&open(8, 8), &cfg(4));
        assert_eq!(stats.clusters_created, 4);
        assert_eq!((stats.rows, stats.cols), (2, 2));
        assert_eq!(layout.cluster(ClusterId(2)).origin, Position::new(0, 4));
    }

    #[test]
    fn truncates_the_last_row_and_column() {
        let (layout, stats) = build_clusters(&open(10, 10), &cfg(4));
        assert_eq!(stats.clusters_created, 9);
        let last = layout.cluster(ClusterId(8));
        assert_eq!(last.origin, Position::new(8, 8));
        assert_eq!((last.width, last.height), (2, 2));
    }

    #[test]
    fn lookup_is_consistent_both_directions() {
        let (layout, _) = build_clusters(&open(10, 10), &cfg(4));
        for cluster in layout.clusters() {
            assert_eq!(layout.id_for(cluster.row, cluster.col), cluster.id);
            assert_eq!(layout.cluster_at(cluster.origin), cluster.id);
            let inner = Position::new(
                cluster.origin.x + cluster.width - 1,
                cluster.origin.y + cluster.height - 1,
            );
            assert_eq!(layout.cluster_at(inner), cluster.id);
        }
    }
}
