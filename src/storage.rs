//! Optional SQLite persistence of a built abstraction.
//!
//! The whole abstraction is rewritten per save inside a single transaction,
//! so a database is either the previous abstraction or the new one, never a
//! mix. Loading opens the database read-only and validates the stored grid
//! and configuration against the concrete map supplied by the caller.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::abstraction::cluster_builder;
use crate::abstraction::config::Config;
use crate::abstraction::executor::ExecStats;
use crate::abstraction::models::{
    AbstractEdgeInfo, AbstractNodeId, AbstractNodeInfo, ClusterId, EdgeKind, Entrance, EntranceId,
    Orientation,
};
use crate::concrete::{ConcreteMap, ConcreteNodeId};
use crate::geometry::{Position, TileType};
use crate::graph::Graph;
use crate::pathfinder::HierarchicalMap;

/// Read-only connection for loading a finished abstraction. The only writer
/// holds the file for a single rewrite transaction, so one second covers
/// any save that is still committing.
pub fn open_ro<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    conn.busy_timeout(Duration::from_secs(1))?;
    Ok(conn)
}

pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(1))?;
    // A save is the database's only writer and replaces everything in one
    // transaction, so the default rollback journal is sufficient. The
    // schema leans on its REFERENCES clauses; make SQLite enforce them.
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS clusters (
    cluster_id INTEGER PRIMARY KEY,
    row_index INTEGER NOT NULL,
    col_index INTEGER NOT NULL,
    origin_x INTEGER NOT NULL,
    origin_y INTEGER NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS entrances (
    entrance_id INTEGER PRIMARY KEY,
    cluster_a INTEGER NOT NULL REFERENCES clusters(cluster_id),
    cluster_b INTEGER NOT NULL REFERENCES clusters(cluster_id),
    orientation TEXT NOT NULL CHECK (orientation IN ('H','V')),
    border_coord INTEGER NOT NULL,
    border_offset INTEGER NOT NULL,
    node_a INTEGER NOT NULL,
    node_b INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS abstract_nodes (
    node_id INTEGER PRIMARY KEY,
    cluster_id INTEGER NOT NULL REFERENCES clusters(cluster_id),
    level INTEGER NOT NULL,
    concrete_id INTEGER NOT NULL,
    x INTEGER NOT NULL,
    y INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS abstract_edges (
    edge_id INTEGER PRIMARY KEY,
    src INTEGER NOT NULL REFERENCES abstract_nodes(node_id),
    dst INTEGER NOT NULL REFERENCES abstract_nodes(node_id),
    cost INTEGER NOT NULL,
    level INTEGER NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('inter','intra')),
    path_blob BLOB
);
"#;

#[derive(Clone, Debug, Default)]
pub struct SaveStats {
    pub clusters_written: usize,
    pub entrances_written: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct GridMeta {
    width: i32,
    height: i32,
    tile_type: TileType,
}

pub fn save_abstraction(map: &HierarchicalMap, conn: &mut Connection) -> Result<SaveStats> {
    ensure_schema(conn)?;

    let mut stats = SaveStats::default();
    let grid = GridMeta {
        width: map.concrete().width(),
        height: map.concrete().height(),
        tile_type: map.concrete().tile_type(),
    };
    let config_json = serde_json::to_string(map.config())?;
    let grid_json = serde_json::to_string(&grid)?;

    // Full rewrite keeps the database consistent with exactly one build; a
    // deferred transaction is enough since the opening DELETE takes the
    // write lock before anything else can interleave.
    let tx = conn.transaction()?;
    {
        tx.execute_batch(
            "DELETE FROM abstract_edges;
             DELETE FROM abstract_nodes;
             DELETE FROM entrances;
             DELETE FROM clusters;
             DELETE FROM meta;",
        )?;

        let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
        meta.execute(params!["config", config_json])?;
        meta.execute(params!["grid", grid_json])?;

        let mut ins_cluster = tx.prepare(
            "INSERT INTO clusters (cluster_id, row_index, col_index, origin_x, origin_y, width, height)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
        )?;
        for c in map.layout().clusters() {
            ins_cluster.execute(params![
                c.id.0 as i64,
                c.row,
                c.col,
                c.origin.x,
                c.origin.y,
                c.width,
                c.height
            ])?;
            stats.clusters_written += 1;
        }

        let mut ins_entrance = tx.prepare(
            "INSERT INTO entrances (entrance_id, cluster_a, cluster_b, orientation, border_coord, border_offset, node_a, node_b)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        )?;
        for e in map.entrances() {
            ins_entrance.execute(params![
                e.id.0 as i64,
                e.cluster_a.0 as i64,
                e.cluster_b.0 as i64,
                orientation_tag(e.orientation),
                e.border_coord,
                e.offset,
                e.node_a.0 as i64,
                e.node_b.0 as i64
            ])?;
            stats.entrances_written += 1;
        }

        let graph = map.abstract_graph();
        let mut ins_node = tx.prepare(
            "INSERT INTO abstract_nodes (node_id, cluster_id, level, concrete_id, x, y)
             VALUES (?1,?2,?3,?4,?5,?6)",
        )?;
        for id in graph.ids() {
            let info = graph.node_info(id);
            ins_node.execute(params![
                id.0 as i64,
                info.cluster.0 as i64,
                info.level as i64,
                info.concrete.0 as i64,
                info.position.x,
                info.position.y
            ])?;
            stats.nodes_written += 1;
        }

        let mut ins_edge = tx.prepare(
            "INSERT INTO abstract_edges (edge_id, src, dst, cost, level, kind, path_blob)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
        )?;
        let mut edge_id: i64 = 0;
        for id in graph.ids() {
            for edge in graph.edges(id) {
                let blob = edge.info.path.as_deref().map(encode_path_blob);
                ins_edge.execute(params![
                    edge_id,
                    id.0 as i64,
                    edge.target.0 as i64,
                    edge.info.cost as i64,
                    edge.info.level as i64,
                    kind_tag(edge.info.kind),
                    blob
                ])?;
                edge_id += 1;
                stats.edges_written += 1;
            }
        }
    }
    tx.commit()?;

    Ok(stats)
}

/// Opens `path` read-only and loads the abstraction stored in it.
pub fn load_abstraction_from_path<P: AsRef<Path>>(
    concrete: ConcreteMap,
    path: P,
) -> Result<HierarchicalMap> {
    let conn = open_ro(path)?;
    load_abstraction(concrete, &conn)
}

/// Rebuilds a queryable [`HierarchicalMap`] from a saved abstraction. The
/// supplied concrete map must match the grid the abstraction was built on.
pub fn load_abstraction(concrete: ConcreteMap, conn: &Connection) -> Result<HierarchicalMap> {
    let config_json = read_meta(conn, "config")?;
    let grid_json = read_meta(conn, "grid")?;
    let config: Config = serde_json::from_str(&config_json).context("parsing stored config")?;
    let grid: GridMeta = serde_json::from_str(&grid_json).context("parsing stored grid record")?;
    config.validate()?;

    let actual = GridMeta {
        width: concrete.width(),
        height: concrete.height(),
        tile_type: concrete.tile_type(),
    };
    if grid != actual {
        bail!("stored abstraction is for {:?}, got a {:?} map", grid, actual);
    }

    let (layout, _) = cluster_builder::build_clusters(&concrete, &config);
    let stored_clusters: i64 = conn.query_row("SELECT COUNT(*) FROM clusters", [], |r| r.get(0))?;
    if stored_clusters as usize != layout.len() {
        bail!("stored {} clusters, layout expects {}", stored_clusters, layout.len());
    }

    let mut entrances: Vec<Entrance> = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT entrance_id, cluster_a, cluster_b, orientation, border_coord, border_offset, node_a, node_b
             FROM entrances ORDER BY entrance_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, i32>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;
        for row in rows {
            let (id, a, b, orientation, border_coord, offset, node_a, node_b) = row?;
            entrances.push(Entrance {
                id: EntranceId(id as u32),
                cluster_a: ClusterId(a as u32),
                cluster_b: ClusterId(b as u32),
                orientation: parse_orientation(&orientation)?,
                border_coord,
                offset,
                node_a: ConcreteNodeId(node_a as u32),
                node_b: ConcreteNodeId(node_b as u32),
            });
        }
    }

    let mut graph: Graph<AbstractNodeId, AbstractNodeInfo, AbstractEdgeInfo> = Graph::new();
    let mut node_by_concrete: HashMap<ConcreteNodeId, AbstractNodeId> = HashMap::new();
    let mut cluster_nodes: Vec<Vec<AbstractNodeId>> = vec![Vec::new(); layout.len()];
    {
        let mut stmt = conn.prepare(
            "SELECT node_id, cluster_id, level, concrete_id, x, y FROM abstract_nodes ORDER BY node_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, i32>(5)?,
            ))
        })?;
        for row in rows {
            let (node_id, cluster_id, level, concrete_id, x, y) = row?;
            let id = AbstractNodeId(node_id as u32);
            if id.0 as usize != graph.len() {
                bail!("abstract node ids are not dense at {}", node_id);
            }
            let cluster = ClusterId(cluster_id as u32);
            let concrete_node = ConcreteNodeId(concrete_id as u32);
            graph.add_node(
                id,
                AbstractNodeInfo {
                    cluster,
                    level: level as u8,
                    concrete: concrete_node,
                    position: Position::new(x, y),
                },
            );
            node_by_concrete.insert(concrete_node, id);
            cluster_nodes
                .get_mut(cluster.0 as usize)
                .ok_or_else(|| anyhow!("node {} references unknown cluster {}", node_id, cluster_id))?
                .push(id);
        }
    }

    let mut inter_edges = 0usize;
    let mut intra_edges = 0usize;
    {
        let mut stmt = conn.prepare(
            "SELECT src, dst, cost, level, kind, path_blob FROM abstract_edges ORDER BY edge_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<Vec<u8>>>(5)?,
            ))
        })?;
        for row in rows {
            let (src, dst, cost, level, kind, blob) = row?;
            let kind = parse_kind(&kind)?;
            match kind {
                EdgeKind::Inter => inter_edges += 1,
                EdgeKind::Intra => intra_edges += 1,
            }
            let path = blob.map(|b| decode_path_blob(&b)).transpose()?;
            graph.add_edge(
                AbstractNodeId(src as u32),
                AbstractNodeId(dst as u32),
                AbstractEdgeInfo { cost: cost as u32, level: level as u8, kind, path },
            );
        }
    }

    let stats = ExecStats {
        clusters_created: layout.len(),
        entrances_created: entrances.len(),
        abstract_nodes_created: graph.len(),
        inter_edges_created: inter_edges,
        intra_edges_created: intra_edges,
    };

    Ok(HierarchicalMap::assemble(
        concrete,
        config,
        layout,
        entrances,
        graph,
        node_by_concrete,
        cluster_nodes,
        stats,
    ))
}

fn read_meta(conn: &Connection, key: &str) -> Result<String> {
    conn.query_row("SELECT value FROM meta WHERE key=?1", [key], |r| r.get(0))
        .optional()?
        .ok_or_else(|| anyhow!("meta key {:?} missing; not an abstraction database?", key))
}

fn orientation_tag(o: Orientation) -> &'static str {
    match o {
        Orientation::Horizontal => "H",
        Orientation::Vertical => "V",
    }
}

fn parse_orientation(tag: &str) -> Result<Orientation> {
    match tag {
        "H" => Ok(Orientation::Horizontal),
        "V" => Ok(Orientation::Vertical),
        other => Err(anyhow!("unknown orientation tag {:?}", other)),
    }
}

fn kind_tag(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Inter => "inter",
        EdgeKind::Intra => "intra",
    }
}

fn parse_kind(tag: &str) -> Result<EdgeKind> {
    match tag {
        "inter" => Ok(EdgeKind::Inter),
        "intra" => Ok(EdgeKind::Intra),
        other => Err(anyhow!("unknown edge kind {:?}", other)),
    }
}

// Cached paths are chains of single-tile moves, so only the first tile needs
// absolute coordinates (two little-endian i32). Every later tile is one byte
// packing its step as ((dx + 1) << 2) | (dy + 1), dx and dy in -1..=1.

fn encode_path_blob(path: &[Position]) -> Vec<u8> {
    let Some((first, rest)) = path.split_first() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(8 + rest.len());
    out.extend_from_slice(&first.x.to_le_bytes());
    out.extend_from_slice(&first.y.to_le_bytes());
    let mut previous = *first;
    for &p in rest {
        let dx = p.x - previous.x;
        let dy = p.y - previous.y;
        debug_assert!((-1..=1).contains(&dx) && (-1..=1).contains(&dy));
        out.push((((dx + 1) as u8) << 2) | ((dy + 1) as u8));
        previous = p;
    }
    out
}

fn decode_path_blob(blob: &[u8]) -> Result<Vec<Position>> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    if blob.len() < 8 {
        bail!("path blob too short: {} bytes", blob.len());
    }
    let x = i32::from_le_bytes(blob[0..4].try_into().unwrap());
    let y = i32::from_le_bytes(blob[4..8].try_into().unwrap());
    let mut current = Position::new(x, y);
    let mut path = Vec::with_capacity(blob.len() - 7);
    path.push(current);
    for &step in &blob[8..] {
        let dx = (step >> 2) as i32 - 1;
        let dy = (step & 0b11) as i32 - 1;
        if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dy) || (dx == 0 && dy == 0) {
            bail!("invalid step byte {:#04x} in path blob", step);
        }
        current = Position::new(current.x + dx, current.y + dy);
        path.push(current);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::executor::build_abstraction;
    use crate::geometry::TileType;
    use tempfile::NamedTempFile;

    fn walled_oracle(p: Position) -> (bool, u32) {
        // Vertical wall at x == 3 with a gap at y == 2.
        (p.x != 3 || p.y == 2, 1)
    }

    fn build_map() -> HierarchicalMap {
        let concrete = ConcreteMap::build(8, 8, TileType::Octile, &walled_oracle).unwrap();
        let cfg = Config { cluster_size: 4, ..Config::default() };
        build_abstraction(concrete, cfg).unwrap()
    }

    #[test]
    fn schema_creates_required_tables() -> Result<()> {
        let tmp = NamedTempFile::new().unwrap();
        let conn = open_rw(tmp.path())?;
        ensure_schema(&conn)?;
        for table in ["meta", "clusters", "entrances", "abstract_nodes", "abstract_edges"] {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .optional()?;
            assert!(exists.is_some(), "expected table {} to exist", table);
        }
        Ok(())
    }

    #[test]
    fn round_trip_preserves_graph_and_queries() -> Result<()> {
        let tmp = NamedTempFile::new().unwrap();
        let mut original = build_map();

        let mut conn = open_rw(tmp.path())?;
        let stats = save_abstraction(&original, &mut conn)?;
        assert_eq!(stats.nodes_written, original.abstract_graph().len());

        let concrete = ConcreteMap::build(8, 8, TileType::Octile, &walled_oracle).unwrap();
        let mut loaded = load_abstraction_from_path(concrete, tmp.path())?;

        assert_eq!(loaded.abstract_graph(), original.abstract_graph());
        assert_eq!(loaded.entrances(), original.entrances());
        assert_eq!(loaded.config(), original.config());

        let a = Position::new(0, 0);
        let b = Position::new(7, 7);
        assert_eq!(loaded.find_path(a, b)?, original.find_path(a, b)?);
        Ok(())
    }

    #[test]
    fn saving_twice_is_idempotent() -> Result<()> {
        let tmp = NamedTempFile::new().unwrap();
        let original = build_map();
        let mut conn = open_rw(tmp.path())?;
        let first = save_abstraction(&original, &mut conn)?;
        let second = save_abstraction(&original, &mut conn)?;
        assert_eq!(first.edges_written, second.edges_written);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM abstract_edges", [], |r| r.get(0))?;
        assert_eq!(count as usize, second.edges_written);
        Ok(())
    }

    #[test]
    fn malformed_path_blobs_are_rejected() {
        assert!(decode_path_blob(&[1, 2, 3]).is_err());

        let mut blob = encode_path_blob(&[Position::new(2, 2), Position::new(3, 2)]);
        blob.push(0b0101); // a (0, 0) step is not a move
        assert!(decode_path_blob(&blob).is_err());
        blob.pop();
        blob.push(0xff); // delta out of the single-tile range
        assert!(decode_path_blob(&blob).is_err());
    }

    #[test]
    fn rejects_a_mismatched_grid() -> Result<()> {
        let tmp = NamedTempFile::new().unwrap();
        let original = build_map();
        let mut conn = open_rw(tmp.path())?;
        save_abstraction(&original, &mut conn)?;

        let other = ConcreteMap::build(16, 16, TileType::Octile, &walled_oracle).unwrap();
        assert!(load_abstraction(other, &conn).is_err());
        Ok(())
    }
}
