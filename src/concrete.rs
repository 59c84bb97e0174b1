//! Concrete grid graph: one node per tile, edges per the tile-type
//! connectivity rules. The graph is topology-complete; obstacles are
//! filtered at search time, not build time.

use anyhow::{bail, Result};

use crate::geometry::{Offset, Position, TileType};
use crate::graph::{Graph, GraphId};
use crate::search::{self, SearchResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConcreteNodeId(pub u32);

impl GraphId for ConcreteNodeId {
    fn from_index(index: usize) -> Self {
        ConcreteNodeId(index as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TileInfo {
    pub position: Position,
    pub is_obstacle: bool,
    pub cost: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MoveCost {
    pub cost: u32,
}

/// Injected capability deciding which tiles can be entered and at what base
/// cost. Must be pure and total over the grid.
pub trait Passability {
    fn can_enter(&self, position: Position) -> (bool, u32);
}

impl<F> Passability for F
where
    F: Fn(Position) -> (bool, u32),
{
    fn can_enter(&self, position: Position) -> (bool, u32) {
        self(position)
    }
}

pub struct ConcreteMap {
    width: i32,
    height: i32,
    tile_type: TileType,
    graph: Graph<ConcreteNodeId, TileInfo, MoveCost>,
}

impl ConcreteMap {
    pub fn build(
        width: i32,
        height: i32,
        tile_type: TileType,
        passability: &dyn Passability,
    ) -> Result<Self> {
        if width <= 0 || height <= 0 {
            bail!("grid dimensions must be positive, got {}x{}", width, height);
        }

        let mut graph = Graph::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let position = Position::new(x, y);
                let (passable, cost) = passability.can_enter(position);
                if passable && cost == 0 {
                    // Zero-cost tiles would break the admissibility of the
                    // search heuristics.
                    bail!("passable tile {:?} has zero cost", position);
                }
                let id = ConcreteNodeId((y * width + x) as u32);
                graph.add_node(id, TileInfo { position, is_obstacle: !passable, cost });
            }
        }

        let mut map = Self { width, height, tile_type, graph };
        map.link_neighbors();
        Ok(map)
    }

    fn link_neighbors(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let position = Position::new(x, y);
                let src = self.node_id(position);
                for &Offset(dx, dy) in self.tile_type.neighbor_offsets(position) {
                    let neighbor = Position::new(x + dx, y + dy);
                    if !self.in_bounds(neighbor) {
                        continue;
                    }
                    let dst = self.node_id(neighbor);
                    let cost =
                        self.tile_type.step_cost(Offset(dx, dy), self.graph.node_info(dst).cost);
                    self.graph.add_edge(src, dst, MoveCost { cost });
                }
            }
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tile_type(&self) -> TileType {
        self.tile_type
    }

    pub fn graph(&self) -> &Graph<ConcreteNodeId, TileInfo, MoveCost> {
        &self.graph
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0 && position.x < self.width && position.y >= 0 && position.y < self.height
    }

    pub fn node_id(&self, position: Position) -> ConcreteNodeId {
        debug_assert!(self.in_bounds(position));
        ConcreteNodeId((position.y * self.width + position.x) as u32)
    }

    pub fn position(&self, id: ConcreteNodeId) -> Position {
        self.graph.node_info(id).position
    }

    pub fn is_passable(&self, position: Position) -> bool {
        self.in_bounds(position) && !self.graph.node_info(self.node_id(position)).is_obstacle
    }

    /// Shortest path expanding only passable tiles accepted by `filter`.
    pub fn find_path_restricted(
        &self,
        start: Position,
        goal: Position,
        filter: impl Fn(Position) -> bool,
    ) -> Option<(u32, Vec<Position>)> {
        if !self.is_passable(start) || !self.is_passable(goal) {
            return None;
        }
        let graph = &self.graph;
        let result: SearchResult<ConcreteNodeId> = search::astar(
            graph,
            self.node_id(start),
            self.node_id(goal),
            |info: &MoveCost| info.cost,
            |id| self.tile_type.heuristic(graph.node_info(id).position, goal),
            |id| {
                let info = graph.node_info(id);
                !info.is_obstacle && filter(info.position)
            },
        )?;
        let positions = result.nodes.iter().map(|&id| graph.node_info(id).position).collect();
        Some((result.cost, positions))
    }

    /// Shortest path over the whole grid, obstacles skipped.
    pub fn find_path(&self, start: Position, goal: Position) -> Option<(u32, Vec<Position>)> {
        self.find_path_restricted(start, goal, |_| true)
    }

    /// Total cost of `path` when it is a chain of concrete edges over
    /// passable tiles, `None` otherwise. Used to validate query results.
    pub fn path_cost(&self, path: &[Position]) -> Option<u32> {
        if path.iter().any(|&p| !self.is_passable(p)) {
            return None;
        }
        let mut total = 0u32;
        for pair in path.windows(2) {
            let src = self.node_id(pair[0]);
            let dst = self.node_id(pair[1]);
            let edge = self.graph.edges(src).iter().find(|e| e.target == dst)?;
            total += edge.info.cost;
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(width: i32, height: i32, tile_type: TileType) -> ConcreteMap {
        ConcreteMap::build(width, height, tile_type, &|_p: Position| (true, 1)).unwrap()
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        assert!(ConcreteMap::build(0, 4, TileType::Tile, &|_p: Position| (true, 1)).is_err());
        assert!(ConcreteMap::build(4, -1, TileType::Tile, &|_p: Position| (true, 1)).is_err());
    }

    #[test]
    fn rejects_zero_cost_passable_tiles() {
        assert!(ConcreteMap::build(2, 2, TileType::Tile, &|_p: Position| (true, 0)).is_err());
    }

    #[test]
    fn edge_counts_match_in_bounds_neighbors() {
        let map = open(4, 4, TileType::Octile);
        // corner, edge, interior
        assert_eq!(map.graph().edges(map.node_id(Position::new(0, 0))).len(), 3);
        assert_eq!(map.graph().edges(map.node_id(Position::new(1, 0))).len(), 5);
        assert_eq!(map.graph().edges(map.node_id(Position::new(1, 1))).len(), 8);

        let map = open(4, 4, TileType::Tile);
        assert_eq!(map.graph().edges(map.node_id(Position::new(0, 0))).len(), 2);
        assert_eq!(map.graph().edges(map.node_id(Position::new(1, 1))).len(), 4);

        let map = open(5, 5, TileType::Hex);
        assert_eq!(map.graph().edges(map.node_id(Position::new(2, 2))).len(), 6);
    }

    #[test]
    fn octile_diagonals_carry_scaled_cost() {
        let map = ConcreteMap::build(3, 3, TileType::Octile, &|_p: Position| (true, 24)).unwrap();
        let center = map.node_id(Position::new(1, 1));
        for edge in map.graph().edges(center) {
            let to = map.position(edge.target);
            let diagonal = to.x != 1 && to.y != 1;
            assert_eq!(edge.info.cost, if diagonal { 34 } else { 24 });
        }
    }

    #[test]
    fn octile_uniform_diagonals_keep_base_cost() {
        let map = ConcreteMap::build(3, 3, TileType::OctileUniform, &|_p: Position| (true, 24))
            .unwrap();
        let center = map.node_id(Position::new(1, 1));
        for edge in map.graph().edges(center) {
            assert_eq!(edge.info.cost, 24);
        }
    }

    #[test]
    fn obstacles_keep_their_topology() {
        let map = ConcreteMap::build(3, 1, TileType::Tile, &|p: Position| (p.x != 1, 1)).unwrap();
        // The obstacle node still has in-bounds edges; search refuses to use it.
        assert_eq!(map.graph().edges(map.node_id(Position::new(1, 0))).len(), 2);
        assert!(map.find_path(Position::new(0, 0), Position::new(2, 0)).is_none());
    }

    #[test]
    fn open_grid_diagonal_is_optimal() {
        let map = open(8, 8, TileType::Octile);
        let (cost, path) = map.find_path(Position::new(0, 0), Position::new(7, 7)).unwrap();
        assert_eq!(path.len(), 8);
        assert_eq!(cost, 7); // seven diagonal steps at (1 * 34) / 24 = 1 each
        assert_eq!(map.path_cost(&path), Some(cost));
    }

    #[test]
    fn restricted_search_honors_the_filter() {
        let map = open(8, 8, TileType::Tile);
        // Confine the search to the left half; the goal is outside it.
        let found =
            map.find_path_restricted(Position::new(0, 0), Position::new(6, 0), |p| p.x < 4);
        assert!(found.is_none());
        let (cost, _) = map
            .find_path_restricted(Position::new(0, 0), Position::new(3, 0), |p| p.x < 4)
            .unwrap();
        assert_eq!(cost, 3);
    }
}
