//! Hierarchical (HPA*) path-finding over tile grid maps.
//!
//! A concrete grid graph is decomposed into fixed-size clusters; passable
//! border runs between adjacent clusters become entrances, whose transition
//! nodes form an abstract graph with inter-cluster edges across entrances
//! and intra-cluster shortest-path edges. Queries insert the endpoints into
//! the abstract graph, search it, refine the abstract path back into
//! concrete tiles and roll the insertions back.
//!
//! ```no_run
//! use tilenav::{build_abstraction, Config, ConcreteMap, Position, TileType};
//!
//! # fn main() -> anyhow::Result<()> {
//! let concrete = ConcreteMap::build(64, 64, TileType::Octile, &|_p: Position| (true, 1))?;
//! let mut map = build_abstraction(concrete, Config::default())?;
//! let path = map.find_path(Position::new(0, 0), Position::new(63, 63))?;
//! # let _ = path;
//! # Ok(())
//! # }
//! ```

pub mod abstraction;
pub mod concrete;
pub mod geometry;
pub mod graph;
pub mod logging;
pub mod pathfinder;
pub mod search;
pub mod smoothing;
pub mod storage;

pub use abstraction::config::Config;
pub use abstraction::executor::build_abstraction;
pub use abstraction::models::{EntranceStyle, Orientation};
pub use concrete::{ConcreteMap, Passability};
pub use geometry::{Position, TileType};
pub use pathfinder::HierarchicalMap;
