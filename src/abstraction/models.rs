use serde::{Deserialize, Serialize};

use crate::concrete::ConcreteNodeId;
use crate::geometry::Position;
use crate::graph::GraphId;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClusterId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EntranceId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AbstractNodeId(pub u32);

impl GraphId for AbstractNodeId {
    fn from_index(index: usize) -> Self {
        AbstractNodeId(index as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EntranceStyle {
    /// One transition per border run, at its middle.
    Middle,
    /// Two transitions (run ends) when the run is wider than
    /// [`MAX_ENTRANCE_WIDTH`], otherwise the middle one.
    End,
}

/// Border runs wider than this get end transitions under
/// [`EntranceStyle::End`].
pub const MAX_ENTRANCE_WIDTH: i32 = 6;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    pub row: i32,
    pub col: i32,
    pub origin: Position,
    pub width: i32,
    pub height: i32,
}

impl Cluster {
    pub fn contains(&self, position: Position) -> bool {
        position.x >= self.origin.x
            && position.x < self.origin.x + self.width
            && position.y >= self.origin.y
            && position.y < self.origin.y + self.height
    }
}

/// One transition point across a cluster border. `node_a` sits in
/// `cluster_a` (the upper or left cluster), `node_b` faces it across the
/// border in `cluster_b`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Entrance {
    pub id: EntranceId,
    pub cluster_a: ClusterId,
    pub cluster_b: ClusterId,
    pub orientation: Orientation,
    /// Coordinate on the shared axis, taken on the `cluster_a` side.
    pub border_coord: i32,
    /// Offset along the border.
    pub offset: i32,
    pub node_a: ConcreteNodeId,
    pub node_b: ConcreteNodeId,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AbstractNodeInfo {
    pub cluster: ClusterId,
    pub level: u8,
    pub concrete: ConcreteNodeId,
    pub position: Position,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeKind {
    Inter,
    Intra,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AbstractEdgeInfo {
    pub cost: u32,
    pub level: u8,
    pub kind: EdgeKind,
    /// Cached concrete path for `Intra` edges; refinement recomputes the
    /// restricted search when absent.
    pub path: Option<Vec<Position>>,
}
