//! Straight-line path smoothing.
//!
//! Replaces a subpath with a straight run of one repeated step direction
//! when that run is passable and costs no more than the subpath it
//! replaces. Only the tile type's own step directions are used, so the
//! result is still a plain grid path.

use crate::concrete::ConcreteMap;
use crate::geometry::{Offset, Position};

pub fn smooth(map: &ConcreteMap, path: Vec<Position>) -> Vec<Position> {
    if path.len() < 3 {
        return path;
    }

    let mut out = Vec::with_capacity(path.len());
    out.push(path[0]);
    let mut idx = 0;
    while idx + 1 < path.len() {
        let mut advanced = false;
        // Farthest shortcut first.
        for far in ((idx + 2)..path.len()).rev() {
            if let Some(segment) = straight_segment(map, path[idx], path[far]) {
                let original = map.path_cost(&path[idx..=far]);
                let shortcut = map.path_cost(&segment);
                if let (Some(original), Some(shortcut)) = (original, shortcut) {
                    if shortcut <= original {
                        out.extend_from_slice(&segment[1..]);
                        idx = far;
                        advanced = true;
                        break;
                    }
                }
            }
        }
        if !advanced {
            idx += 1;
            out.push(path[idx]);
        }
    }
    out
}

/// The straight run from `from` to `to` when one repeated step direction
/// covers it over passable tiles; `None` otherwise.
fn straight_segment(map: &ConcreteMap, from: Position, to: Position) -> Option<Vec<Position>> {
    let dx = (to.x - from.x).signum();
    let dy = (to.y - from.y).signum();
    if dx == 0 && dy == 0 {
        return None;
    }
    if dx != 0 && dy != 0 && (to.x - from.x).abs() != (to.y - from.y).abs() {
        return None;
    }
    let step = Offset(dx, dy);

    let mut segment = vec![from];
    let mut current = from;
    while current != to {
        // Hex parity makes a diagonal direction valid only on alternating
        // columns, which rejects hex diagonals here naturally.
        if !map.tile_type().neighbor_offsets(current).contains(&step) {
            return None;
        }
        current = Position::new(current.x + step.0, current.y + step.1);
        if !map.is_passable(current) {
            return None;
        }
        segment.push(current);
    }
    Some(segment)
}
