use serde::{Deserialize, Serialize};

use crate::map::TileMap;

/// Four-way movement. No diagonals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Tile delta; y grows downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Result of evaluating one movement input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub x: i32,
    pub y: i32,
    pub moved: bool,
}

/// The single source of truth for tile passability and bounds.
///
/// Pure and total: the same `(map, x, y, direction)` always yields the same
/// result, and it never fails. Client prediction replays exactly this
/// function, so any change here is a protocol change.
pub fn step(map: &TileMap, x: i32, y: i32, direction: Direction) -> Step {
    let (dx, dy) = direction.delta();
    let (tx, ty) = (x + dx, y + dy);
    if !map.is_passable(tx, ty) {
        return Step { x, y, moved: false };
    }
    Step {
        x: tx,
        y: ty,
        moved: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas() {
        assert_eq!(Direction::Up.delta(), (0, -1));
        assert_eq!(Direction::Down.delta(), (0, 1));
        assert_eq!(Direction::Left.delta(), (-1, 0));
        assert_eq!(Direction::Right.delta(), (1, 0));
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Direction::Up).unwrap();
        assert_eq!(json, r#""up""#);
        let dir: Direction = serde_json::from_str(r#""left""#).unwrap();
        assert_eq!(dir, Direction::Left);
        assert!(serde_json::from_str::<Direction>(r#""north""#).is_err());
    }

    #[test]
    fn step_onto_ground() {
        let map = TileMap::bordered(5, 5);
        let step = step(&map, 2, 2, Direction::Up);
        assert_eq!(step, Step { x: 2, y: 1, moved: true });
    }

    #[test]
    fn step_into_wall_stays_put() {
        let map = TileMap::bordered(5, 5);
        let step = step(&map, 1, 1, Direction::Up);
        assert_eq!(step, Step { x: 1, y: 1, moved: false });
    }

    #[test]
    fn step_out_of_bounds_stays_put() {
        // Borderless 3x3 of ground: moving off the edge must be a no-op.
        let map = TileMap::new(3, 3, (1, 1), vec![crate::Tile::Ground; 9]).unwrap();
        let step = step(&map, 0, 0, Direction::Left);
        assert_eq!(step, Step { x: 0, y: 0, moved: false });
    }

    #[test]
    fn step_is_deterministic() {
        let map = TileMap::bordered(7, 7);
        let a = step(&map, 3, 3, Direction::Right);
        let b = step(&map, 3, 3, Direction::Right);
        assert_eq!(a, b);
    }

    #[test]
    fn replaying_unconfirmed_inputs_converges() {
        // A client that replays its unconfirmed inputs from the server's
        // authoritative position must land where the server will: both sides
        // run this same function over the same map.
        let map = TileMap::bordered(7, 7);
        let inputs = [
            Direction::Right,
            Direction::Right,
            Direction::Up,
            Direction::Left,
            Direction::Up,
            Direction::Up, // blocked at the wall on a 7x7 map
        ];

        let (mut sx, mut sy) = map.spawn();
        for dir in inputs {
            let s = step(&map, sx, sy, dir);
            (sx, sy) = (s.x, s.y);
        }

        let (mut cx, mut cy) = map.spawn();
        for dir in inputs {
            let s = step(&map, cx, cy, dir);
            (cx, cy) = (s.x, s.y);
        }

        assert_eq!((sx, sy), (cx, cy));
    }
}
