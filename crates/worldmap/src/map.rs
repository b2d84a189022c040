use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tile codes. The set is closed; adding a variant is a wire-format change
/// because maps are persisted as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    Ground,
    Wall,
    Water,
}

impl Tile {
    /// Whether a player may stand on this tile.
    pub fn is_passable(self) -> bool {
        matches!(self, Tile::Ground)
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("map dimensions must be positive")]
    EmptyMap,
    #[error("{width}x{height} map does not match {tiles} tiles")]
    DimensionMismatch {
        width: u32,
        height: u32,
        tiles: usize,
    },
    #[error("spawn ({x}, {y}) is not a passable tile")]
    BadSpawn { x: i32, y: i32 },
}

/// Immutable tile grid with a spawn point.
///
/// Tiles are stored row-major; `tile(x, y)` addresses column `x` of row `y`
/// with `0 <= x < width` and `0 <= y < height`. A map never changes for the
/// lifetime of a room; its serde form is what gets persisted as world data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    width: u32,
    height: u32,
    spawn_x: i32,
    spawn_y: i32,
    tiles: Vec<Tile>,
}

impl TileMap {
    pub fn new(
        width: u32,
        height: u32,
        spawn: (i32, i32),
        tiles: Vec<Tile>,
    ) -> Result<Self, MapError> {
        let map = Self {
            width,
            height,
            spawn_x: spawn.0,
            spawn_y: spawn.1,
            tiles,
        };
        map.validate()?;
        Ok(map)
    }

    /// Re-check structural invariants. Deserialized maps must be validated
    /// before use since serde does not enforce them.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.width == 0 || self.height == 0 {
            return Err(MapError::EmptyMap);
        }
        let expected = self.width as usize * self.height as usize;
        if self.tiles.len() != expected {
            return Err(MapError::DimensionMismatch {
                width: self.width,
                height: self.height,
                tiles: self.tiles.len(),
            });
        }
        if !self.is_passable(self.spawn_x, self.spawn_y) {
            return Err(MapError::BadSpawn {
                x: self.spawn_x,
                y: self.spawn_y,
            });
        }
        Ok(())
    }

    /// An all-ground map with a wall perimeter and a centered spawn.
    /// The smallest useful map is 3x3 (one walkable tile).
    pub fn bordered(width: u32, height: u32) -> Self {
        let width = width.max(3);
        let height = height.max(3);
        let mut tiles = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    tiles.push(Tile::Wall);
                } else {
                    tiles.push(Tile::Ground);
                }
            }
        }
        Self {
            width,
            height,
            spawn_x: width as i32 / 2,
            spawn_y: height as i32 / 2,
            tiles,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn spawn(&self) -> (i32, i32) {
        (self.spawn_x, self.spawn_y)
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<Tile> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(self.tiles[y as usize * self.width as usize + x as usize])
    }

    /// Passability predicate; out-of-bounds coordinates are never passable.
    pub fn is_passable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).map(Tile::is_passable).unwrap_or(false)
    }

    pub(crate) fn set_tile(&mut self, x: i32, y: i32, tile: Tile) {
        if self.in_bounds(x, y) {
            self.tiles[y as usize * self.width as usize + x as usize] = tile;
        }
    }
}
