mod gen;
mod map;
mod movement;

pub use map::{MapError, Tile, TileMap};
pub use movement::{step, Direction, Step};
