use crate::map::{Tile, TileMap};

/// SplitMix64. Small, deterministic, and stable across platforms, which is
/// all map generation needs: the same seed must always yield the same map.
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

impl TileMap {
    /// Deterministically generate a world map from a seed.
    ///
    /// The perimeter is walled; the interior is mostly ground with scattered
    /// water pools and rock. A 3x3 clearing around the center guarantees the
    /// spawn and its neighbors are walkable.
    pub fn generate(seed: u64, width: u32, height: u32) -> TileMap {
        let width = width.max(5);
        let height = height.max(5);
        let mut rng = SplitMix64::new(seed);

        let mut map = TileMap::bordered(width, height);
        for y in 1..height as i32 - 1 {
            for x in 1..width as i32 - 1 {
                let roll = rng.next() % 100;
                let tile = if roll < 8 {
                    Tile::Water
                } else if roll < 14 {
                    Tile::Wall
                } else {
                    Tile::Ground
                };
                map.set_tile(x, y, tile);
            }
        }

        let (sx, sy) = (width as i32 / 2, height as i32 / 2);
        for dy in -1..=1 {
            for dx in -1..=1 {
                map.set_tile(sx + dx, sy + dy, Tile::Ground);
            }
        }
        map
    }
}
