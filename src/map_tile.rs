use std::collections::HashMap;

use crate::chunk::CHUNK_SIZE;

pub const MAP_TILE_SIZE: usize = CHUNK_SIZE;
const TILE_AREA: usize = MAP_TILE_SIZE * MAP_TILE_SIZE;

/// Per-column surface heightmap and material, the source of truth for "how tall is
/// this column" used to gate chunk requests above the surface.
#[derive(Clone)]
pub struct MapTile {
    pub heights: Box<[i16; TILE_AREA]>,
    pub materials: Box<[u8; TILE_AREA]>,
    pub max_cy: i32,
}

impl MapTile {
    pub fn new(heights: Box<[i16; TILE_AREA]>, materials: Box<[u8; TILE_AREA]>) -> Self {
        let max_height = heights.iter().copied().max().unwrap_or(0);
        let max_cy = max_height.div_euclid(CHUNK_SIZE as i16) as i32;
        Self { heights, materials, max_cy }
    }

    fn local_index(local_x: usize, local_z: usize) -> usize {
        local_z * MAP_TILE_SIZE + local_x
    }

    pub fn height_at(&self, local_x: usize, local_z: usize) -> i16 {
        self.heights[Self::local_index(local_x, local_z)]
    }

    pub fn material_at(&self, local_x: usize, local_z: usize) -> u8 {
        self.materials[Self::local_index(local_x, local_z)]
    }
}

/// In-memory cache of map tiles, keyed by `(tx, tz)` tile coordinate.
#[derive(Default)]
pub struct MapTileCache {
    tiles: HashMap<(i32, i32), MapTile>,
}

impl MapTileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: (i32, i32), tile: MapTile) {
        self.tiles.insert(column, tile);
    }

    pub fn get(&self, column: (i32, i32)) -> Option<&MapTile> {
        self.tiles.get(&column)
    }

    pub fn contains(&self, column: (i32, i32)) -> bool {
        self.tiles.contains_key(&column)
    }

    pub fn height_at(&self, world_x: i32, world_z: i32) -> Option<i32> {
        let size = MAP_TILE_SIZE as i32;
        let tx = world_x.div_euclid(size);
        let tz = world_z.div_euclid(size);
        let local_x = world_x.rem_euclid(size) as usize;
        let local_z = world_z.rem_euclid(size) as usize;
        self.get((tx, tz)).map(|tile| tile.height_at(local_x, local_z) as i32)
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_at_reads_through_the_owning_tile() {
        let mut cache = MapTileCache::new();
        let heights = Box::new([5i16; TILE_AREA]);
        let materials = Box::new([1u8; TILE_AREA]);
        cache.insert((0, 0), MapTile::new(heights, materials));

        assert_eq!(cache.height_at(3, 4), Some(5));
        assert_eq!(cache.height_at(100, 100), None);
    }
}
