use std::collections::{HashMap, HashSet};

use generational_arena::{Arena, Index};
use glam::{IVec3, Vec3};

use crate::chunk::Chunk;
use crate::material::MaterialPalette;
use crate::position::{ChunkKey, GlobalPos};
use crate::util::vector_map::VectorMapExt;

/// Owning map from chunk key to chunk, plus bookkeeping for requests in flight.
///
/// Chunks are stored in a [`generational_arena::Arena`] and looked up by key through
/// a side table, following the arena-plus-handle pattern this engine's design notes
/// call for in garbage-collector-free languages.
#[derive(Default)]
pub struct VoxelStore {
    chunks: Arena<Chunk>,
    index_by_key: HashMap<ChunkKey, Index>,
    pending_chunks: HashSet<ChunkKey>,
    pending_columns: HashSet<(i32, i32)>,
    column_max_cy: HashMap<(i32, i32), i32>,
}

/// Result of [`VoxelStore::raymarch`] hitting a solid voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaycastHit {
    pub voxel: GlobalPos,
    /// Face normal the ray crossed to reach the hit voxel, if it stepped through at
    /// least one previous voxel (absent when the ray starts already inside solid).
    pub normal: Option<IVec3>,
}

impl VoxelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ChunkKey) -> Option<&Chunk> {
        self.index_by_key.get(&key).and_then(|&idx| self.chunks.get(idx))
    }

    pub fn get_mut(&mut self, key: ChunkKey) -> Option<&mut Chunk> {
        self.index_by_key.get(&key).copied().and_then(move |idx| self.chunks.get_mut(idx))
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.index_by_key.contains_key(&key)
    }

    /// Inserts or replaces the chunk at `key`, returning the previous one if any.
    pub fn insert(&mut self, key: ChunkKey, chunk: Chunk) -> Option<Chunk> {
        self.pending_chunks.remove(&key);
        if let Some(&idx) = self.index_by_key.get(&key) {
            Some(std::mem::replace(&mut self.chunks[idx], chunk))
        } else {
            let idx = self.chunks.insert(chunk);
            self.index_by_key.insert(key, idx);
            None
        }
    }

    pub fn remove(&mut self, key: ChunkKey) -> Option<Chunk> {
        self.index_by_key.remove(&key).and_then(|idx| self.chunks.remove(idx))
    }

    pub fn mark_pending_chunk(&mut self, key: ChunkKey) {
        self.pending_chunks.insert(key);
    }

    pub fn is_pending_chunk(&self, key: ChunkKey) -> bool {
        self.pending_chunks.contains(&key)
    }

    pub fn mark_pending_column(&mut self, column: (i32, i32)) {
        self.pending_columns.insert(column);
    }

    pub fn clear_pending_column(&mut self, column: (i32, i32)) {
        self.pending_columns.remove(&column);
    }

    pub fn is_pending_column(&self, column: (i32, i32)) -> bool {
        self.pending_columns.contains(&column)
    }

    pub fn pending_chunk_count(&self) -> usize {
        self.pending_chunks.len()
    }

    pub fn pending_column_count(&self) -> usize {
        self.pending_columns.len()
    }

    pub fn set_column_max_cy(&mut self, column: (i32, i32), max_cy: i32) {
        self.column_max_cy.insert(column, max_cy);
        self.pending_columns.remove(&column);
    }

    pub fn column_max_cy(&self, column: (i32, i32)) -> Option<i32> {
        self.column_max_cy.get(&column).copied()
    }

    /// Walks a ray through the loaded world using a DDA step across voxel cells,
    /// crossing chunk boundaries transparently. Stops at `max_distance` or the first
    /// solid voxel; returns `None` if the ray leaves loaded space or never hits solid.
    pub fn raymarch(&self, origin: Vec3, direction: Vec3, max_distance: f32, palette: &MaterialPalette) -> Option<RaycastHit> {
        const EPS: f32 = 1e-3;
        if direction.length_squared() < EPS {
            return None;
        }

        let dir_step = direction.map(|c| if c >= 0.0 { 1.0 } else { 0.0 });
        let dir_recip = direction.recip();

        let mut t = 0.0f32;
        let mut previous_voxel: Option<IVec3> = None;

        while t < max_distance {
            let pos = origin + direction * t;
            let voxel_pos = pos.floor().as_ivec3();
            let global = GlobalPos::new(voxel_pos.x, voxel_pos.y, voxel_pos.z);
            let (local, key) = global.split();

            let Some(chunk) = self.get(key) else { return None };
            let voxel = chunk.get(local);
            if palette.is_solid(voxel.material()) {
                let normal = previous_voxel.map(|prev| prev - voxel_pos);
                return Some(RaycastHit { voxel: global, normal });
            }

            let fract = pos - pos.floor();
            let deltas = (dir_step - fract) * dir_recip;
            t += deltas.min_element().max(EPS);
            previous_voxel = Some(voxel_pos);
        }

        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkKey, &Chunk)> {
        self.index_by_key.iter().filter_map(move |(&key, &idx)| self.chunks.get(idx).map(|c| (key, c)))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Drops every chunk and pending-request marker, preserving the store's allocation.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.index_by_key.clear();
        self.pending_chunks.clear();
        self.pending_columns.clear();
        self.column_max_cy.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;

    #[test]
    fn insert_then_get_round_trips() {
        let mut store = VoxelStore::new();
        let key = ChunkKey::new(1, 2, 3);
        store.insert(key, Chunk::empty());
        assert!(store.get(key).is_some());
        assert!(store.contains(key));
    }

    #[test]
    fn insert_clears_pending_flag() {
        let mut store = VoxelStore::new();
        let key = ChunkKey::new(0, 0, 0);
        store.mark_pending_chunk(key);
        assert!(store.is_pending_chunk(key));
        store.insert(key, Chunk::empty());
        assert!(!store.is_pending_chunk(key));
    }

    #[test]
    fn remove_drops_the_chunk() {
        let mut store = VoxelStore::new();
        let key = ChunkKey::new(5, 5, 5);
        store.insert(key, Chunk::empty());
        assert!(store.remove(key).is_some());
        assert!(!store.contains(key));
    }

    fn palette() -> MaterialPalette {
        use crate::material::Material;
        MaterialPalette::new(vec![
            Material { name: "air".into(), solid: false, transparent: true, liquid: false },
            Material { name: "stone".into(), solid: true, transparent: false, liquid: false },
        ])
    }

    #[test]
    fn raymarch_hits_a_solid_floor_and_reports_the_crossed_face() {
        use crate::position::LocalPos;

        let mut store = VoxelStore::new();
        let mut chunk = Chunk::empty();
        chunk.voxels_mut()[LocalPos::new(5, 3, 5).array_index()] = crate::voxel::Voxel::new(1, 0, false);
        store.insert(ChunkKey::new(0, 0, 0), chunk);

        let hit = store
            .raymarch(Vec3::new(5.5, 10.0, 5.5), Vec3::new(0.0, -1.0, 0.0), 32.0, &palette())
            .expect("ray should hit the floor");
        assert_eq!(hit.voxel, GlobalPos::new(5, 3, 5));
        assert_eq!(hit.normal, Some(IVec3::new(0, 1, 0)));
    }

    #[test]
    fn raymarch_returns_none_once_it_leaves_loaded_space() {
        let store = VoxelStore::new();
        let hit = store.raymarch(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0), 32.0, &palette());
        assert!(hit.is_none());
    }
}
