use std::collections::VecDeque;

use crate::chunk::{Chunk, CHUNK_SIZE_U32};
use crate::material::MaterialPalette;
use crate::position::{ChunkKey, LocalPos};
use crate::store::VoxelStore;
use crate::util::face::{FaceIndex, FACE_NORMALS};
use crate::util::measure_time::measure_time;
use crate::voxel::MAX_SUNLIGHT;

/// Stateless sunlight propagation over the voxel store.
///
/// Lighting never fails: it's pure CPU work over chunks the caller already owns.
pub struct LightingEngine;

impl LightingEngine {
    /// Re-seeds, border-injects and floods sunlight for a single chunk. Does not touch
    /// any other chunk; callers that want the cascading relight described by the build
    /// and ingest pipelines should call [`Self::relight_cascade`] instead.
    pub fn relight_chunk(store: &mut VoxelStore, key: ChunkKey, palette: &MaterialPalette) {
        measure_time!(Self::relight_chunk_inner(store, key, palette));
    }

    fn relight_chunk_inner(store: &mut VoxelStore, key: ChunkKey, palette: &MaterialPalette) {
        let sky_exposed_above = Self::is_sky_exposed_above(store, key);
        let borders = Self::collect_borders(store, key);

        let Some(chunk) = store.get_mut(key) else { return };
        Self::seed_columns(chunk, sky_exposed_above, palette);
        Self::inject_borders(chunk, &borders, palette);
        Self::flood(chunk, palette);
    }

    /// True if the chunk directly above `key` (or its absence) implies an open sky.
    fn is_sky_exposed_above(store: &VoxelStore, key: ChunkKey) -> bool {
        match store.get(key.neighbor(FaceIndex::POS_Y)) {
            None => true,
            Some(above) => (0..CHUNK_SIZE_U32)
                .flat_map(|x| (0..CHUNK_SIZE_U32).map(move |z| (x, z)))
                .all(|(x, z)| above.get(LocalPos::new(x, 0, z)).sky_exposed()),
        }
    }

    /// Copies the boundary voxel slab of each loaded face neighbor, for border injection.
    fn collect_borders(store: &VoxelStore, key: ChunkKey) -> [Option<Vec<(LocalPos, u8)>>; 6] {
        std::array::from_fn(|face| {
            let face = FaceIndex(face);
            let neighbor_key = key.neighbor(face);
            let neighbor = store.get(neighbor_key)?;
            let opposite = face.opposite();
            let mut slab = Vec::new();
            for v in 0..CHUNK_SIZE_U32 {
                for u in 0..CHUNK_SIZE_U32 {
                    let neighbor_pos = boundary_pos(opposite, u, v);
                    let voxel = neighbor.get(neighbor_pos);
                    if voxel.sunlight() > 0 {
                        let local_pos = boundary_pos(face, u, v);
                        slab.push((local_pos, voxel.sunlight()));
                    }
                }
            }
            Some(slab)
        })
    }

    fn seed_columns(chunk: &mut Chunk, sky_exposed_above: bool, palette: &MaterialPalette) {
        for x in 0..CHUNK_SIZE_U32 {
            for z in 0..CHUNK_SIZE_U32 {
                let mut exposed = sky_exposed_above;
                for y in (0..CHUNK_SIZE_U32).rev() {
                    let pos = LocalPos::new(x, y, z);
                    let voxel = chunk.get(pos);
                    if palette.is_solid(voxel.material()) {
                        chunk.set(pos, voxel.with_sunlight(0).with_sky_exposed(false));
                        exposed = false;
                        continue;
                    }
                    if exposed {
                        chunk.set(pos, voxel.with_sunlight(MAX_SUNLIGHT).with_sky_exposed(true));
                    } else {
                        chunk.set(pos, voxel.with_sunlight(0).with_sky_exposed(false));
                    }
                }
            }
        }
    }

    fn inject_borders(chunk: &mut Chunk, borders: &[Option<Vec<(LocalPos, u8)>>; 6], palette: &MaterialPalette) {
        for slab in borders.iter().flatten() {
            for &(pos, neighbor_light) in slab {
                let voxel = chunk.get(pos);
                if palette.is_solid(voxel.material()) {
                    continue;
                }
                let injected = neighbor_light.saturating_sub(1);
                if injected > voxel.sunlight() {
                    chunk.set(pos, voxel.with_sunlight(injected));
                }
            }
        }
    }

    /// BFS flood-fill propagation within a single chunk (does not cross chunk boundaries).
    fn flood(chunk: &mut Chunk, palette: &MaterialPalette) {
        let mut frontier = VecDeque::new();
        for index in 0..crate::chunk::CHUNK_SIZE_CUBED {
            if chunk.voxels()[index].sunlight() > 0 {
                frontier.push_back(LocalPos::from_array_index(index));
            }
        }

        while let Some(pos) = frontier.pop_front() {
            let light = chunk.get(pos).sunlight();
            if light == 0 {
                continue;
            }
            let propagated = light - 1;
            if propagated == 0 {
                continue;
            }
            for &normal in &FACE_NORMALS {
                let Some(neighbor_pos) = pos.try_add(normal) else { continue };
                let neighbor = chunk.get(neighbor_pos);
                if palette.is_solid(neighbor.material()) {
                    continue;
                }
                if neighbor.sunlight() < propagated {
                    chunk.set(neighbor_pos, neighbor.with_sunlight(propagated));
                    frontier.push_back(neighbor_pos);
                }
            }
        }
    }

    /// Relights `key`, then cascades: downward through the whole loaded column, one
    /// step upward, and to the four horizontal face neighbors. Returns every chunk key
    /// touched, for the caller to fold into a remesh batch.
    pub fn relight_cascade(store: &mut VoxelStore, key: ChunkKey, palette: &MaterialPalette) -> Vec<ChunkKey> {
        let mut touched = Vec::new();

        Self::relight_chunk(store, key, palette);
        touched.push(key);

        let mut below = key.neighbor(FaceIndex::NEG_Y);
        while store.contains(below) {
            Self::relight_chunk(store, below, palette);
            touched.push(below);
            below = below.neighbor(FaceIndex::NEG_Y);
        }

        let above = key.neighbor(FaceIndex::POS_Y);
        if store.contains(above) {
            Self::relight_chunk(store, above, palette);
            touched.push(above);
        }

        for face in [FaceIndex::POS_X, FaceIndex::NEG_X, FaceIndex::POS_Z, FaceIndex::NEG_Z] {
            let neighbor = key.neighbor(face);
            if store.contains(neighbor) {
                Self::relight_chunk(store, neighbor, palette);
                touched.push(neighbor);
            }
        }

        touched
    }
}

fn boundary_pos(face: FaceIndex, u: u32, v: u32) -> LocalPos {
    let last = CHUNK_SIZE_U32 - 1;
    match face.as_usize() {
        0 => LocalPos::new(last, u, v),
        1 => LocalPos::new(u, last, v),
        2 => LocalPos::new(u, v, last),
        3 => LocalPos::new(0, u, v),
        4 => LocalPos::new(u, 0, v),
        5 => LocalPos::new(u, v, 0),
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::voxel::Voxel;

    fn palette() -> MaterialPalette {
        MaterialPalette::new(vec![
            Material { name: "air".into(), solid: false, transparent: true, liquid: false },
            Material { name: "stone".into(), solid: true, transparent: false, liquid: false },
        ])
    }

    #[test]
    fn open_sky_column_is_fully_lit() {
        let mut store = VoxelStore::new();
        let key = ChunkKey::new(0, 0, 0);
        store.insert(key, Chunk::empty());
        LightingEngine::relight_chunk(&mut store, key, &palette());

        let chunk = store.get(key).unwrap();
        let voxel = chunk.get(LocalPos::new(5, 5, 5));
        assert_eq!(voxel.sunlight(), MAX_SUNLIGHT);
        assert!(voxel.sky_exposed());
    }

    #[test]
    fn solid_voxels_never_carry_sunlight() {
        let mut store = VoxelStore::new();
        let key = ChunkKey::new(0, 0, 0);
        let mut chunk = Chunk::empty();
        for v in chunk.voxels_mut().iter_mut() {
            *v = Voxel::new(1, 0, false);
        }
        store.insert(key, chunk);
        LightingEngine::relight_chunk(&mut store, key, &palette());

        let chunk = store.get(key).unwrap();
        assert_eq!(chunk.get(LocalPos::new(10, 10, 10)).sunlight(), 0);
    }

    #[test]
    fn air_pocket_below_solid_roof_stays_dark() {
        let mut store = VoxelStore::new();
        let key = ChunkKey::new(0, 0, 0);
        let mut chunk = Chunk::empty();
        // solid roof at y = 20, air below and above
        for x in 0..CHUNK_SIZE_U32 {
            for z in 0..CHUNK_SIZE_U32 {
                chunk.set(LocalPos::new(x, 20, z), Voxel::new(1, 0, false));
            }
        }
        store.insert(key, chunk);
        LightingEngine::relight_chunk(&mut store, key, &palette());

        let chunk = store.get(key).unwrap();
        assert_eq!(chunk.get(LocalPos::new(5, 5, 5)).sunlight(), 0);
        assert!(chunk.get(LocalPos::new(5, 25, 5)).sky_exposed());
    }

    #[test]
    fn border_light_propagates_from_loaded_neighbor() {
        let mut store = VoxelStore::new();
        let left = ChunkKey::new(0, 0, 0);
        let right = ChunkKey::new(1, 0, 0);
        store.insert(left, Chunk::empty());
        store.insert(right, Chunk::empty());

        LightingEngine::relight_chunk(&mut store, left, &palette());
        LightingEngine::relight_chunk(&mut store, right, &palette());

        let right_chunk = store.get(right).unwrap();
        // fully open sky on both sides, so the boundary should already read max light
        let edge_voxel = right_chunk.get(LocalPos::new(0, 15, 15));
        assert_eq!(edge_voxel.sunlight(), MAX_SUNLIGHT);
    }
}
