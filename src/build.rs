use std::collections::HashSet;

use glam::Vec3;

use crate::chunk::CHUNK_SIZE;
use crate::geometry::{BuildMode, BuildOperation};
use crate::lighting::LightingEngine;
use crate::material::MaterialPalette;
use crate::position::{ChunkKey, GlobalPos, LocalPos};
use crate::store::VoxelStore;

/// Applies build operations to the voxel store, deferring any operation whose
/// affected chunks aren't all loaded, and executing queued operations atomically
/// once their chunks arrive.
#[derive(Default)]
pub struct BuildApplier {
    deferred: Vec<BuildOperation>,
}

/// Outcome of attempting to apply (or drain) build operations this tick.
#[derive(Default)]
pub struct BuildOutcome {
    /// Every chunk mutated, relit, or otherwise needing a remesh as a single atomic batch.
    pub remesh_batch: HashSet<ChunkKey>,
    /// Chunk keys that must be requested before their build can execute.
    pub chunks_to_request: HashSet<ChunkKey>,
    pub bfs_cache_invalidated: bool,
}

impl BuildApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn affected_chunks(op: &BuildOperation) -> Vec<ChunkKey> {
        let (min, max) = op.world_aabb();
        let chunk_min = (min / CHUNK_SIZE as f32).floor().as_ivec3();
        let chunk_max = (max / CHUNK_SIZE as f32).floor().as_ivec3();

        let mut keys = Vec::new();
        for x in chunk_min.x..=chunk_max.x {
            for y in chunk_min.y..=chunk_max.y {
                for z in chunk_min.z..=chunk_max.z {
                    keys.push(ChunkKey::new(x, y, z));
                }
            }
        }
        keys
    }

    /// Submits a build operation: executes immediately if possible, otherwise defers it.
    pub fn submit(&mut self, op: BuildOperation, store: &mut VoxelStore, palette: &MaterialPalette) -> BuildOutcome {
        let affected = Self::affected_chunks(&op);
        if affected.iter().all(|&key| store.contains(key)) {
            self.execute(op, store, palette)
        } else {
            let mut outcome = BuildOutcome::default();
            for &key in &affected {
                if !store.contains(key) && !store.is_pending_chunk(key) {
                    outcome.chunks_to_request.insert(key);
                }
            }
            self.deferred.push(op);
            outcome
        }
    }

    /// Drains deferred operations whose affected chunks are now fully loaded, applying
    /// them in submission order.
    pub fn drain_deferred(&mut self, store: &mut VoxelStore, palette: &MaterialPalette) -> BuildOutcome {
        let mut outcome = BuildOutcome::default();
        let mut remaining = Vec::new();

        for op in std::mem::take(&mut self.deferred) {
            let affected = Self::affected_chunks(&op);
            if affected.iter().all(|&key| store.contains(key)) {
                let result = self.execute(op, store, palette);
                outcome.remesh_batch.extend(result.remesh_batch);
                outcome.bfs_cache_invalidated |= result.bfs_cache_invalidated;
            } else {
                remaining.push(op);
            }
        }

        self.deferred = remaining;
        outcome
    }

    fn execute(&mut self, op: BuildOperation, store: &mut VoxelStore, palette: &MaterialPalette) -> BuildOutcome {
        let mut outcome = BuildOutcome::default();
        let affected = Self::affected_chunks(&op);
        let mut changed = Vec::new();

        for key in affected {
            let mut mutated = false;
            if let Some(chunk) = store.get_mut(key) {
                for x in 0..CHUNK_SIZE as u32 {
                    for y in 0..CHUNK_SIZE as u32 {
                        for z in 0..CHUNK_SIZE as u32 {
                            let local = LocalPos::new(x, y, z);
                            let world = GlobalPos::from_local_and_chunk(local, key).as_vec3() + Vec3::splat(0.5);
                            if !op.contains_world(world) {
                                continue;
                            }

                            let voxel = chunk.get(local);
                            let new_voxel = match op.config.mode {
                                BuildMode::Add => {
                                    if voxel.is_empty() || !palette.is_solid(voxel.material()) {
                                        Some(voxel.with_material(op.config.material))
                                    } else {
                                        None
                                    }
                                }
                                BuildMode::Subtract => Some(voxel.with_material(0)),
                                BuildMode::Paint => {
                                    if !voxel.is_empty() {
                                        Some(voxel.with_material(op.config.material))
                                    } else {
                                        None
                                    }
                                }
                                BuildMode::Fill => Some(voxel.with_material(op.config.material)),
                            };

                            if let Some(new_voxel) = new_voxel {
                                if new_voxel != voxel {
                                    chunk.set(local, new_voxel);
                                    mutated = true;
                                }
                            }
                        }
                    }
                }

                if mutated {
                    chunk.set_last_build_seq(op.sequence);
                    chunk.recompute_derived(palette);
                    chunk.mark_dirty();
                }
            }

            if mutated {
                changed.push(key);
            }
        }

        for key in changed {
            for touched in LightingEngine::relight_cascade(store, key, palette) {
                outcome.remesh_batch.insert(touched);
            }
            outcome.bfs_cache_invalidated = true;
        }

        outcome
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::geometry::{BuildConfig, BuildShape};
    use glam::Quat;

    fn palette() -> MaterialPalette {
        MaterialPalette::new(vec![
            crate::material::Material { name: "air".into(), solid: false, transparent: true, liquid: false },
            crate::material::Material { name: "stone".into(), solid: true, transparent: false, liquid: false },
        ])
    }

    #[test]
    fn add_sphere_fills_only_inside_voxels() {
        let mut store = VoxelStore::new();
        let key = ChunkKey::new(0, 0, 0);
        store.insert(key, Chunk::empty());

        let op = BuildOperation {
            center: Vec3::splat(8.0),
            rotation: Quat::IDENTITY,
            config: BuildConfig { shape: BuildShape::Sphere, mode: BuildMode::Add, size: Vec3::splat(6.0), material: 1 },
            sequence: 1,
        };

        let mut applier = BuildApplier::new();
        let outcome = applier.submit(op, &mut store, &palette());
        assert!(outcome.remesh_batch.contains(&key));

        let chunk = store.get(key).unwrap();
        assert!(!chunk.get(LocalPos::new(8, 8, 8)).is_empty());
        assert!(chunk.get(LocalPos::new(0, 0, 0)).is_empty());
    }

    #[test]
    fn build_against_unloaded_chunk_is_deferred() {
        let mut store = VoxelStore::new();
        let op = BuildOperation {
            center: Vec3::splat(8.0),
            rotation: Quat::IDENTITY,
            config: BuildConfig { shape: BuildShape::Cube, mode: BuildMode::Subtract, size: Vec3::splat(4.0), material: 0 },
            sequence: 2,
        };

        let mut applier = BuildApplier::new();
        let outcome = applier.submit(op, &mut store, &palette());
        assert!(applier.has_deferred());
        assert!(outcome.chunks_to_request.contains(&ChunkKey::new(0, 0, 0)));

        let mut solid_chunk = Chunk::empty();
        for v in solid_chunk.voxels_mut().iter_mut() {
            *v = crate::voxel::Voxel::new(1, 0, false);
        }
        store.insert(ChunkKey::new(0, 0, 0), solid_chunk);

        let drained = applier.drain_deferred(&mut store, &palette());
        assert!(!applier.has_deferred());
        assert!(drained.remesh_batch.contains(&ChunkKey::new(0, 0, 0)));

        let chunk = store.get(ChunkKey::new(0, 0, 0)).unwrap();
        assert!(chunk.get(LocalPos::new(8, 8, 8)).is_empty());
        assert!(!chunk.get(LocalPos::new(0, 0, 0)).is_empty());
    }

    #[test]
    fn paint_is_idempotent() {
        let mut store = VoxelStore::new();
        let key = ChunkKey::new(0, 0, 0);
        let mut chunk = Chunk::empty();
        chunk.set(LocalPos::new(8, 8, 8), crate::voxel::Voxel::new(1, 0, false));
        store.insert(key, chunk);

        let op = BuildOperation {
            center: Vec3::splat(8.0),
            rotation: Quat::IDENTITY,
            config: BuildConfig { shape: BuildShape::Sphere, mode: BuildMode::Paint, size: Vec3::splat(2.0), material: 2 },
            sequence: 3,
        };

        let mut applier = BuildApplier::new();
        applier.submit(op, &mut store, &palette());
        let first = store.get(key).unwrap().get(LocalPos::new(8, 8, 8));
        applier.submit(op, &mut store, &palette());
        let second = store.get(key).unwrap().get(LocalPos::new(8, 8, 8));
        assert_eq!(first, second);
    }
}
