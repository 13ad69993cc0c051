use std::collections::HashSet;

use crate::build::BuildApplier;
use crate::chunk::{Chunk, CHUNK_SIZE_CUBED};
use crate::event::TerrainEvent;
use crate::lighting::LightingEngine;
use crate::map_tile::{MapTile, MapTileCache};
use crate::material::MaterialPalette;
use crate::network::{ChunkData, SurfaceColumnData, TileData};
use crate::position::ChunkKey;
use crate::scheduler::RequestScheduler;
use crate::store::VoxelStore;
use crate::voxel::Voxel;

/// Turns wire payloads into store mutations, relights, and queued remesh work.
///
/// Owns no state itself beyond what's needed to decode `u16` voxel data into
/// [`Voxel`]; everything it touches (the store, the tile cache, the lighting
/// engine, the build applier) is handed in by the caller each time.
pub struct DataIngestor;

/// Chunk keys that must be remeshed as a result of ingesting one payload.
#[derive(Default)]
pub struct IngestOutcome {
    pub remesh: HashSet<ChunkKey>,
    pub events: Vec<TerrainEvent>,
}

impl DataIngestor {
    /// Decodes and stores a single chunk, relights it and its cascade, then drains any
    /// deferred build operations that were only waiting on this chunk.
    pub fn ingest_chunk(
        store: &mut VoxelStore,
        palette: &MaterialPalette,
        applier: &mut BuildApplier,
        data: ChunkData,
    ) -> IngestOutcome {
        let key = ChunkKey::new(data.chunk_x, data.chunk_y, data.chunk_z);
        let mut chunk = Chunk::from_voxels(decode_voxels(&data.voxel_data), data.last_build_seq);
        chunk.recompute_derived(palette);
        store.insert(key, chunk);

        let mut outcome = IngestOutcome::default();
        outcome.events.push(TerrainEvent::ChunkLoaded(key));
        for touched in LightingEngine::relight_cascade(store, key, palette) {
            outcome.remesh.insert(touched);
        }

        let drained = applier.drain_deferred(store, palette);
        outcome.remesh.extend(drained.remesh_batch);

        outcome
    }

    /// Decodes and caches a standalone tile, without any attached chunks.
    pub fn ingest_tile(store: &mut VoxelStore, tiles: &mut MapTileCache, data: TileData) {
        let column = (data.tx, data.tz);
        let tile = MapTile::new(data.heights, data.materials);
        store.set_column_max_cy(column, tile.max_cy);
        tiles.insert(column, tile);
    }

    /// Decodes the one-shot initial surface column: its tile plus every chunk the
    /// server packed alongside it, bottom-up. Marks the scheduler's initial-column
    /// gate so the three-tier request order can proceed past its first stage.
    pub fn ingest_surface_column(
        store: &mut VoxelStore,
        tiles: &mut MapTileCache,
        palette: &MaterialPalette,
        applier: &mut BuildApplier,
        scheduler: &mut RequestScheduler,
        data: SurfaceColumnData,
    ) -> IngestOutcome {
        let column = (data.tx, data.tz);
        let tile = MapTile::new(data.heights, data.materials);
        store.set_column_max_cy(column, tile.max_cy);
        tiles.insert(column, tile);

        let mut outcome = IngestOutcome::default();
        let mut loaded_keys = Vec::new();
        for chunk_data in data.chunks {
            let key = ChunkKey::new(column.0, chunk_data.chunk_y, column.1);
            let mut chunk = Chunk::from_voxels(decode_voxels(&chunk_data.voxel_data), chunk_data.last_build_seq);
            chunk.recompute_derived(palette);
            store.insert(key, chunk);
            outcome.events.push(TerrainEvent::ChunkLoaded(key));
            loaded_keys.push(key);
        }

        for key in loaded_keys {
            for touched in LightingEngine::relight_cascade(store, key, palette) {
                outcome.remesh.insert(touched);
            }
        }

        scheduler.mark_initial_column_received();
        let drained = applier.drain_deferred(store, palette);
        outcome.remesh.extend(drained.remesh_batch);

        outcome
    }
}

fn decode_voxels(raw: &[u16; CHUNK_SIZE_CUBED]) -> Box<[Voxel; CHUNK_SIZE_CUBED]> {
    let mut out = Box::new([Voxel::EMPTY; CHUNK_SIZE_CUBED]);
    for (slot, &word) in out.iter_mut().zip(raw.iter()) {
        *slot = Voxel::from_raw(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::CHUNK_SIZE;
    use crate::map_tile::MAP_TILE_SIZE;
    use crate::material::Material;
    use crate::network::SurfaceColumnChunk;
    use crate::position::LocalPos;

    fn palette() -> MaterialPalette {
        MaterialPalette::new(vec![
            Material { name: "air".into(), solid: false, transparent: true, liquid: false },
            Material { name: "stone".into(), solid: true, transparent: false, liquid: false },
        ])
    }

    #[test]
    fn ingesting_a_chunk_lights_it_and_emits_a_load_event() {
        let mut store = VoxelStore::new();
        let mut applier = BuildApplier::new();
        let palette = palette();

        let data = ChunkData {
            chunk_x: 0,
            chunk_y: 0,
            chunk_z: 0,
            voxel_data: Box::new([0u16; CHUNK_SIZE_CUBED]),
            last_build_seq: 0,
        };

        let outcome = DataIngestor::ingest_chunk(&mut store, &palette, &mut applier, data);
        assert!(outcome.events.contains(&TerrainEvent::ChunkLoaded(ChunkKey::new(0, 0, 0))));
        assert!(outcome.remesh.contains(&ChunkKey::new(0, 0, 0)));

        let chunk = store.get(ChunkKey::new(0, 0, 0)).unwrap();
        assert!(chunk.get(LocalPos::new(5, 5, 5)).sky_exposed());
    }

    #[test]
    fn ingesting_a_chunk_drains_a_deferred_build_waiting_on_it() {
        use crate::geometry::{BuildConfig, BuildMode, BuildOperation, BuildShape};
        use glam::{Quat, Vec3};

        let mut store = VoxelStore::new();
        let mut applier = BuildApplier::new();
        let palette = palette();

        let op = BuildOperation {
            center: Vec3::splat(8.0),
            rotation: Quat::IDENTITY,
            config: BuildConfig { shape: BuildShape::Sphere, mode: BuildMode::Add, size: Vec3::splat(4.0), material: 1 },
            sequence: 1,
        };
        applier.submit(op, &mut store, &palette);
        assert!(applier.has_deferred());

        let data = ChunkData {
            chunk_x: 0,
            chunk_y: 0,
            chunk_z: 0,
            voxel_data: Box::new([0u16; CHUNK_SIZE_CUBED]),
            last_build_seq: 0,
        };
        let outcome = DataIngestor::ingest_chunk(&mut store, &palette, &mut applier, data);

        assert!(!applier.has_deferred());
        assert!(outcome.remesh.contains(&ChunkKey::new(0, 0, 0)));
        assert!(!store.get(ChunkKey::new(0, 0, 0)).unwrap().get(LocalPos::new(8, 8, 8)).is_empty());
    }

    #[test]
    fn ingesting_a_surface_column_marks_the_scheduler_gate_and_tile_cache() {
        let mut store = VoxelStore::new();
        let mut tiles = MapTileCache::new();
        let mut applier = BuildApplier::new();
        let mut scheduler = RequestScheduler::new();
        let palette = palette();

        let tile_area = MAP_TILE_SIZE * MAP_TILE_SIZE;
        let data = SurfaceColumnData {
            tx: 0,
            tz: 0,
            heights: vec![CHUNK_SIZE as i16; tile_area].into_boxed_slice().try_into().unwrap(),
            materials: vec![1u8; tile_area].into_boxed_slice().try_into().unwrap(),
            chunks: vec![SurfaceColumnChunk {
                chunk_y: 0,
                last_build_seq: 0,
                voxel_data: Box::new([0u16; CHUNK_SIZE_CUBED]),
            }],
        };

        let config = crate::config::EngineConfig::default();
        scheduler.tick(&mut store, &config, ChunkKey::new(0, 0, 0), &HashSet::new());

        let outcome =
            DataIngestor::ingest_surface_column(&mut store, &mut tiles, &palette, &mut applier, &mut scheduler, data);

        let requests = scheduler.tick(&mut store, &config, ChunkKey::new(0, 0, 0), &HashSet::new());
        assert!(requests.is_empty(), "scheduler should be past the initial-column gate already");
        assert!(tiles.contains((0, 0)));
        assert!(store.contains(ChunkKey::new(0, 0, 0)));
        assert!(!outcome.events.is_empty());
    }
}
