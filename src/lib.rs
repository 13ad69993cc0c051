pub mod batch;
pub mod build;
pub mod chunk;
pub mod collision;
pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod ingest;
pub mod lighting;
pub mod map_tile;
pub mod material;
pub mod mesher;
pub mod network;
pub mod position;
pub mod scheduler;
pub mod store;
pub mod util;
pub mod visibility;
pub mod voxel;
pub mod workers;

use std::collections::HashSet;
use std::sync::Arc;

use glam::Vec3;

use build::{BuildApplier, BuildOutcome};
use collision::{Capsule, CapsuleResult, CollisionWorld};
use config::EngineConfig;
use error::{EngineError, Result};
use event::TerrainEvent;
use geometry::BuildOperation;
use ingest::DataIngestor;
use map_tile::{MapTile, MapTileCache};
use material::MaterialPalette;
use mesher::expand_chunk;
use network::{BuildCommit, BuildResult, ChunkData, OutgoingRequest, SurfaceColumnData, TileData};
use position::ChunkKey;
use scheduler::RequestScheduler;
use store::{RaycastHit, VoxelStore};
use visibility::{Frustum, VisibilitySearch, VisibilityResult};
use workers::{TaskPriority, WorkerPool};

/// The client-side voxel world engine: one value owning the whole pipeline from
/// "where is the observer" to "what mesh groups does the renderer draw this frame".
///
/// Everything but meshing runs on the thread that calls [`VoxelEngine::update`];
/// the worker pool is the only off-thread component (§5 of the design notes).
pub struct VoxelEngine {
    config: EngineConfig,
    palette: Arc<MaterialPalette>,

    store: VoxelStore,
    tiles: MapTileCache,
    scheduler: RequestScheduler,
    applier: BuildApplier,
    batch: batch::TerrainBatch,
    collision: CollisionWorld,
    workers: WorkerPool,

    observer_position: Option<Vec3>,
    observer_chunk: Option<ChunkKey>,
    visibility_radius: u8,
    frustum: Frustum,
    camera_forward: Vec3,

    cached_visibility: Option<VisibilityResult>,
    remesh_queue: HashSet<ChunkKey>,
    /// Chunks a deferred build needs that aren't in the visibility BFS's own
    /// `to_request` set; folded into the scheduler's desired set each tick so they
    /// actually get requested instead of sitting pending forever.
    build_wants: HashSet<ChunkKey>,
    next_batch_id: u64,

    events: Vec<TerrainEvent>,
}

impl VoxelEngine {
    pub fn new(config: EngineConfig) -> Self {
        let palette = Arc::new(default_palette());
        Self::with_palette(config, palette)
    }

    pub fn with_palette(config: EngineConfig, palette: Arc<MaterialPalette>) -> Self {
        let workers = WorkerPool::new(config.worker_count, palette.clone());
        let collision = CollisionWorld::new(config.walkable_slope_cos, config.collision_passes);
        let batch_group_size = config.batch_group_size;

        Self {
            config,
            palette,
            store: VoxelStore::new(),
            tiles: MapTileCache::new(),
            scheduler: RequestScheduler::new(),
            applier: BuildApplier::new(),
            batch: batch::TerrainBatch::new(batch_group_size),
            collision,
            workers,
            observer_position: None,
            observer_chunk: None,
            visibility_radius: 8,
            frustum: wide_open_frustum(),
            camera_forward: Vec3::NEG_Z,
            cached_visibility: None,
            remesh_queue: HashSet::new(),
            build_wants: HashSet::new(),
            next_batch_id: 0,
            events: Vec::new(),
        }
    }

    pub fn set_observer_position(&mut self, position: Vec3) {
        let chunk = ChunkKey::from_world_pos(position);
        if self.observer_chunk != Some(chunk) {
            self.cached_visibility = None;
        }
        self.observer_position = Some(position);
        self.observer_chunk = Some(chunk);
    }

    pub fn set_camera(&mut self, frustum: Frustum, forward: Vec3) {
        self.frustum = frustum;
        self.camera_forward = forward;
    }

    pub fn set_visibility_radius(&mut self, radius: u8) {
        if self.visibility_radius != radius {
            self.visibility_radius = radius;
            self.cached_visibility = None;
        }
    }

    pub fn map_tile(&self, tx: i32, tz: i32) -> Option<&MapTile> {
        self.tiles.get((tx, tz))
    }

    pub fn height_at(&self, world_x: i32, world_z: i32) -> Option<i32> {
        self.tiles.height_at(world_x, world_z)
    }

    pub fn drain_events(&mut self) -> Vec<TerrainEvent> {
        std::mem::take(&mut self.events)
    }

    /// Applies a build commit from the network layer. Rejected commits are dropped
    /// silently; the server is the sole authority on whether an intent succeeds.
    pub fn apply_build_commit(&mut self, commit: BuildCommit) {
        if commit.result != BuildResult::Success {
            return;
        }
        self.submit_build(commit.intent);
    }

    fn submit_build(&mut self, op: BuildOperation) {
        let outcome = self.applier.submit(op, &mut self.store, &self.palette);
        self.absorb_build_outcome(outcome);
        self.events.push(TerrainEvent::BuildApplied(op.sequence));
    }

    fn absorb_build_outcome(&mut self, outcome: BuildOutcome) {
        self.remesh_queue.extend(outcome.remesh_batch);
        if outcome.bfs_cache_invalidated {
            self.cached_visibility = None;
        }
        self.build_wants.extend(outcome.chunks_to_request);
    }

    pub fn ingest_chunk(&mut self, data: ChunkData) {
        let is_new = !self.store.contains(ChunkKey::new(data.chunk_x, data.chunk_y, data.chunk_z));
        let outcome = DataIngestor::ingest_chunk(&mut self.store, &self.palette, &mut self.applier, data);
        self.remesh_queue.extend(outcome.remesh);
        self.events.extend(outcome.events);
        if is_new {
            self.cached_visibility = None;
        }
    }

    pub fn ingest_tile(&mut self, data: TileData) {
        DataIngestor::ingest_tile(&mut self.store, &mut self.tiles, data);
        self.cached_visibility = None;
    }

    pub fn ingest_surface_column(&mut self, data: SurfaceColumnData) {
        let outcome = DataIngestor::ingest_surface_column(
            &mut self.store,
            &mut self.tiles,
            &self.palette,
            &mut self.applier,
            &mut self.scheduler,
            data,
        );
        self.remesh_queue.extend(outcome.remesh);
        self.events.extend(outcome.events);
        self.cached_visibility = None;
    }

    /// Casts a ray from the current camera position along `direction`, stopping at
    /// the first solid voxel within `max_distance`. Used for block-picking; `None`
    /// means the ray missed or left loaded terrain before hitting anything.
    pub fn pick_block(&self, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        let origin = self.observer_position?;
        self.store.raymarch(origin, direction, max_distance, &self.palette)
    }

    pub fn resolve_capsule(&mut self, capsule: Capsule, velocity: Vec3) -> CapsuleResult {
        self.collision.rebuild_if_dirty(&self.batch);
        self.collision.resolve_capsule(capsule, velocity)
    }

    /// Drops every chunk and pending-request marker, then starts fresh around
    /// `observer_position`. Used on reconnect; the worker pool is preserved.
    pub fn clear_and_reload(&mut self, observer_position: Vec3) {
        self.store.clear();
        self.tiles.clear();
        self.scheduler = RequestScheduler::new();
        self.applier = BuildApplier::new();
        self.batch = batch::TerrainBatch::new(self.config.batch_group_size);
        self.collision = CollisionWorld::new(self.config.walkable_slope_cos, self.config.collision_passes);
        self.cached_visibility = None;
        self.remesh_queue.clear();
        self.set_observer_position(observer_position);
    }

    /// Runs the per-frame pipeline in the order described by the system overview:
    /// visibility → scheduling → dispatch → applying finished mesh results → batch
    /// rebuild. Requires a prior call to [`Self::set_observer_position`].
    pub fn update(&mut self, _dt: f32) -> Result<Vec<OutgoingRequest>> {
        let Some(observer_chunk) = self.observer_chunk else {
            return Err(EngineError::ContractViolation("update called before set_observer_position"));
        };

        let visibility = self.cached_visibility.get_or_insert_with(|| {
            VisibilitySearch::search(
                &self.store,
                observer_chunk,
                self.visibility_radius as i32,
                &self.frustum,
                self.camera_forward,
            )
        });
        self.build_wants.retain(|key| !self.store.contains(*key));
        let mut desired = visibility.to_request.clone();
        desired.extend(self.build_wants.iter().copied());

        let requests = self.scheduler.tick(&mut self.store, &self.config, observer_chunk, &desired);

        self.dispatch_remesh_queue(observer_chunk);
        self.apply_worker_results();

        self.batch.rebuild();
        self.update_shadow_casting(observer_chunk);
        self.collision.mark_dirty();

        self.unload_far_chunks(observer_chunk);

        Ok(requests)
    }

    /// Flags each group as shadow-casting iff its center lies within the
    /// shadow-casting distance of the observer. Must run after every `rebuild()`,
    /// since rebuilding a dirty group otherwise leaves its flag at whatever
    /// `rebuild` happened to preserve from before this frame's observer motion.
    fn update_shadow_casting(&mut self, observer_chunk: ChunkKey) {
        let shadow_radius = EngineConfig::shadow_radius(self.visibility_radius) as i32;
        let group_size = self.batch.group_size();
        let observer = observer_chunk.as_ivec3();

        let flags: Vec<(batch::GroupKey, bool)> = self
            .batch
            .groups()
            .map(|(&key, _)| {
                let d = (key.center_chunk(group_size) - observer).abs();
                let within = d.x.max(d.y).max(d.z) <= shadow_radius;
                (key, within)
            })
            .collect();

        for (key, within) in flags {
            self.batch.set_shadow_casting(key, within);
        }
    }

    fn dispatch_remesh_queue(&mut self, observer_chunk: ChunkKey) {
        if self.remesh_queue.is_empty() {
            return;
        }

        let mut candidates: Vec<ChunkKey> = self
            .remesh_queue
            .iter()
            .copied()
            .filter(|key| {
                self.store.contains(*key) && !self.workers.is_in_flight(*key) && !self.workers.is_preview_chunk(*key)
            })
            .collect();
        candidates.sort_by_key(|key| {
            let d = key.as_ivec3() - observer_chunk.as_ivec3();
            d.length_squared()
        });
        candidates.truncate(self.config.max_dispatches_per_frame);

        for key in &candidates {
            self.remesh_queue.remove(key);
        }

        if candidates.len() == 1 {
            let key = candidates[0];
            let (grid, skip_high_boundary) = expand_chunk(&self.store, key);
            self.workers.dispatch(key, grid, skip_high_boundary, TaskPriority::default());
        } else if !candidates.is_empty() {
            let batch_id = self.next_batch_id;
            self.next_batch_id += 1;
            let items = candidates
                .into_iter()
                .map(|key| {
                    let (grid, skip_high_boundary) = expand_chunk(&self.store, key);
                    (key, grid, skip_high_boundary)
                })
                .collect();
            self.workers.dispatch_batch(items, TaskPriority::default(), batch_id);
        }
    }

    fn apply_worker_results(&mut self) {
        for (key, result) in self.workers.poll_results() {
            self.apply_mesh_result(key, result);
        }
        for (_, items) in self.workers.poll_batches() {
            for (key, result) in items {
                self.apply_mesh_result(key, result);
            }
        }
    }

    fn apply_mesh_result(&mut self, key: ChunkKey, result: mesher::MeshResult) {
        if !self.store.contains(key) {
            return;
        }
        self.batch.update_chunk_mesh(key, result);
        if let Some(chunk) = self.store.get_mut(key) {
            chunk.clear_dirty();
        }
        self.events.push(TerrainEvent::ChunkRemeshed(key));
    }

    /// Unloads chunks that have drifted outside `visibility_radius + unload_buffer`,
    /// the hysteresis gap that prevents load/unload thrashing at the boundary.
    fn unload_far_chunks(&mut self, observer_chunk: ChunkKey) {
        let unload_radius = self.visibility_radius as i32 + self.config.visibility_unload_buffer;
        let far: Vec<ChunkKey> = self
            .store
            .iter()
            .map(|(key, _)| key)
            .filter(|key| {
                let d = key.as_ivec3() - observer_chunk.as_ivec3();
                d.x.abs().max(d.y.abs()).max(d.z.abs()) > unload_radius
            })
            .collect();

        if !far.is_empty() {
            self.cached_visibility = None;
        }
        for key in far {
            self.store.remove(key);
            self.batch.remove_chunk(key);
            self.events.push(TerrainEvent::ChunkUnloaded(key));
        }
    }
}

fn wide_open_frustum() -> Frustum {
    Frustum {
        planes: [
            (Vec3::X, 1e9),
            (Vec3::NEG_X, 1e9),
            (Vec3::Y, 1e9),
            (Vec3::NEG_Y, 1e9),
            (Vec3::Z, 1e9),
            (Vec3::NEG_Z, 1e9),
        ],
    }
}

fn default_palette() -> MaterialPalette {
    MaterialPalette::new(vec![
        material::Material { name: "air".into(), solid: false, transparent: true, liquid: false },
        material::Material { name: "stone".into(), solid: true, transparent: false, liquid: false },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk::CHUNK_SIZE_CUBED;

    #[test]
    fn update_before_set_observer_position_is_a_contract_violation() {
        let mut engine = VoxelEngine::new(EngineConfig::default());
        let result = engine.update(0.016);
        assert!(matches!(result, Err(EngineError::ContractViolation(_))));
    }

    #[test]
    fn first_update_after_setting_observer_requests_the_surface_column() {
        let mut engine = VoxelEngine::new(EngineConfig::default());
        engine.set_observer_position(Vec3::new(8.0, 8.0, 8.0));
        let requests = engine.update(0.016).unwrap();
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], OutgoingRequest::SurfaceColumn { .. }));
    }

    #[test]
    fn ingesting_a_chunk_queues_it_for_remesh_and_eventually_produces_a_batch_group() {
        let mut engine = VoxelEngine::new(EngineConfig::default());
        engine.set_observer_position(Vec3::new(8.0, 8.0, 8.0));
        engine.update(0.016).unwrap();

        let mut voxels = Box::new([0u16; CHUNK_SIZE_CUBED]);
        for slot in voxels.iter_mut() {
            *slot = voxel::Voxel::new(1, 0, false).raw();
        }
        engine.ingest_chunk(ChunkData { chunk_x: 0, chunk_y: 0, chunk_z: 0, voxel_data: voxels, last_build_seq: 0 });
        assert!(!engine.remesh_queue.is_empty());

        engine.update(0.016).unwrap();
        engine.workers.block_until_finished();
        engine.update(0.016).unwrap();

        assert!(engine.batch.group_count() > 0);
        let nearby_group = batch::GroupKey::of(ChunkKey::new(0, 0, 0), engine.batch.group_size());
        let merged = engine.batch.groups().find(|(k, _)| **k == nearby_group).unwrap().1;
        assert!(merged.shadow_casting, "a group centered near the observer should cast shadows");
    }

    #[test]
    fn pick_block_finds_the_solid_voxel_below_the_observer() {
        let mut engine = VoxelEngine::new(EngineConfig::default());
        engine.set_observer_position(Vec3::new(8.0, 10.0, 8.0));

        let mut voxels = Box::new([0u16; CHUNK_SIZE_CUBED]);
        voxels[position::LocalPos::new(8, 3, 8).array_index()] = voxel::Voxel::new(1, 0, false).raw();
        engine.ingest_chunk(ChunkData { chunk_x: 0, chunk_y: 0, chunk_z: 0, voxel_data: voxels, last_build_seq: 0 });

        let hit = engine.pick_block(Vec3::NEG_Y, 32.0).expect("ray should hit the seeded voxel");
        assert_eq!(hit.voxel, position::GlobalPos::new(8, 3, 8));
    }

    #[test]
    fn pick_block_without_an_observer_position_returns_none() {
        let engine = VoxelEngine::new(EngineConfig::default());
        assert!(engine.pick_block(Vec3::NEG_Y, 32.0).is_none());
    }

    #[test]
    fn clear_and_reload_drops_loaded_chunks() {
        let mut engine = VoxelEngine::new(EngineConfig::default());
        engine.set_observer_position(Vec3::ZERO);
        engine.ingest_chunk(ChunkData {
            chunk_x: 0,
            chunk_y: 0,
            chunk_z: 0,
            voxel_data: Box::new([0u16; CHUNK_SIZE_CUBED]),
            last_build_seq: 0,
        });
        assert!(engine.store.contains(ChunkKey::new(0, 0, 0)));

        engine.clear_and_reload(Vec3::new(100.0, 0.0, 0.0));
        assert!(!engine.store.contains(ChunkKey::new(0, 0, 0)));
    }
}
