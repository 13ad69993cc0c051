use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::network::OutgoingRequest;
use crate::position::ChunkKey;
use crate::store::VoxelStore;
use crate::util::face::FaceIndex;

/// Decides what to ask the server for, honoring the concurrency caps on in-flight
/// tile and chunk requests and the three-tier priority order: the one-shot initial
/// surface column, tiles for unknown columns, then chunks bounded by each column's
/// known surface height.
#[derive(Default)]
pub struct RequestScheduler {
    initial_column_requested: bool,
    initial_column_received: bool,
}

impl RequestScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_initial_column_received(&mut self) {
        self.initial_column_received = true;
    }

    pub fn has_requested_initial_column(&self) -> bool {
        self.initial_column_requested
    }

    /// Builds the outgoing request list for this tick, given the chunk keys the
    /// visibility search wants loaded, plus any chunks the mesher needs for seamless
    /// stitching (the margin-neighbor supplement described by the request scheduler).
    pub fn tick(
        &mut self,
        store: &mut VoxelStore,
        config: &EngineConfig,
        observer_chunk: ChunkKey,
        desired: &HashSet<ChunkKey>,
    ) -> Vec<OutgoingRequest> {
        if !self.initial_column_requested {
            self.initial_column_requested = true;
            let (tx, tz) = observer_chunk.column();
            store.mark_pending_column((tx, tz));
            return vec![OutgoingRequest::SurfaceColumn { tx, tz }];
        }
        if !self.initial_column_received {
            return Vec::new();
        }

        let mut requests = Vec::new();
        let mut pending_tiles = store.pending_column_count();
        let mut pending_chunks = store.pending_chunk_count();

        let mut desired_sorted: Vec<ChunkKey> = desired.iter().copied().collect();
        desired_sorted.sort_by_key(|k| chebyshev_distance(*k, observer_chunk));

        let margin_extra = margin_neighbors(store, &desired_sorted);

        for key in desired_sorted.into_iter().chain(margin_extra) {
            if store.contains(key) || store.is_pending_chunk(key) {
                continue;
            }

            let column = key.column();
            match store.column_max_cy(column) {
                None => {
                    if pending_tiles >= config.max_pending_tiles || store.is_pending_column(column) {
                        continue;
                    }
                    store.mark_pending_column(column);
                    pending_tiles += 1;
                    requests.push(OutgoingRequest::Tile { tx: column.0, tz: column.1 });
                }
                Some(max_cy) => {
                    if key.as_ivec3().y > max_cy {
                        continue;
                    }
                    if pending_chunks >= config.max_pending_chunks {
                        continue;
                    }
                    store.mark_pending_chunk(key);
                    pending_chunks += 1;
                    requests.push(OutgoingRequest::Chunk {
                        chunk_x: key.as_ivec3().x,
                        chunk_y: key.as_ivec3().y,
                        chunk_z: key.as_ivec3().z,
                        force_regen: false,
                    });
                }
            }
        }

        requests
    }
}

/// For every loaded chunk with an open face, add its unloaded neighbor so the mesher
/// has what it needs to stitch seams, even when the visibility BFS didn't reach it.
fn margin_neighbors(store: &VoxelStore, already_desired: &[ChunkKey]) -> Vec<ChunkKey> {
    let already: HashSet<ChunkKey> = already_desired.iter().copied().collect();
    let mut extra = Vec::new();
    for (key, chunk) in store.iter() {
        for face in 0..6 {
            let face = FaceIndex(face);
            if !chunk.has_surface_on_face(face) {
                continue;
            }
            let neighbor = key.neighbor(face);
            if !store.contains(neighbor) && !already.contains(&neighbor) {
                extra.push(neighbor);
            }
        }
    }
    extra
}

fn chebyshev_distance(a: ChunkKey, b: ChunkKey) -> i32 {
    let d = (a.as_ivec3() - b.as_ivec3()).abs();
    d.x.max(d.y).max(d.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_requests_the_initial_surface_column() {
        let mut scheduler = RequestScheduler::new();
        let mut store = VoxelStore::new();
        let config = EngineConfig::default();
        let requests = scheduler.tick(&mut store, &config, ChunkKey::new(0, 0, 0), &HashSet::new());
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], OutgoingRequest::SurfaceColumn { .. }));
    }

    #[test]
    fn no_chunk_requests_before_initial_column_arrives() {
        let mut scheduler = RequestScheduler::new();
        let mut store = VoxelStore::new();
        let config = EngineConfig::default();
        scheduler.tick(&mut store, &config, ChunkKey::new(0, 0, 0), &HashSet::new());

        let mut desired = HashSet::new();
        desired.insert(ChunkKey::new(1, 0, 0));
        let requests = scheduler.tick(&mut store, &config, ChunkKey::new(0, 0, 0), &desired);
        assert!(requests.is_empty());
    }

    #[test]
    fn chunk_above_known_surface_is_never_requested() {
        let mut scheduler = RequestScheduler::new();
        let mut store = VoxelStore::new();
        store.set_column_max_cy((0, 0), 2);
        scheduler.mark_initial_column_received();

        let config = EngineConfig::default();
        let mut desired = HashSet::new();
        desired.insert(ChunkKey::new(0, 5, 0));
        let requests = scheduler.tick(&mut store, &config, ChunkKey::new(0, 0, 0), &desired);
        assert!(requests.is_empty());
    }

    #[test]
    fn chunk_within_known_surface_is_requested() {
        let mut scheduler = RequestScheduler::new();
        let mut store = VoxelStore::new();
        store.set_column_max_cy((0, 0), 2);
        scheduler.mark_initial_column_received();

        let config = EngineConfig::default();
        let mut desired = HashSet::new();
        desired.insert(ChunkKey::new(0, 1, 0));
        let requests = scheduler.tick(&mut store, &config, ChunkKey::new(0, 0, 0), &desired);
        assert_eq!(requests.len(), 1);
    }
}
