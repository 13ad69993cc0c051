use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};

use crate::material::MaterialPalette;
use crate::mesher::{MeshGrid, MeshResult, Mesher};
use crate::position::ChunkKey;

/// Priority of a mesh job; smaller values run first, matching the convention used
/// throughout this codebase's task scheduling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskPriority {
    pub class_priority: i32,
    pub priority_within_class: i32,
}

/// Pool of worker threads dedicated to meshing. Workers never touch the voxel store;
/// they receive an owned, fully expanded grid and return owned mesh buffers.
pub struct WorkerPool {
    shared: Arc<Shared>,
    in_flight: HashSet<ChunkKey>,
    preview_chunks: HashSet<ChunkKey>,
    palette: Arc<MaterialPalette>,
}

struct Shared {
    mutex: Mutex<SharedState>,
    pending_cond: Condvar,
    finished_cond: Condvar,
}

struct SharedState {
    pending: Vec<(TaskPriority, PendingJob)>,
    results: HashMap<ChunkKey, MeshResult>,
    batch_results: Vec<BatchArrival>,
    scratch_grids: Vec<MeshGrid>,
    active_workers: usize,
    terminate: bool,
}

struct BatchArrival {
    batch_id: u64,
    key: ChunkKey,
    result: MeshResult,
}

struct PendingJob {
    key: ChunkKey,
    grid: MeshGrid,
    skip_high_boundary: [bool; 3],
    batch_id: Option<u64>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, palette: Arc<MaterialPalette>) -> Self {
        let shared = Arc::new(Shared {
            mutex: Mutex::new(SharedState {
                pending: Vec::new(),
                results: HashMap::new(),
                batch_results: Vec::new(),
                scratch_grids: Vec::new(),
                active_workers: 0,
                terminate: false,
            }),
            pending_cond: Condvar::new(),
            finished_cond: Condvar::new(),
        });

        for _ in 0..worker_count.max(1) {
            let shared = shared.clone();
            let palette = palette.clone();
            std::thread::spawn(move || Self::worker_loop(shared, palette));
        }

        Self { shared, in_flight: HashSet::new(), preview_chunks: HashSet::new(), palette }
    }

    /// Returns a scratch grid from the free list, allocating a new one if empty.
    pub fn take_grid(&self) -> MeshGrid {
        let mut lock = self.shared.mutex.lock().expect("worker pool mutex poisoned");
        lock.scratch_grids.pop().unwrap_or_default()
    }

    pub fn is_in_flight(&self, key: ChunkKey) -> bool {
        self.in_flight.contains(&key)
    }

    pub fn is_preview_chunk(&self, key: ChunkKey) -> bool {
        self.preview_chunks.contains(&key)
    }

    pub fn set_preview_chunk(&mut self, key: ChunkKey, preview: bool) {
        if preview {
            self.preview_chunks.insert(key);
        } else {
            self.preview_chunks.remove(&key);
        }
    }

    /// Schedules a single mesh job.
    pub fn dispatch(&mut self, key: ChunkKey, grid: MeshGrid, skip_high_boundary: [bool; 3], priority: TaskPriority) {
        self.in_flight.insert(key);
        let mut lock = self.shared.mutex.lock().expect("worker pool mutex poisoned");
        lock.pending.push((priority, PendingJob { key, grid, skip_high_boundary, batch_id: None }));
        self.shared.pending_cond.notify_one();
    }

    /// Schedules many jobs that must all complete before any of their results are
    /// considered ready, so chunk neighbors never go visible with mismatched meshes.
    pub fn dispatch_batch(&mut self, items: Vec<(ChunkKey, MeshGrid, [bool; 3])>, priority: TaskPriority, batch_id: u64) {
        let mut lock = self.shared.mutex.lock().expect("worker pool mutex poisoned");
        for (key, grid, skip_high_boundary) in items {
            self.in_flight.insert(key);
            lock.pending.push((priority, PendingJob { key, grid, skip_high_boundary, batch_id: Some(batch_id) }));
        }
        self.shared.pending_cond.notify_all();
    }

    /// Drains every single-job result that has completed (non-batched dispatches).
    pub fn poll_results(&mut self) -> Vec<(ChunkKey, MeshResult)> {
        let mut lock = self.shared.mutex.lock().expect("worker pool mutex poisoned");
        let results: Vec<_> = lock.results.drain().collect();
        drop(lock);
        for (key, _) in &results {
            self.in_flight.remove(key);
        }
        results
    }

    /// Drains batches that have fully completed, keyed by `batch_id`. Partial batches
    /// stay buffered until every member has arrived.
    pub fn poll_batches(&mut self) -> Vec<(u64, Vec<(ChunkKey, MeshResult)>)> {
        let mut lock = self.shared.mutex.lock().expect("worker pool mutex poisoned");
        let mut by_batch: HashMap<u64, Vec<(ChunkKey, MeshResult)>> = HashMap::new();
        for arrival in lock.batch_results.drain(..) {
            by_batch.entry(arrival.batch_id).or_default().push((arrival.key, arrival.result));
        }
        drop(lock);
        for items in by_batch.values() {
            for (key, _) in items {
                self.in_flight.remove(key);
            }
        }
        by_batch.into_iter().collect()
    }

    fn worker_loop(shared: Arc<Shared>, palette: Arc<MaterialPalette>) {
        loop {
            let mut lock = shared.mutex.lock().expect("worker pool mutex poisoned");
            lock = shared
                .pending_cond
                .wait_while(lock, |state| state.pending.is_empty() && !state.terminate)
                .expect("worker pool mutex poisoned");

            if lock.terminate {
                break;
            }

            let next_index = lock
                .pending
                .iter()
                .enumerate()
                .min_by_key(|(_, (priority, _))| *priority)
                .map(|(i, _)| i)
                .expect("pending jobs should not be empty");
            let (_, job) = lock.pending.remove(next_index);
            lock.active_workers += 1;
            drop(lock);

            let result = Mesher::mesh(&job.grid, job.skip_high_boundary, &palette);

            let mut lock = shared.mutex.lock().expect("worker pool mutex poisoned");
            lock.scratch_grids.push(job.grid);
            match job.batch_id {
                Some(batch_id) => lock.batch_results.push(BatchArrival { batch_id, key: job.key, result }),
                None => {
                    lock.results.insert(job.key, result);
                }
            }
            lock.active_workers -= 1;
            drop(lock);

            shared.finished_cond.notify_all();
        }
    }

    pub fn block_until_finished(&self) {
        loop {
            let lock = self.shared.mutex.lock().expect("worker pool mutex poisoned");
            if lock.pending.is_empty() && lock.active_workers == 0 {
                break;
            }
            let _guard = self
                .shared
                .finished_cond
                .wait_while(lock, |state| !(state.pending.is_empty() && state.active_workers == 0));
        }
    }

    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let mut lock = self.shared.mutex.lock().expect("worker pool mutex poisoned");
        lock.terminate = true;
        self.shared.pending_cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use std::time::Duration;

    fn palette() -> Arc<MaterialPalette> {
        Arc::new(MaterialPalette::new(vec![
            Material { name: "air".into(), solid: false, transparent: true, liquid: false },
        ]))
    }

    #[test]
    fn dispatch_eventually_produces_a_result() {
        let mut pool = WorkerPool::new(1, palette());
        let grid = pool.take_grid();
        let key = ChunkKey::new(0, 0, 0);
        pool.dispatch(key, grid, [false; 3], TaskPriority::default());
        pool.block_until_finished();
        let results = pool.poll_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, key);
    }

    #[test]
    fn batch_does_not_surface_until_every_member_completes() {
        let mut pool = WorkerPool::new(2, palette());
        let items = vec![
            (ChunkKey::new(0, 0, 0), pool.take_grid(), [false; 3]),
            (ChunkKey::new(1, 0, 0), pool.take_grid(), [false; 3]),
        ];
        pool.dispatch_batch(items, TaskPriority::default(), 1);
        pool.block_until_finished();
        std::thread::sleep(Duration::from_millis(10));
        let batches = pool.poll_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1.len(), 2);
    }
}
