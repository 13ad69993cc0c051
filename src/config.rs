/// Tunable constants for the engine, collected in one place so the host
/// application configures a single value instead of scattered globals.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub max_pending_tiles: usize,
    pub max_pending_chunks: usize,
    pub max_dispatches_per_frame: usize,
    pub visibility_unload_buffer: i32,
    pub worker_count: usize,
    pub batch_group_size: u32,
    pub walkable_slope_cos: f32,
    pub collision_passes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pending_tiles: 4,
            max_pending_chunks: 4,
            max_dispatches_per_frame: 8,
            visibility_unload_buffer: 2,
            worker_count: 2,
            batch_group_size: 4,
            walkable_slope_cos: 0.7,
            collision_passes: 4,
        }
    }
}

impl EngineConfig {
    /// `shadow_radius = visibility_radius / 2`, rounded down, minimum 1.
    pub fn shadow_radius(visibility_radius: u8) -> u8 {
        (visibility_radius / 2).max(1)
    }
}
