use crate::position::ChunkKey;

/// Observable lifecycle events, drained by the host application each tick
/// without coupling the core to any specific consumer (HUD, minimap, sound cues).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerrainEvent {
    ChunkLoaded(ChunkKey),
    ChunkUnloaded(ChunkKey),
    ChunkRemeshed(ChunkKey),
    BuildApplied(u32),
}
