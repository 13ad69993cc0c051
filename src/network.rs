use crate::chunk::CHUNK_SIZE_CUBED;
use crate::geometry::BuildOperation;
use crate::map_tile::MAP_TILE_SIZE;

const TILE_AREA: usize = MAP_TILE_SIZE * MAP_TILE_SIZE;

/// Decoded chunk payload; wire framing is the transport layer's concern.
pub struct ChunkData {
    pub chunk_x: i32,
    pub chunk_y: i32,
    pub chunk_z: i32,
    pub voxel_data: Box<[u16; CHUNK_SIZE_CUBED]>,
    pub last_build_seq: u32,
}

pub struct TileData {
    pub tx: i32,
    pub tz: i32,
    pub heights: Box<[i16; TILE_AREA]>,
    pub materials: Box<[u8; TILE_AREA]>,
}

pub struct SurfaceColumnChunk {
    pub chunk_y: i32,
    pub last_build_seq: u32,
    pub voxel_data: Box<[u16; CHUNK_SIZE_CUBED]>,
}

/// A tile plus every non-empty chunk in that column, ordered bottom-up by the server.
pub struct SurfaceColumnData {
    pub tx: i32,
    pub tz: i32,
    pub heights: Box<[i16; TILE_AREA]>,
    pub materials: Box<[u8; TILE_AREA]>,
    pub chunks: Vec<SurfaceColumnChunk>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildResult {
    Success,
    RejectedOutOfBounds,
    RejectedPermission,
}

pub struct BuildCommit {
    pub intent: BuildOperation,
    pub result: BuildResult,
}

/// Outbound requests, encoded and handed to an opaque `send_binary` sink.
#[derive(Clone, Copy, Debug)]
pub enum OutgoingRequest {
    Chunk { chunk_x: i32, chunk_y: i32, chunk_z: i32, force_regen: bool },
    Tile { tx: i32, tz: i32 },
    SurfaceColumn { tx: i32, tz: i32 },
}
