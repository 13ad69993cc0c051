use derive_more::{Add, From, Sub};
use glam::{IVec3, UVec3, Vec3};

use crate::chunk::{CHUNK_SIZE, CHUNK_SIZE_I32, CHUNK_SIZE_LOG2, CHUNK_SIZE_U32};

/// Position of a voxel in the world, in voxel units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Add, From, Sub)]
pub struct GlobalPos(IVec3);

impl GlobalPos {
    pub const ZERO: Self = Self(IVec3::ZERO);

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }

    pub fn from_local_and_chunk(local: LocalPos, chunk: ChunkKey) -> Self {
        (local.0.as_ivec3() + chunk.0 * CHUNK_SIZE_I32).into()
    }

    /// Split a global position into the local position within its chunk and the chunk's key.
    pub fn split(&self) -> (LocalPos, ChunkKey) {
        let local = (self.0 & (CHUNK_SIZE_I32 - 1)).as_uvec3().into();
        let chunk = (self.0 >> (CHUNK_SIZE_LOG2 as i32)).into();
        (local, chunk)
    }

    pub fn as_ivec3(&self) -> IVec3 {
        self.0
    }

    pub fn as_vec3(&self) -> Vec3 {
        self.0.as_vec3()
    }
}

/// Position of a voxel within its chunk, in `[0, CHUNK_SIZE)` on each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Add, From, Sub)]
pub struct LocalPos(UVec3);

impl LocalPos {
    pub const ZERO: Self = Self(UVec3::ZERO);

    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self(UVec3::new(x, y, z))
    }

    /// The flat voxel-array index for this position, following the engine's fixed layout:
    /// `index = x + (z + y * CHUNK_SIZE) * CHUNK_SIZE`.
    pub fn array_index(&self) -> usize {
        (self.0.x + (self.0.z + self.0.y * CHUNK_SIZE_U32) * CHUNK_SIZE_U32) as usize
    }

    pub fn from_array_index(index: usize) -> Self {
        let index = index as u32;
        let x = index % CHUNK_SIZE_U32;
        let z = (index / CHUNK_SIZE_U32) % CHUNK_SIZE_U32;
        let y = index / (CHUNK_SIZE_U32 * CHUNK_SIZE_U32);
        Self(UVec3::new(x, y, z))
    }

    pub fn as_uvec3(&self) -> UVec3 {
        self.0
    }

    pub fn as_ivec3(&self) -> IVec3 {
        self.0.as_ivec3()
    }

    /// If `self + offset` stays within the chunk, returns it; otherwise `None`.
    pub fn try_add(&self, offset: IVec3) -> Option<LocalPos> {
        let sum = self.0.as_ivec3() + offset;
        let in_bounds = sum.cmpge(IVec3::ZERO).all() && sum.cmplt(IVec3::splat(CHUNK_SIZE_I32)).all();
        in_bounds.then(|| Self(sum.as_uvec3()))
    }

    pub fn on_boundary(&self, margin: u32) -> bool {
        self.0.x < margin
            || self.0.y < margin
            || self.0.z < margin
            || self.0.x >= CHUNK_SIZE_U32 - margin
            || self.0.y >= CHUNK_SIZE_U32 - margin
            || self.0.z >= CHUNK_SIZE_U32 - margin
    }
}

/// Position of a chunk in the world, in chunk units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Add, From, Sub)]
pub struct ChunkKey(IVec3);

impl ChunkKey {
    pub const ZERO: Self = Self(IVec3::ZERO);

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }

    pub fn as_ivec3(&self) -> IVec3 {
        self.0
    }

    pub fn as_vec3(&self) -> Vec3 {
        self.0.as_vec3()
    }

    pub fn neighbor(&self, face: crate::util::face::FaceIndex) -> ChunkKey {
        Self(self.0 + crate::util::face::FACE_NORMALS[face.as_usize()])
    }

    pub fn column(&self) -> (i32, i32) {
        (self.0.x, self.0.z)
    }

    pub fn from_world_pos(pos: Vec3) -> ChunkKey {
        Self((pos / CHUNK_SIZE as f32).floor().as_ivec3())
    }
}

impl std::ops::Add<IVec3> for ChunkKey {
    type Output = ChunkKey;
    fn add(self, rhs: IVec3) -> ChunkKey {
        Self(self.0 + rhs)
    }
}
