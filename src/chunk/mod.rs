pub mod connections;

use crate::material::MaterialPalette;
use crate::position::LocalPos;
use crate::util::face::FaceIndex;
use crate::voxel::Voxel;

pub use connections::ChunkConnections;

pub const CHUNK_SIZE_LOG2: u32 = 5;
pub const CHUNK_SIZE: usize = 1 << CHUNK_SIZE_LOG2;
pub const CHUNK_SIZE_U32: u32 = CHUNK_SIZE as u32;
pub const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;
pub const CHUNK_SIZE_SQUARED: usize = CHUNK_SIZE * CHUNK_SIZE;
pub const CHUNK_SIZE_CUBED: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Depth, in voxels, of the boundary slab inspected for `face_surface_mask`.
pub const MESH_MARGIN: u32 = 1;

/// An owned 32^3 block of voxels, plus the cached connectivity data derived from it.
#[derive(Clone, Debug)]
pub struct Chunk {
    data: Box<[Voxel; CHUNK_SIZE_CUBED]>,
    dirty: bool,
    visibility_bits: ChunkConnections,
    face_surface_mask: u8,
    last_build_seq: u32,
}

impl Chunk {
    pub fn empty() -> Self {
        Self {
            data: Box::new([Voxel::EMPTY; CHUNK_SIZE_CUBED]),
            dirty: true,
            visibility_bits: ChunkConnections::EMPTY,
            face_surface_mask: 0,
            last_build_seq: 0,
        }
    }

    /// Constructs a chunk from raw voxel data; caller must follow up with
    /// [`Chunk::recompute_derived`] once a palette is available.
    pub fn from_voxels(voxels: Box<[Voxel; CHUNK_SIZE_CUBED]>, last_build_seq: u32) -> Self {
        Self {
            data: voxels,
            dirty: true,
            visibility_bits: ChunkConnections::EMPTY,
            face_surface_mask: 0,
            last_build_seq,
        }
    }

    pub fn get(&self, pos: LocalPos) -> Voxel {
        self.data[pos.array_index()]
    }

    pub fn set(&mut self, pos: LocalPos, voxel: Voxel) {
        self.data[pos.array_index()] = voxel;
    }

    pub fn voxels(&self) -> &[Voxel; CHUNK_SIZE_CUBED] {
        &self.data
    }

    pub fn voxels_mut(&mut self) -> &mut [Voxel; CHUNK_SIZE_CUBED] {
        &mut self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn visibility_bits(&self) -> &ChunkConnections {
        &self.visibility_bits
    }

    pub fn face_surface_mask(&self) -> u8 {
        self.face_surface_mask
    }

    pub fn has_surface_on_face(&self, face: FaceIndex) -> bool {
        self.face_surface_mask & (1 << face.as_usize()) != 0
    }

    pub fn last_build_seq(&self) -> u32 {
        self.last_build_seq
    }

    pub fn set_last_build_seq(&mut self, seq: u32) {
        self.last_build_seq = seq;
    }

    /// Recomputes `visibility_bits` and `face_surface_mask` from the current voxel data.
    /// Must be called after any mutation that could change which voxels are solid.
    pub fn recompute_derived(&mut self, palette: &MaterialPalette) {
        self.visibility_bits = ChunkConnections::compute(&self.data, palette);
        self.face_surface_mask = compute_face_surface_mask(&self.data, palette);
    }
}

fn compute_face_surface_mask(data: &[Voxel; CHUNK_SIZE_CUBED], palette: &MaterialPalette) -> u8 {
    let mut mask = 0u8;
    for face in 0..6 {
        if face_has_non_solid(data, palette, FaceIndex(face)) {
            mask |= 1 << face;
        }
    }
    mask
}

fn face_has_non_solid(data: &[Voxel; CHUNK_SIZE_CUBED], palette: &MaterialPalette, face: FaceIndex) -> bool {
    let margin = MESH_MARGIN;
    for z in 0..CHUNK_SIZE_U32 {
        for y in 0..CHUNK_SIZE_U32 {
            for x in 0..CHUNK_SIZE_U32 {
                let pos = LocalPos::new(x, y, z);
                if !on_face_slab(pos, face, margin) {
                    continue;
                }
                let voxel = data[pos.array_index()];
                if !palette.is_solid(voxel.material()) {
                    return true;
                }
            }
        }
    }
    false
}

fn on_face_slab(pos: LocalPos, face: FaceIndex, margin: u32) -> bool {
    let v = pos.as_uvec3();
    match face.as_usize() {
        0 => v.x >= CHUNK_SIZE_U32 - margin,
        1 => v.y >= CHUNK_SIZE_U32 - margin,
        2 => v.z >= CHUNK_SIZE_U32 - margin,
        3 => v.x < margin,
        4 => v.y < margin,
        5 => v.z < margin,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;

    fn palette() -> MaterialPalette {
        MaterialPalette::new(vec![
            Material { name: "air".into(), solid: false, transparent: true, liquid: false },
            Material { name: "stone".into(), solid: true, transparent: false, liquid: false },
        ])
    }

    #[test]
    fn empty_chunk_has_no_surface() {
        let mut chunk = Chunk::empty();
        chunk.recompute_derived(&palette());
        assert_eq!(chunk.face_surface_mask(), 0b111111);
    }

    #[test]
    fn fully_solid_chunk_has_no_surface() {
        let mut chunk = Chunk::empty();
        for v in chunk.voxels_mut().iter_mut() {
            *v = Voxel::new(1, 0, false);
        }
        chunk.recompute_derived(&palette());
        assert_eq!(chunk.face_surface_mask(), 0);
    }
}
