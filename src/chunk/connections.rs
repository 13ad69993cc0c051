use std::collections::VecDeque;

use glam::UVec3;

use super::{CHUNK_SIZE_CUBED, CHUNK_SIZE_U32};
use crate::material::MaterialPalette;
use crate::position::LocalPos;
use crate::util::face::{FaceIndex, FACE_NORMALS};
use crate::voxel::Voxel;

/// "Visibility graph" from https://tomcc.github.io/2014/08/31/visibility-1.html
/// For each pair of faces, stores whether the faces are connected by non-solid voxels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkConnections(u16);

impl ChunkConnections {
    pub const EMPTY: Self = Self(0);

    /// Compute the visibility graph for the given voxel array.
    pub fn compute(voxels: &[Voxel; CHUNK_SIZE_CUBED], palette: &MaterialPalette) -> Self {
        let mut connection_bits: u16 = 0;
        let mut explored = [false; CHUNK_SIZE_CUBED];
        let mut frontier = VecDeque::new();

        // Start a flood fill from every voxel on the chunk's boundary, rather than every
        // voxel in the chunk, to avoid wasting time exploring enclosed cave pockets that
        // can never reach a face.
        for chunk_face in 0..6 {
            for v in 0..CHUNK_SIZE_U32 {
                for u in 0..CHUNK_SIZE_U32 {
                    let mut escaped = [false; 6];

                    let start_pos = LocalPos::from(
                        FACE_START[chunk_face] + FACE_DIR_U[chunk_face] * u + FACE_DIR_V[chunk_face] * v,
                    );
                    let array_index = start_pos.array_index();

                    if explored[array_index] {
                        continue;
                    }
                    if palette.is_solid(voxels[array_index].material()) {
                        continue;
                    }

                    frontier.push_back(start_pos);
                    while let Some(pos) = frontier.pop_front() {
                        if explored[pos.array_index()] {
                            continue;
                        }
                        explored[pos.array_index()] = true;

                        for face in 0..6 {
                            if let Some(neighbor) = pos.try_add(FACE_NORMALS[face]) {
                                let neighbor_index = neighbor.array_index();
                                if explored[neighbor_index] {
                                    continue;
                                }
                                if palette.is_solid(voxels[neighbor_index].material()) {
                                    continue;
                                }
                                frontier.push_back(neighbor);
                            } else {
                                escaped[face] = true;
                            }
                        }
                    }

                    for a in 0..6 {
                        for b in (a + 1)..6 {
                            if escaped[a] && escaped[b] {
                                connection_bits |= 1 << CONNECTION_INDICES[a * 6 + b];
                            }
                        }
                    }
                }
            }
        }

        Self(connection_bits)
    }

    /// True if face A is connected to face B through non-solid voxels. If not connected,
    /// face B cannot be visible through face A and vice versa.
    pub fn connected(&self, face_a: FaceIndex, face_b: FaceIndex) -> bool {
        let index = CONNECTION_INDICES[face_a.as_usize() * 6 + face_b.as_usize()];
        self.0 & (1 << index) != 0
    }

    pub fn raw(&self) -> u16 {
        self.0
    }
}

const FACE_START: [UVec3; 6] = [
    UVec3::ZERO,
    UVec3::ZERO,
    UVec3::ZERO,
    UVec3::new(0, 0, CHUNK_SIZE_U32 - 1),
    UVec3::new(0, CHUNK_SIZE_U32 - 1, 0),
    UVec3::new(CHUNK_SIZE_U32 - 1, 0, 0),
];
const FACE_DIR_U: [UVec3; 6] = [
    UVec3::new(1, 0, 0),
    UVec3::new(1, 0, 0),
    UVec3::new(0, 1, 0),
    UVec3::new(1, 0, 0),
    UVec3::new(1, 0, 0),
    UVec3::new(0, 1, 0),
];
const FACE_DIR_V: [UVec3; 6] = [
    UVec3::new(0, 1, 0),
    UVec3::new(0, 0, 1),
    UVec3::new(0, 0, 1),
    UVec3::new(0, 1, 0),
    UVec3::new(0, 0, 1),
    UVec3::new(0, 0, 1),
];

// bit indices for each unordered pair of faces; diagonal entries are unused
#[rustfmt::skip]
const CONNECTION_INDICES: [u16; 36] = [
    15, 0, 1, 2, 3, 4,
    0, 15, 5, 6, 7, 8,
    1, 5, 15, 9, 10, 11,
    2, 6, 9, 15, 12, 13,
    3, 7, 10, 12, 15, 14,
    4, 8, 11, 13, 14, 15,
];

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
    fn empty_chunk_connects_every_face_pair() {
        let voxels = Box::new([Voxel::EMPTY; CHUNK_SIZE_CUBED]);
        let conns = ChunkConnections::compute(&voxels, &palette());
        assert!(conns.connected(FaceIndex::POS_X, FaceIndex::NEG_X));
        assert!(conns.connected(FaceIndex::POS_Y, FaceIndex::NEG_Z));
    }

    #[test]
    fn fully_solid_chunk_connects_nothing() {
        let voxels = Box::new([Voxel::new(1, 0, false); CHUNK_SIZE_CUBED]);
        let conns = ChunkConnections::compute(&voxels, &palette());
        assert!(!conns.connected(FaceIndex::POS_X, FaceIndex::NEG_X));
    }

    #[test]
    fn connectivity_is_symmetric_by_construction() {
        let voxels = Box::new([Voxel::EMPTY; CHUNK_SIZE_CUBED]);
        let conns = ChunkConnections::compute(&voxels, &palette());
        for a in 0..6 {
            for b in 0..6 {
                assert_eq!(
                    conns.connected(FaceIndex(a), FaceIndex(b)),
                    conns.connected(FaceIndex(b), FaceIndex(a))
                );
            }
        }
    }
}
