use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};

use crate::chunk::{CHUNK_SIZE, CHUNK_SIZE_I32};
use crate::material::MaterialPalette;
use crate::position::{ChunkKey, LocalPos};
use crate::store::VoxelStore;
use crate::util::face::FaceIndex;
use crate::voxel::Voxel;

const PADDED_SIZE: i32 = CHUNK_SIZE_I32 + 2;
const PADDED_SIZE_USIZE: usize = CHUNK_SIZE + 2;
const PADDED_VOLUME: usize = PADDED_SIZE_USIZE * PADDED_SIZE_USIZE * PADDED_SIZE_USIZE;

/// Reusable scratch buffer handed out by the worker pool: a chunk's voxels plus a
/// 1-voxel margin copied from its face/edge/corner neighbors.
#[derive(Clone)]
pub struct MeshGrid {
    voxels: Box<[Voxel; PADDED_VOLUME]>,
}

impl MeshGrid {
    pub fn new() -> Self {
        Self { voxels: Box::new([Voxel::EMPTY; PADDED_VOLUME]) }
    }

    fn index(x: i32, y: i32, z: i32) -> usize {
        let x = (x + 1) as usize;
        let y = (y + 1) as usize;
        let z = (z + 1) as usize;
        x + (z + y * PADDED_SIZE_USIZE) * PADDED_SIZE_USIZE
    }

    /// `x, y, z` range over `-1..=CHUNK_SIZE` (inclusive of the margin on both sides).
    pub fn get(&self, x: i32, y: i32, z: i32) -> Voxel {
        self.voxels[Self::index(x, y, z)]
    }

    pub fn set(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) {
        self.voxels[Self::index(x, y, z)] = voxel;
    }
}

impl Default for MeshGrid {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands a chunk and its loaded neighbors into a padded grid, following the mesher's
/// expansion contract: interior copied directly, each margin slab copied from the
/// matching face/edge/corner neighbor when loaded.
pub fn expand_chunk(store: &VoxelStore, key: ChunkKey) -> (MeshGrid, [bool; 3]) {
    let mut grid = MeshGrid::new();
    let mut skip_high_boundary = [false; 3];

    let Some(center) = store.get(key) else {
        return (grid, skip_high_boundary);
    };

    for x in 0..CHUNK_SIZE_I32 {
        for y in 0..CHUNK_SIZE_I32 {
            for z in 0..CHUNK_SIZE_I32 {
                grid.set(x, y, z, center.get(LocalPos::new(x as u32, y as u32, z as u32)));
            }
        }
    }

    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                let neighbor_key = key + IVec3::new(dx, dy, dz);
                let Some(neighbor) = store.get(neighbor_key) else {
                    if dx > 0 {
                        skip_high_boundary[0] = true;
                    }
                    if dy > 0 {
                        skip_high_boundary[1] = true;
                    }
                    if dz > 0 {
                        skip_high_boundary[2] = true;
                    }
                    continue;
                };

                for x in margin_range(dx) {
                    for y in margin_range(dy) {
                        for z in margin_range(dz) {
                            let local_x = wrap_local(x, dx);
                            let local_y = wrap_local(y, dy);
                            let local_z = wrap_local(z, dz);
                            let voxel = neighbor.get(LocalPos::new(local_x as u32, local_y as u32, local_z as u32));
                            grid.set(x, y, z, voxel);
                        }
                    }
                }
            }
        }
    }

    (grid, skip_high_boundary)
}

fn margin_range(delta: i32) -> std::ops::RangeInclusive<i32> {
    match delta {
        -1 => -1..=-1,
        1 => CHUNK_SIZE_I32..=CHUNK_SIZE_I32,
        0 => 0..=(CHUNK_SIZE_I32 - 1),
        _ => unreachable!(),
    }
}

fn wrap_local(coord: i32, delta: i32) -> i32 {
    match delta {
        -1 => coord + CHUNK_SIZE_I32,
        1 => coord - CHUNK_SIZE_I32,
        _ => coord,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmeshClass {
    Solid,
    Transparent,
    Liquid,
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub material_ids: [u32; 3],
    pub material_weights: [f32; 3],
    pub sunlight: f32,
}

#[derive(Clone, Debug, Default)]
pub struct Submesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct MeshResult {
    pub solid: Submesh,
    pub transparent: Submesh,
    pub liquid: Submesh,
}

/// Surface Nets extraction over a padded grid, with per-vertex tri-material blending.
pub struct Mesher;

impl Mesher {
    pub fn mesh(grid: &MeshGrid, skip_high_boundary: [bool; 3], palette: &MaterialPalette) -> MeshResult {
        let mut result = MeshResult::default();
        // vertex index assigned to each dual cell, keyed by its low corner, per submesh
        let mut vertex_index: std::collections::HashMap<(i32, i32, i32, u8), u32> = std::collections::HashMap::new();
        // the single class build_cell_vertex's 8-corner majority vote assigned to each
        // cell; emit_quads looks a cell's class up here instead of reclassifying from
        // just the two edge-endpoint voxels, which can disagree with the vote
        let mut cell_class: std::collections::HashMap<(i32, i32, i32), SubmeshClass> = std::collections::HashMap::new();

        for cx in -1..CHUNK_SIZE_I32 {
            for cy in -1..CHUNK_SIZE_I32 {
                for cz in -1..CHUNK_SIZE_I32 {
                    if cx == CHUNK_SIZE_I32 - 1 && skip_high_boundary[0] {
                        continue;
                    }
                    if cy == CHUNK_SIZE_I32 - 1 && skip_high_boundary[1] {
                        continue;
                    }
                    if cz == CHUNK_SIZE_I32 - 1 && skip_high_boundary[2] {
                        continue;
                    }

                    if let Some((class, vertex)) = Self::build_cell_vertex(grid, cx, cy, cz, palette) {
                        let submesh = Self::submesh_mut(&mut result, class);
                        let index = submesh.vertices.len() as u32;
                        submesh.vertices.push(vertex);
                        vertex_index.insert((cx, cy, cz, class as u8), index);
                        cell_class.insert((cx, cy, cz), class);
                    }
                }
            }
        }

        Self::emit_quads(grid, skip_high_boundary, palette, &cell_class, &vertex_index, &mut result);
        result
    }

    fn submesh_mut(result: &mut MeshResult, class: SubmeshClass) -> &mut Submesh {
        match class {
            SubmeshClass::Solid => &mut result.solid,
            SubmeshClass::Transparent => &mut result.transparent,
            SubmeshClass::Liquid => &mut result.liquid,
        }
    }

    fn is_solid(voxel: Voxel, palette: &MaterialPalette) -> bool {
        !voxel.is_empty() && palette.is_solid(voxel.material())
    }

    fn build_cell_vertex(
        grid: &MeshGrid,
        cx: i32,
        cy: i32,
        cz: i32,
        palette: &MaterialPalette,
    ) -> Option<(SubmeshClass, MeshVertex)> {
        let corners: [Voxel; 8] = std::array::from_fn(|i| {
            let (dx, dy, dz) = CORNER_OFFSETS[i];
            grid.get(cx + dx, cy + dy, cz + dz)
        });
        let occupancy: [bool; 8] = std::array::from_fn(|i| Self::is_solid(corners[i], palette));

        if occupancy.iter().all(|&o| o) || occupancy.iter().all(|&o| !o) {
            return None;
        }

        // vertex position: average of the midpoints of edges that cross the surface
        let mut sum = Vec3::ZERO;
        let mut count = 0;
        let mut normal = Vec3::ZERO;
        for &(a, b) in EDGE_PAIRS.iter() {
            if occupancy[a] != occupancy[b] {
                let pa = corner_pos(a);
                let pb = corner_pos(b);
                sum += (pa + pb) * 0.5;
                count += 1;
                let dir = pb - pa;
                normal += if occupancy[a] { -dir } else { dir };
            }
        }
        let local_vertex_pos = sum / count as f32;
        let position = Vec3::new(cx as f32, cy as f32, cz as f32) + local_vertex_pos;
        let normal = normal.normalize_or_zero();

        // material blending: up to 3 distinct non-air materials, weighted by corner count
        let mut materials: Vec<(u8, u32)> = Vec::new();
        let mut max_sunlight = 0u8;
        for &voxel in &corners {
            max_sunlight = max_sunlight.max(voxel.sunlight());
            if voxel.is_empty() {
                continue;
            }
            if let Some(entry) = materials.iter_mut().find(|(m, _)| *m == voxel.material()) {
                entry.1 += 1;
            } else {
                materials.push((voxel.material(), 1));
            }
        }
        materials.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        materials.truncate(3);
        if materials.is_empty() {
            materials.push((0, 1));
        }
        let total: u32 = materials.iter().map(|(_, c)| c).sum();
        let mut material_ids = [materials[0].0 as u32; 3];
        let mut material_weights = [0.0f32; 3];
        for (i, &(m, c)) in materials.iter().enumerate() {
            material_ids[i] = m as u32;
            material_weights[i] = c as f32 / total as f32;
        }
        for i in materials.len()..3 {
            material_ids[i] = material_ids[0];
        }

        let class = classify(&corners, palette);
        let vertex = MeshVertex {
            position: position.into(),
            normal: normal.into(),
            material_ids,
            material_weights,
            sunlight: max_sunlight as f32,
        };
        Some((class, vertex))
    }

    fn emit_quads(
        grid: &MeshGrid,
        skip_high_boundary: [bool; 3],
        palette: &MaterialPalette,
        cell_class: &std::collections::HashMap<(i32, i32, i32), SubmeshClass>,
        vertex_index: &std::collections::HashMap<(i32, i32, i32, u8), u32>,
        result: &mut MeshResult,
    ) {
        // for each of the 3 axes, walk every edge parallel to that axis and emit a quad
        // from the 4 dual cells surrounding it whenever the edge crosses the surface
        for axis in 0..3 {
            for cx in -1..CHUNK_SIZE_I32 {
                for cy in -1..CHUNK_SIZE_I32 {
                    for cz in -1..CHUNK_SIZE_I32 {
                        let base = (cx, cy, cz);
                        let (a_off, b_off) = axis_edge(axis);
                        let pa = offset(base, (0, 0, 0));
                        let pb = offset(base, axis_step(axis));
                        let va = grid.get(pa.0, pa.1, pa.2);
                        let vb = grid.get(pb.0, pb.1, pb.2);
                        let sa = Self::is_solid(va, palette);
                        let sb = Self::is_solid(vb, palette);
                        if sa == sb {
                            continue;
                        }

                        let quad_cells = [
                            base,
                            offset(base, a_off),
                            offset(base, b_off),
                            offset(base, (a_off.0 + b_off.0, a_off.1 + b_off.1, a_off.2 + b_off.2)),
                        ];

                        if quad_cells.iter().any(|&(x, y, z)| {
                            x < -1 || y < -1 || z < -1 || x >= CHUNK_SIZE_I32 || y >= CHUNK_SIZE_I32 || z >= CHUNK_SIZE_I32
                        }) {
                            continue;
                        }
                        if quad_cells.iter().any(|&(x, y, z)| {
                            (x == CHUNK_SIZE_I32 - 1 && skip_high_boundary[0])
                                || (y == CHUNK_SIZE_I32 - 1 && skip_high_boundary[1])
                                || (z == CHUNK_SIZE_I32 - 1 && skip_high_boundary[2])
                        }) {
                            continue;
                        }

                        // use the class the base cell's own 8-corner vote already settled
                        // on, rather than reclassifying from just these two edge voxels
                        let Some(&class) = cell_class.get(&base) else { continue };
                        let indices: Option<Vec<u32>> = quad_cells
                            .iter()
                            .map(|&(x, y, z)| vertex_index.get(&(x, y, z, class as u8)).copied())
                            .collect();
                        let Some(indices) = indices else { continue };

                        let submesh = Self::submesh_mut(result, class);
                        let winding = if sa { [0, 1, 2, 2, 1, 3] } else { [0, 2, 1, 1, 2, 3] };
                        for &i in &winding {
                            submesh.indices.push(indices[i]);
                        }
                    }
                }
            }
        }
    }
}

fn classify(voxels: &[Voxel], palette: &MaterialPalette) -> SubmeshClass {
    let mut counts = [0u32; 3];
    for &v in voxels {
        if v.is_empty() {
            continue;
        }
        if palette.is_liquid(v.material()) {
            counts[2] += 1;
        } else if palette.is_transparent(v.material()) {
            counts[1] += 1;
        } else {
            counts[0] += 1;
        }
    }
    if counts[2] >= counts[0] && counts[2] >= counts[1] && counts[2] > 0 {
        SubmeshClass::Liquid
    } else if counts[1] >= counts[0] && counts[1] > 0 {
        SubmeshClass::Transparent
    } else {
        SubmeshClass::Solid
    }
}

const CORNER_OFFSETS: [(i32, i32, i32); 8] = [
    (0, 0, 0),
    (1, 0, 0),
    (0, 1, 0),
    (1, 1, 0),
    (0, 0, 1),
    (1, 0, 1),
    (0, 1, 1),
    (1, 1, 1),
];

fn corner_pos(index: usize) -> Vec3 {
    let (x, y, z) = CORNER_OFFSETS[index];
    Vec3::new(x as f32, y as f32, z as f32)
}

const EDGE_PAIRS: [(usize, usize); 12] = [
    (0, 1), (2, 3), (4, 5), (6, 7),
    (0, 2), (1, 3), (4, 6), (5, 7),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

fn axis_step(axis: usize) -> (i32, i32, i32) {
    match axis {
        0 => (1, 0, 0),
        1 => (0, 1, 0),
        2 => (0, 0, 1),
        _ => unreachable!(),
    }
}

fn axis_edge(axis: usize) -> ((i32, i32, i32), (i32, i32, i32)) {
    match axis {
        0 => ((0, 1, 0), (0, 0, 1)),
        1 => ((1, 0, 0), (0, 0, 1)),
        2 => ((1, 0, 0), (0, 1, 0)),
        _ => unreachable!(),
    }
}

fn offset(base: (i32, i32, i32), delta: (i32, i32, i32)) -> (i32, i32, i32) {
    (base.0 + delta.0, base.1 + delta.1, base.2 + delta.2)
}
