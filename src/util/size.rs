use std::ops::{Add, Div, Mul, Sub};

use glam::{IVec3, UVec3, Vec3};

/// Size of a 3D grid, used for batch/group indexing that isn't constrained by
/// the chunk voxel array's own layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Size3 {
    pub const ZERO: Self = Self::splat(0);
    pub const ONE: Self = Self::splat(1);

    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(all: usize) -> Self {
        Self { x: all, y: all, z: all }
    }

    pub const fn as_uvec3(&self) -> UVec3 {
        UVec3::new(self.x as u32, self.y as u32, self.z as u32)
    }

    pub const fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }

    pub const fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    pub const fn product(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Flatten a grid position into an index ordered by z then y then x
    pub const fn flatten(&self, pos: UVec3) -> usize {
        let x = pos.x as usize;
        let y = pos.y as usize;
        let z = pos.z as usize;
        self.x * (self.y * z + y) + x
    }

    pub const fn contains_ivec3(&self, v: IVec3) -> bool {
        v.x >= 0
            && v.y >= 0
            && v.z >= 0
            && v.x < self.x as i32
            && v.y < self.y as i32
            && v.z < self.z as i32
    }
}

impl Add for Size3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self { x: self.x + rhs.x, y: self.y + rhs.y, z: self.z + rhs.z }
    }
}

impl Sub for Size3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self { x: self.x - rhs.x, y: self.y - rhs.y, z: self.z - rhs.z }
    }
}

impl Mul for Size3 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Self { x: self.x * rhs.x, y: self.y * rhs.y, z: self.z * rhs.z }
    }
}

impl Div for Size3 {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        Self { x: self.x / rhs.x, y: self.y / rhs.y, z: self.z / rhs.z }
    }
}
