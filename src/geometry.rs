use glam::{Quat, Vec3};

/// Shape of a build operation's region, in the build's local (unrotated, centered) space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BuildShape {
    Cube,
    Sphere,
    Cylinder,
    Prism,
}

/// How a build operation's voxels combine with the existing terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildMode {
    Add,
    Subtract,
    Paint,
    Fill,
}

#[derive(Clone, Copy, Debug)]
pub struct BuildConfig {
    pub shape: BuildShape,
    pub mode: BuildMode,
    pub size: Vec3,
    pub material: u8,
}

/// A deterministic region mutation: same inputs yield the same voxel mutations on
/// every client and on the server.
#[derive(Clone, Copy, Debug)]
pub struct BuildOperation {
    pub center: Vec3,
    pub rotation: Quat,
    pub config: BuildConfig,
    pub sequence: u32,
}

impl BuildOperation {
    /// World-space axis-aligned bounding box of the shape, accounting for rotation.
    pub fn world_aabb(&self) -> (Vec3, Vec3) {
        let half_extent = self.config.size * 0.5;
        let corners = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(-1.0, -1.0, -1.0),
        ];

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in corners {
            let rotated = self.rotation * (corner * half_extent);
            min = min.min(rotated);
            max = max.max(rotated);
        }
        (self.center + min, self.center + max)
    }

    /// True if the local-space point (relative to `center`, pre-rotation) lies inside the shape.
    pub fn contains_local(&self, local: Vec3) -> bool {
        let half_extent = self.config.size * 0.5;
        match self.config.shape {
            BuildShape::Cube => (local / half_extent).abs().max_element() <= 1.0,
            BuildShape::Sphere => (local / half_extent).length_squared() <= 1.0,
            BuildShape::Cylinder => {
                let radial = Vec3::new(local.x / half_extent.x, 0.0, local.z / half_extent.z);
                radial.length_squared() <= 1.0 && local.y.abs() <= half_extent.y
            }
            BuildShape::Prism => {
                // a cylinder tapering linearly to a point at +y: radius scales with height
                let t = ((local.y + half_extent.y) / (2.0 * half_extent.y)).clamp(0.0, 1.0);
                let radius_scale = 1.0 - t;
                if radius_scale <= 0.0 {
                    return false;
                }
                let radial = Vec3::new(
                    local.x / (half_extent.x * radius_scale),
                    0.0,
                    local.z / (half_extent.z * radius_scale),
                );
                radial.length_squared() <= 1.0 && local.y.abs() <= half_extent.y
            }
        }
    }

    /// True if the given world-space point lies inside the rotated shape.
    pub fn contains_world(&self, world: Vec3) -> bool {
        let local = self.rotation.inverse() * (world - self.center);
        self.contains_local(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(shape: BuildShape, size: Vec3) -> BuildOperation {
        BuildOperation {
            center: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            config: BuildConfig { shape, mode: BuildMode::Add, size, material: 1 },
            sequence: 0,
        }
    }

    #[test]
    fn sphere_contains_center_not_corner() {
        let sphere = op(BuildShape::Sphere, Vec3::splat(6.0));
        assert!(sphere.contains_world(Vec3::ZERO));
        assert!(!sphere.contains_world(Vec3::splat(3.0)));
    }

    #[test]
    fn cube_contains_its_full_extent() {
        let cube = op(BuildShape::Cube, Vec3::splat(4.0));
        assert!(cube.contains_world(Vec3::splat(1.9)));
        assert!(!cube.contains_world(Vec3::splat(2.1)));
    }
}
