use glam::Vec3;

use crate::batch::TerrainBatch;
use crate::mesher::Submesh;

#[derive(Clone, Copy, Debug)]
pub struct Capsule {
    pub start: Vec3,
    pub end: Vec3,
    pub radius: f32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CapsuleResult {
    pub collided: bool,
    pub displacement: Vec3,
    pub grounded: bool,
    pub ground_normal: Option<Vec3>,
}

#[derive(Clone, Copy, Debug)]
struct Triangle {
    a: Vec3,
    b: Vec3,
    c: Vec3,
}

impl Triangle {
    fn aabb(&self) -> (Vec3, Vec3) {
        (self.a.min(self.b).min(self.c), self.a.max(self.b).max(self.c))
    }

    fn normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a).normalize_or_zero()
    }
}

enum BvhNode {
    Leaf { bounds: (Vec3, Vec3), triangles: Vec<usize> },
    Split { bounds: (Vec3, Vec3), left: Box<BvhNode>, right: Box<BvhNode> },
}

/// Bounding volume hierarchy over merged solid-group triangles. Rebuilt lazily:
/// marked dirty when any merged solid group changes, rebuilt on the next query.
pub struct CollisionWorld {
    triangles: Vec<Triangle>,
    root: Option<BvhNode>,
    dirty: bool,
    walkable_slope_cos: f32,
    collision_passes: u32,
}

const LEAF_SIZE: usize = 8;

impl CollisionWorld {
    pub fn new(walkable_slope_cos: f32, collision_passes: u32) -> Self {
        Self { triangles: Vec::new(), root: None, dirty: true, walkable_slope_cos, collision_passes }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn rebuild_if_dirty(&mut self, batch: &TerrainBatch) {
        if !self.dirty {
            return;
        }
        self.triangles.clear();
        for (_, group) in batch.groups() {
            collect_triangles(&group.solid, &mut self.triangles);
        }
        self.root = if self.triangles.is_empty() { None } else { Some(build_node(&self.triangles, (0..self.triangles.len()).collect())) };
        self.dirty = false;
    }

    pub fn resolve_capsule(&self, capsule: Capsule, velocity: Vec3) -> CapsuleResult {
        let Some(root) = &self.root else {
            return CapsuleResult::default();
        };

        let mut capsule = capsule;
        let mut result = CapsuleResult::default();

        for _ in 0..self.collision_passes.max(1) {
            let swept_min = (capsule.start.min(capsule.end) - Vec3::splat(capsule.radius)).min(capsule.start + velocity);
            let swept_max = (capsule.start.max(capsule.end) + Vec3::splat(capsule.radius)).max(capsule.end + velocity);

            let mut candidates = Vec::new();
            collect_candidates(root, (swept_min, swept_max), &mut candidates);

            let mut resolved_any = false;
            for &tri_index in &candidates {
                let tri = &self.triangles[tri_index];
                let (closest_on_segment, closest_on_tri) = closest_segment_triangle(capsule.start, capsule.end, tri);
                let diff = closest_on_segment - closest_on_tri;
                let distance = diff.length();
                if distance < capsule.radius {
                    let push_dir = if distance > 1e-5 { diff / distance } else { tri.normal() };
                    let push_amount = capsule.radius - distance;
                    capsule.start += push_dir * push_amount;
                    capsule.end += push_dir * push_amount;
                    result.collided = true;
                    result.displacement += push_dir * push_amount;
                    resolved_any = true;

                    if push_dir.dot(Vec3::Y) >= self.walkable_slope_cos {
                        result.grounded = true;
                        result.ground_normal = Some(push_dir);
                    }
                }
            }

            if !resolved_any {
                break;
            }
        }

        result
    }
}

fn collect_triangles(submesh: &Submesh, out: &mut Vec<Triangle>) {
    for chunk in submesh.indices.chunks_exact(3) {
        let a = Vec3::from(submesh.vertices[chunk[0] as usize].position);
        let b = Vec3::from(submesh.vertices[chunk[1] as usize].position);
        let c = Vec3::from(submesh.vertices[chunk[2] as usize].position);
        out.push(Triangle { a, b, c });
    }
}

fn build_node(triangles: &[Triangle], indices: Vec<usize>) -> BvhNode {
    let bounds = indices.iter().fold((Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)), |(min, max), &i| {
        let (tmin, tmax) = triangles[i].aabb();
        (min.min(tmin), max.max(tmax))
    });

    if indices.len() <= LEAF_SIZE {
        return BvhNode::Leaf { bounds, triangles: indices };
    }

    let extent = bounds.1 - bounds.0;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };

    let mut sorted = indices;
    sorted.sort_by(|&a, &b| {
        let ca = centroid(&triangles[a])[axis];
        let cb = centroid(&triangles[b])[axis];
        ca.partial_cmp(&cb).unwrap()
    });
    let mid = sorted.len() / 2;
    let right_indices = sorted.split_off(mid);

    BvhNode::Split {
        bounds,
        left: Box::new(build_node(triangles, sorted)),
        right: Box::new(build_node(triangles, right_indices)),
    }
}

fn centroid(tri: &Triangle) -> Vec3 {
    (tri.a + tri.b + tri.c) / 3.0
}

fn aabb_overlaps(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> bool {
    a.0.x <= b.1.x && a.1.x >= b.0.x && a.0.y <= b.1.y && a.1.y >= b.0.y && a.0.z <= b.1.z && a.1.z >= b.0.z
}

fn collect_candidates(node: &BvhNode, region: (Vec3, Vec3), out: &mut Vec<usize>) {
    match node {
        BvhNode::Leaf { bounds, triangles } => {
            if aabb_overlaps(*bounds, region) {
                out.extend(triangles.iter().copied());
            }
        }
        BvhNode::Split { bounds, left, right } => {
            if !aabb_overlaps(*bounds, region) {
                return;
            }
            collect_candidates(left, region, out);
            collect_candidates(right, region, out);
        }
    }
}

/// Closest points between a line segment and a triangle, by brute-force sampling the
/// segment-vs-edge and point-vs-face cases.
fn closest_segment_triangle(seg_a: Vec3, seg_b: Vec3, tri: &Triangle) -> (Vec3, Vec3) {
    let mut best = (seg_a, tri.a);
    let mut best_dist = f32::INFINITY;

    let mut consider = |p_seg: Vec3, p_tri: Vec3| {
        let d = p_seg.distance_squared(p_tri);
        if d < best_dist {
            best_dist = d;
            best = (p_seg, p_tri);
        }
    };

    for &(e0, e1) in &[(tri.a, tri.b), (tri.b, tri.c), (tri.c, tri.a)] {
        let (p_seg, p_edge) = closest_segment_segment(seg_a, seg_b, e0, e1);
        consider(p_seg, p_edge);
    }

    for &p in &[seg_a, seg_b] {
        let projected = closest_point_on_triangle(p, tri);
        consider(p, projected);
    }

    best
}

fn closest_segment_segment(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (mut s, mut t);
    if a <= 1e-8 && e <= 1e-8 {
        return (p1, p2);
    }
    if a <= 1e-8 {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(r);
        if e <= 1e-8 {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            s = if denom.abs() > 1e-8 { ((b * f - c * e) / denom).clamp(0.0, 1.0) } else { 0.0 };
            t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
        }
    }

    (p1 + d1 * s, p2 + d2 * t)
}

fn closest_point_on_triangle(p: Vec3, tri: &Triangle) -> Vec3 {
    let (a, b, c) = (tri.a, tri.b, tri.c);
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}
