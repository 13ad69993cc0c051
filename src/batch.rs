use std::collections::{HashMap, HashSet};

use glam::IVec3;

use crate::mesher::{MeshResult, Submesh};
use crate::position::ChunkKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupKey(i32, i32, i32);

impl GroupKey {
    pub fn of(chunk: ChunkKey, group_size: i32) -> Self {
        let v = chunk.as_ivec3();
        Self(v.x.div_euclid(group_size), v.y.div_euclid(group_size), v.z.div_euclid(group_size))
    }

    /// Chunk-space coordinate at the center of this group's cube of chunks, used to
    /// decide whether the group lies within shadow-casting distance of the observer.
    pub fn center_chunk(&self, group_size: i32) -> IVec3 {
        let half = group_size / 2;
        IVec3::new(self.0 * group_size + half, self.1 * group_size + half, self.2 * group_size + half)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MergedGroup {
    pub solid: Submesh,
    pub transparent: Submesh,
    pub liquid: Submesh,
    pub shadow_casting: bool,
    dirty: bool,
}

/// Merges many chunks' meshes into a small number of spatial draw groups, so the
/// renderer issues one draw call per group per submesh class instead of one per chunk.
pub struct TerrainBatch {
    group_size: i32,
    chunk_meshes: HashMap<ChunkKey, MeshResult>,
    chunk_hidden: HashSet<ChunkKey>,
    groups: HashMap<GroupKey, MergedGroup>,
    members: HashMap<GroupKey, HashSet<ChunkKey>>,
}

impl TerrainBatch {
    pub fn new(group_size: u32) -> Self {
        Self {
            group_size: group_size as i32,
            chunk_meshes: HashMap::new(),
            chunk_hidden: HashSet::new(),
            groups: HashMap::new(),
            members: HashMap::new(),
        }
    }

    pub fn update_chunk_mesh(&mut self, key: ChunkKey, mesh: MeshResult) {
        let group = GroupKey::of(key, self.group_size);
        self.chunk_meshes.insert(key, mesh);
        self.members.entry(group).or_default().insert(key);
        self.mark_dirty(group);
    }

    pub fn remove_chunk(&mut self, key: ChunkKey) {
        let group = GroupKey::of(key, self.group_size);
        self.chunk_meshes.remove(&key);
        self.chunk_hidden.remove(&key);
        if let Some(members) = self.members.get_mut(&group) {
            members.remove(&key);
        }
        self.mark_dirty(group);
    }

    pub fn set_chunk_hidden(&mut self, key: ChunkKey, hidden: bool) {
        let group = GroupKey::of(key, self.group_size);
        let was_hidden = self.chunk_hidden.contains(&key);
        if hidden {
            self.chunk_hidden.insert(key);
        } else {
            self.chunk_hidden.remove(&key);
        }
        if was_hidden != hidden {
            self.mark_dirty(group);
        }
    }

    fn mark_dirty(&mut self, group: GroupKey) {
        self.groups.entry(group).or_default().dirty = true;
    }

    /// Rebuilds every dirty group's merged geometry. Call once per frame (or on demand).
    pub fn rebuild(&mut self) {
        let dirty_groups: Vec<GroupKey> = self.groups.iter().filter(|(_, g)| g.dirty).map(|(&k, _)| k).collect();

        for group_key in dirty_groups {
            let shadow_casting = self.groups.get(&group_key).map(|g| g.shadow_casting).unwrap_or(false);
            let mut merged = MergedGroup::default();
            if let Some(members) = self.members.get(&group_key) {
                for &chunk_key in members {
                    if self.chunk_hidden.contains(&chunk_key) {
                        continue;
                    }
                    if let Some(mesh) = self.chunk_meshes.get(&chunk_key) {
                        append_submesh(&mut merged.solid, &mesh.solid);
                        append_submesh(&mut merged.transparent, &mesh.transparent);
                        append_submesh(&mut merged.liquid, &mesh.liquid);
                    }
                }
            }
            merged.dirty = false;
            merged.shadow_casting = shadow_casting;
            self.groups.insert(group_key, merged);
        }
    }

    pub fn set_shadow_casting(&mut self, group: GroupKey, shadow_casting: bool) {
        self.groups.entry(group).or_default().shadow_casting = shadow_casting;
    }

    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &MergedGroup)> {
        self.groups.iter()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_size(&self) -> i32 {
        self.group_size
    }
}

fn append_submesh(dst: &mut Submesh, src: &Submesh) {
    let base = dst.vertices.len() as u32;
    dst.vertices.extend_from_slice(&src.vertices);
    dst.indices.extend(src.indices.iter().map(|&i| i + base));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesher::MeshVertex;

    fn mesh_with_one_triangle() -> MeshResult {
        let mut result = MeshResult::default();
        result.solid.vertices = vec![
            MeshVertex { position: [0.0; 3], normal: [0.0, 1.0, 0.0], material_ids: [1, 1, 1], material_weights: [1.0, 0.0, 0.0], sunlight: 15.0 };
            3
        ];
        result.solid.indices = vec![0, 1, 2];
        result
    }

    #[test]
    fn rebuild_merges_visible_members() {
        let mut batch = TerrainBatch::new(4);
        batch.update_chunk_mesh(ChunkKey::new(0, 0, 0), mesh_with_one_triangle());
        batch.update_chunk_mesh(ChunkKey::new(1, 0, 0), mesh_with_one_triangle());
        batch.rebuild();

        let group = GroupKey::of(ChunkKey::new(0, 0, 0), 4);
        let merged = batch.groups().find(|(k, _)| **k == group).unwrap().1;
        assert_eq!(merged.solid.indices.len(), 6);
    }

    #[test]
    fn rebuild_preserves_shadow_casting_flag_on_a_dirty_group() {
        let mut batch = TerrainBatch::new(4);
        let key = ChunkKey::new(0, 0, 0);
        batch.update_chunk_mesh(key, mesh_with_one_triangle());
        batch.rebuild();

        let group = GroupKey::of(key, 4);
        batch.set_shadow_casting(group, true);

        // Touching the group again marks it dirty and forces a re-merge.
        batch.update_chunk_mesh(ChunkKey::new(1, 0, 0), mesh_with_one_triangle());
        batch.rebuild();

        let merged = batch.groups().find(|(k, _)| **k == group).unwrap().1;
        assert!(merged.shadow_casting);
    }

    #[test]
    fn hidden_chunk_is_excluded_from_merge() {
        let mut batch = TerrainBatch::new(4);
        let key = ChunkKey::new(0, 0, 0);
        batch.update_chunk_mesh(key, mesh_with_one_triangle());
        batch.set_chunk_hidden(key, true);
        batch.rebuild();

        let group = GroupKey::of(key, 4);
        let merged = batch.groups().find(|(k, _)| **k == group).unwrap().1;
        assert!(merged.solid.indices.is_empty());
    }
}
