use std::hash::{Hash, Hasher};

use glam::Mat4;

use crate::graph::NodeId;

/// One object inside a geometry list. Operators address objects by index only.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoObject {
    pub points: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub transform: Mat4,
}

impl Default for GeoObject {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            indices: Vec::new(),
            normals: None,
            uvs: None,
            transform: Mat4::IDENTITY,
        }
    }
}

impl GeoObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: Vec<[f32; 3]>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    pub fn with_points_indices(points: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            points,
            indices,
            ..Self::default()
        }
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[[f32; 3]] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [[f32; 3]] {
        &mut self.points
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.points.len().hash(state);
        for p in &self.points {
            hash_floats(p, state);
        }
        self.indices.hash(state);
        match &self.normals {
            Some(normals) => {
                1u8.hash(state);
                normals.len().hash(state);
                for n in normals {
                    hash_floats(n, state);
                }
            }
            None => 0u8.hash(state),
        }
        match &self.uvs {
            Some(uvs) => {
                1u8.hash(state);
                uvs.len().hash(state);
                for uv in uvs {
                    hash_floats(uv, state);
                }
            }
            None => 0u8.hash(state),
        }
        hash_floats(&self.transform.to_cols_array(), state);
    }
}

fn hash_floats<H: Hasher>(values: &[f32], state: &mut H) {
    for value in values {
        value.to_bits().hash(state);
    }
}

/// Ordered object list produced by a node for one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryList {
    objects: Vec<GeoObject>,
}

impl GeometryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_objects(objects: Vec<GeoObject>) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object(&self, index: usize) -> Option<&GeoObject> {
        self.objects.get(index)
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut GeoObject> {
        self.objects.get_mut(index)
    }

    pub fn point_count(&self, index: usize) -> Option<usize> {
        self.objects.get(index).map(GeoObject::point_count)
    }

    pub fn writable_points(&mut self, index: usize) -> Option<&mut [[f32; 3]]> {
        self.objects.get_mut(index).map(GeoObject::points_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeoObject> {
        self.objects.iter()
    }

    pub fn objects_mut(&mut self) -> &mut [GeoObject] {
        &mut self.objects
    }

    pub fn push(&mut self, object: GeoObject) {
        self.objects.push(object);
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn content_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.objects.len().hash(&mut hasher);
        for object in &self.objects {
            object.hash_into(&mut hasher);
        }
        hasher.finish()
    }
}

/// Request context for a single geometry fetch. Every fetch gets its own.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    source: Option<NodeId>,
    hash: Option<u64>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Option<NodeId> {
        self.source
    }

    pub fn geometry_hash(&self) -> Option<u64> {
        self.hash
    }

    /// Records which node served this request and that node's geometry hash.
    pub fn fill(&mut self, source: NodeId, hash: u64) {
        self.source = Some(source);
        self.hash = Some(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> GeoObject {
        GeoObject::with_points_indices(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn writable_points_edit_in_place() {
        let mut list = GeometryList::from_objects(vec![triangle()]);
        let points = list.writable_points(0).unwrap();
        points[1] = [5.0, 5.0, 5.0];
        assert_eq!(list.object(0).unwrap().points()[1], [5.0, 5.0, 5.0]);
        assert!(list.writable_points(1).is_none());
    }

    #[test]
    fn content_hash_tracks_points_and_attributes() {
        let a = GeometryList::from_objects(vec![triangle()]);
        let b = GeometryList::from_objects(vec![triangle()]);
        assert_eq!(a.content_hash(), b.content_hash());

        let mut moved = b.clone();
        moved.writable_points(0).unwrap()[0] = [0.0, 0.0, 0.5];
        assert_ne!(a.content_hash(), moved.content_hash());

        let mut with_uvs = a.clone();
        with_uvs.object_mut(0).unwrap().uvs = Some(vec![[0.0, 0.0]; 3]);
        assert_ne!(a.content_hash(), with_uvs.content_hash());
    }

    #[test]
    fn empty_lists_hash_equal() {
        assert_eq!(
            GeometryList::new().content_hash(),
            GeometryList::default().content_hash()
        );
        assert!(GeometryList::new().is_empty());
    }
}
