//! Programmatic GLB construction for integration tests

#![allow(dead_code)]

use serde_json::{Value, json};

const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_BYTE: u32 = 5121;

/// Binary chunk with one buffer view per accessor
#[derive(Default)]
pub struct GlbBuilder {
    buffer: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_view(&mut self, bytes: &[u8]) -> usize {
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        }));
        self.views.len() - 1
    }

    fn push_accessor(&mut self, accessor: Value) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    /// Edit an accessor's JSON after it was pushed
    pub fn accessor_mut(&mut self, index: usize) -> &mut Value {
        &mut self.accessors[index]
    }

    /// Accessor with no buffer view
    pub fn empty_accessor(&mut self, type_: &str, count: u64) -> usize {
        self.push_accessor(json!({
            "componentType": FLOAT,
            "count": count,
            "type": type_,
        }))
    }

    /// Float accessor of `type_` ("SCALAR", "VEC3", ...) with min/max filled in
    pub fn floats(&mut self, type_: &str, components: usize, data: &[f32]) -> usize {
        let view = self.push_view(bytemuck_bytes(data));
        let count = data.len() / components;
        let mut min = vec![f32::MAX; components];
        let mut max = vec![f32::MIN; components];
        for value in data.chunks_exact(components) {
            for (c, &v) in value.iter().enumerate() {
                min[c] = min[c].min(v);
                max[c] = max[c].max(v);
            }
        }
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": count,
            "type": type_,
            "min": min,
            "max": max,
        }))
    }

    pub fn positions(&mut self, positions: &[[f32; 3]]) -> usize {
        self.floats("VEC3", 3, positions.as_flattened())
    }

    pub fn indices(&mut self, indices: &[u16]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": UNSIGNED_SHORT,
            "count": indices.len(),
            "type": "SCALAR",
        }))
    }

    pub fn joints(&mut self, joints: &[[u8; 4]]) -> usize {
        let view = self.push_view(joints.as_flattened());
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": UNSIGNED_BYTE,
            "count": joints.len(),
            "type": "VEC4",
        }))
    }

    pub fn weights(&mut self, weights: &[[f32; 4]]) -> usize {
        self.floats("VEC4", 4, weights.as_flattened())
    }

    pub fn matrices(&mut self, matrices: &[[f32; 16]]) -> usize {
        self.floats("MAT4", 16, matrices.as_flattened())
    }

    /// Merge buffers, views and accessors into `document` and pack the GLB
    pub fn build(mut self, mut document: Value) -> Vec<u8> {
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
        document["asset"] = json!({ "version": "2.0" });
        if !self.buffer.is_empty() {
            document["buffers"] = json!([{ "byteLength": self.buffer.len() }]);
            document["bufferViews"] = Value::Array(self.views);
        }
        if !self.accessors.is_empty() {
            document["accessors"] = Value::Array(self.accessors);
        }
        assemble_glb(&document, &self.buffer)
    }
}

fn bytemuck_bytes(data: &[f32]) -> &[u8] {
    bytemuck::cast_slice(data)
}

/// GLB container: header, JSON chunk, BIN chunk (omitted when empty)
pub fn assemble_glb(document: &Value, buffer: &[u8]) -> Vec<u8> {
    let mut json_bytes = serde_json::to_vec(document).unwrap();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    let bin_chunk = if buffer.is_empty() { 0 } else { 8 + buffer.len() };
    let total = 12 + 8 + json_bytes.len() + bin_chunk;

    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());

    glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes()); // "JSON"
    glb.extend_from_slice(&json_bytes);

    if !buffer.is_empty() {
        glb.extend_from_slice(&(buffer.len() as u32).to_le_bytes());
        glb.extend_from_slice(&0x004E4942u32.to_le_bytes()); // "BIN\0"
        glb.extend_from_slice(buffer);
    }
    glb
}

/// One triangle in the XY plane with indices
pub fn triangle_glb() -> Vec<u8> {
    let mut glb = GlbBuilder::new();
    let position = glb.positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let indices = glb.indices(&[0, 1, 2]);
    glb.build(json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "tri", "mesh": 0, "translation": [0.0, 0.0, 5.0] }],
        "meshes": [{
            "name": "tri",
            "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }],
        }],
    }))
}
