//! Evaluable FBX scene built from the node tree
//!
//! FBX keeps objects flat under `Objects` and expresses every relation as a
//! `Connections` entry (`OO` object-object, `OP` object-property). This
//! module resolves those links into typed objects keyed by their 64-bit id.

use glam::{Mat4, Quat, Vec2, Vec3};
use hashbrown::HashMap;

use super::node::FbxNode;

/// FBX time units per second
pub(super) const KTIME_PER_SECOND: f64 = 46_186_158_000.0;

/// Object name without the class tag (`Model::Hips` or `Hips\0\x01Model`)
pub(super) fn object_name(raw: &str) -> &str {
    if let Some(at) = raw.find("\u{0}\u{1}") {
        return &raw[..at];
    }
    match raw.split_once("::") {
        Some((_, name)) => name,
        None => raw,
    }
}

/// Euler evaluation order of a model's rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum RotationOrder {
    #[default]
    Xyz,
    Xzy,
    Yzx,
    Yxz,
    Zxy,
    Zyx,
}

impl RotationOrder {
    fn from_fbx(value: i64) -> Self {
        match value {
            1 => Self::Xzy,
            2 => Self::Yzx,
            3 => Self::Yxz,
            4 => Self::Zxy,
            5 => Self::Zyx,
            // 6 is spherical XYZ
            _ => Self::Xyz,
        }
    }

    /// Rotation from Euler angles in degrees
    ///
    /// The first axis of the order is applied first, so `Xyz` composes as
    /// `Rz * Ry * Rx`.
    pub fn quat(self, degrees: Vec3) -> Quat {
        let r = degrees * (std::f32::consts::PI / 180.0);
        let (x, y, z) = (
            Quat::from_rotation_x(r.x),
            Quat::from_rotation_y(r.y),
            Quat::from_rotation_z(r.z),
        );
        match self {
            Self::Xyz => z * y * x,
            Self::Xzy => y * z * x,
            Self::Yzx => x * z * y,
            Self::Yxz => z * x * y,
            Self::Zxy => y * x * z,
            Self::Zyx => x * y * z,
        }
    }
}

/// Scene node (mesh, bone, null...)
#[derive(Debug, Clone)]
pub(super) struct Model {
    pub id: i64,
    pub name: String,
    pub translation: Vec3,
    /// Euler degrees
    pub rotation: Vec3,
    pub scaling: Vec3,
    pub pre_rotation: Quat,
    pub post_rotation: Quat,
    pub rotation_order: RotationOrder,
    /// Geometric transform, applied to attached geometry only
    pub geometric: Mat4,
    pub parent: Option<i64>,
    pub children: Vec<i64>,
    pub geometry: Option<i64>,
}

impl Model {
    /// Rotation for the given Euler angles including pre/post rotation
    pub fn rotation_quat(&self, degrees: Vec3) -> Quat {
        (self.pre_rotation * self.rotation_order.quat(degrees) * self.post_rotation.inverse())
            .normalize()
    }

    /// T * Rpre * R * Rpost^-1 * S
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scaling,
            self.rotation_quat(self.rotation),
            self.translation,
        )
    }
}

/// Mapping of a layer element onto the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mapping {
    ByPolygonVertex,
    ByControlPoint,
    ByPolygon,
    AllSame,
}

/// Per-corner attribute source (normals, UVs, tangents...)
#[derive(Debug, Clone)]
pub(super) struct LayerElement<T> {
    pub mapping: Mapping,
    pub values: Vec<T>,
    /// Indirection table for `IndexToDirect` references
    pub indices: Option<Vec<i64>>,
}

impl<T: Copy> LayerElement<T> {
    /// Value for a polygon corner
    pub fn get(&self, polygon: usize, corner: usize, control_point: usize) -> Option<T> {
        let slot = match self.mapping {
            Mapping::ByPolygonVertex => corner,
            Mapping::ByControlPoint => control_point,
            Mapping::ByPolygon => polygon,
            Mapping::AllSame => 0,
        };
        let slot = match &self.indices {
            Some(indices) => usize::try_from(*indices.get(slot)?).ok()?,
            None => slot,
        };
        self.values.get(slot).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct Geometry {
    pub vertices: Vec<Vec3>,
    pub polygon_vertex_index: Vec<i64>,
    pub normals: Option<LayerElement<Vec3>>,
    pub tangents: Option<LayerElement<Vec3>>,
    pub binormals: Option<LayerElement<Vec3>>,
    /// UV sets in layer order
    pub uv_sets: Vec<LayerElement<Vec2>>,
    /// Material slot per polygon
    pub materials: Option<LayerElement<i64>>,
    pub skin: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct SkinDeformer {
    pub clusters: Vec<i64>,
}

#[derive(Debug, Clone)]
pub(super) struct Cluster {
    pub indexes: Vec<i64>,
    pub weights: Vec<f64>,
    /// Mesh world transform at bind time
    pub transform: Mat4,
    /// Bone world transform at bind time
    pub transform_link: Mat4,
    pub bone: Option<i64>,
}

#[derive(Debug, Clone)]
pub(super) struct AnimStack {
    pub name: String,
    pub start: i64,
    pub stop: i64,
    pub layers: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct AnimLayer {
    pub curve_nodes: Vec<i64>,
}

/// Transform property animated by a curve node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AnimatedProperty {
    Translation,
    Rotation,
    Scaling,
}

#[derive(Debug, Clone, Default)]
pub(super) struct CurveNode {
    pub target: Option<(i64, AnimatedProperty)>,
    pub defaults: [f32; 3],
    /// X, Y, Z component curves
    pub curves: [Option<i64>; 3],
}

#[derive(Debug, Clone, Default)]
pub(super) struct Curve {
    pub times: Vec<i64>,
    pub values: Vec<f32>,
    /// Per key: hold the value until the next key
    pub constant: Vec<bool>,
}

impl Curve {
    /// Value at `time`, clamped outside the key range
    pub fn evaluate(&self, time: i64) -> Option<f32> {
        let last = self.times.len().min(self.values.len()).checked_sub(1)?;
        if time <= self.times[0] {
            return Some(self.values[0]);
        }
        if time >= self.times[last] {
            return Some(self.values[last]);
        }
        let next = self.times[..=last].partition_point(|&t| t <= time);
        let key = next - 1;
        if self.constant.get(key).copied().unwrap_or(false) {
            return Some(self.values[key]);
        }
        let span = (self.times[next] - self.times[key]) as f64;
        let f = if span > 0.0 {
            ((time - self.times[key]) as f64 / span) as f32
        } else {
            0.0
        };
        Some(self.values[key] + (self.values[next] - self.values[key]) * f)
    }

    /// First and last key time
    pub fn time_range(&self) -> Option<(i64, i64)> {
        Some((*self.times.first()?, *self.times.last()?))
    }
}

/// Resolved scene
#[derive(Debug, Default)]
pub(super) struct Scene {
    /// Models in file order
    pub models: Vec<Model>,
    model_lookup: HashMap<i64, usize>,
    pub geometries: HashMap<i64, Geometry>,
    pub skins: HashMap<i64, SkinDeformer>,
    pub clusters: HashMap<i64, Cluster>,
    pub stacks: Vec<AnimStack>,
    pub layers: HashMap<i64, AnimLayer>,
    pub curve_nodes: HashMap<i64, CurveNode>,
    pub curves: HashMap<i64, Curve>,
}

fn vec3_or(values: Option<Vec<f64>>, default: Vec3) -> Vec3 {
    match values.as_deref() {
        Some([x, y, z, ..]) => Vec3::new(*x as f32, *y as f32, *z as f32),
        _ => default,
    }
}

fn matrix(node: &FbxNode, name: &str) -> Option<Mat4> {
    let values = node.f64_array(name)?;
    let cols: [f32; 16] = std::array::from_fn(|i| values.get(i).copied().unwrap_or(0.0) as f32);
    (values.len() >= 16).then(|| Mat4::from_cols_array(&cols))
}

fn vec3_array(values: &[f64]) -> Vec<Vec3> {
    values
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))
        .collect()
}

fn vec2_array(values: &[f64]) -> Vec<Vec2> {
    values
        .chunks_exact(2)
        .map(|c| Vec2::new(c[0] as f32, c[1] as f32))
        .collect()
}

fn layer_element<T>(
    node: &FbxNode,
    values_name: &str,
    index_name: &str,
    convert: impl Fn(&[f64]) -> Vec<T>,
) -> Result<LayerElement<T>, String> {
    let mapping = match node.child_str("MappingInformationType").unwrap_or("") {
        "ByPolygonVertex" => Mapping::ByPolygonVertex,
        "ByVertice" | "ByVertex" | "ByControlPoint" => Mapping::ByControlPoint,
        "ByPolygon" => Mapping::ByPolygon,
        "AllSame" => Mapping::AllSame,
        other => return Err(format!("{}: unsupported mapping '{other}'", node.name)),
    };
    let indices = match node.child_str("ReferenceInformationType").unwrap_or("Direct") {
        "Direct" => None,
        "IndexToDirect" | "Index" => Some(node.i64_array(index_name).unwrap_or_default()),
        other => return Err(format!("{}: unsupported reference '{other}'", node.name)),
    };
    let values = node
        .f64_array(values_name)
        .ok_or_else(|| format!("{}: missing {values_name}", node.name))?;
    Ok(LayerElement {
        mapping,
        values: convert(&values),
        indices,
    })
}

/// Layer elements of one kind sorted by their layer index
fn layer_elements<'a>(geometry: &'a FbxNode, name: &'a str) -> Vec<&'a FbxNode> {
    let mut elements: Vec<&FbxNode> = geometry.children_named(name).collect();
    elements.sort_by_key(|e| e.i64_at(0).unwrap_or(0));
    elements
}

impl Scene {
    pub fn model(&self, id: i64) -> Option<&Model> {
        self.model_lookup.get(&id).map(|&i| &self.models[i])
    }

    /// Models without a model parent, in file order
    pub fn roots(&self) -> impl Iterator<Item = &Model> {
        self.models.iter().filter(|m| m.parent.is_none())
    }

    /// Model world transform at rest, walking the parent chain
    pub fn world_matrix(&self, id: i64) -> Mat4 {
        let mut world = Mat4::IDENTITY;
        let mut current = self.model(id);
        let mut depth = 0;
        while let Some(model) = current {
            world = model.local_matrix() * world;
            depth += 1;
            if depth > self.models.len() {
                break;
            }
            current = model.parent.and_then(|p| self.model(p));
        }
        world
    }

    /// Build the scene from a parsed document; anomalies go to `warnings`
    pub fn from_document(root: &FbxNode, warnings: &mut Vec<String>) -> Result<Self, String> {
        let objects = root.child("Objects").ok_or("missing Objects section")?;
        let mut scene = Scene::default();

        for object in &objects.children {
            let Some(id) = object.i64_at(0) else {
                continue;
            };
            let name = object_name(object.str_at(1).unwrap_or("")).to_string();
            let class = object.str_at(2).unwrap_or("");
            match (object.name.as_str(), class) {
                ("Model", _) => {
                    scene.model_lookup.insert(id, scene.models.len());
                    scene.models.push(read_model(id, name, object, warnings));
                }
                ("Geometry", "Mesh") => {
                    scene.geometries.insert(id, read_geometry(object, &name, warnings));
                }
                ("Deformer", "Skin") => {
                    scene.skins.insert(id, SkinDeformer::default());
                }
                ("Deformer", "Cluster") => {
                    scene.clusters.insert(id, read_cluster(object));
                }
                ("AnimationStack", _) => scene.stacks.push(read_stack(name, object)),
                ("AnimationLayer", _) => {
                    scene.layers.insert(id, AnimLayer::default());
                }
                ("AnimationCurveNode", _) => {
                    let defaults = [
                        object.property70_values("d|X"),
                        object.property70_values("d|Y"),
                        object.property70_values("d|Z"),
                    ]
                    .map(|v| v.and_then(|v| v.first().copied()).unwrap_or(0.0) as f32);
                    scene.curve_nodes.insert(
                        id,
                        CurveNode {
                            defaults,
                            ..Default::default()
                        },
                    );
                }
                ("AnimationCurve", _) => {
                    scene.curves.insert(id, read_curve(object));
                }
                _ => {}
            }
        }

        // stack ids are kept aside so layers can attach in connection order
        let stack_ids: HashMap<i64, usize> = objects
            .children_named("AnimationStack")
            .filter_map(|s| s.i64_at(0))
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();

        if let Some(connections) = root.child("Connections") {
            for c in connections.children_named("C") {
                let (Some(kind), Some(child), Some(parent)) = (c.str_at(0), c.i64_at(1), c.i64_at(2))
                else {
                    continue;
                };
                let property = c.str_at(3);
                scene.connect(kind, child, parent, property, &stack_ids);
            }
        }

        Ok(scene)
    }

    fn connect(
        &mut self,
        kind: &str,
        child: i64,
        parent: i64,
        property: Option<&str>,
        stack_ids: &HashMap<i64, usize>,
    ) {
        match kind {
            "OO" => {
                if let (Some(&c), Some(&p)) =
                    (self.model_lookup.get(&child), self.model_lookup.get(&parent))
                {
                    if self.models[c].parent.is_none() && c != p {
                        self.models[c].parent = Some(parent);
                        self.models[p].children.push(child);
                    }
                } else if self.geometries.contains_key(&child) {
                    if let Some(&m) = self.model_lookup.get(&parent) {
                        self.models[m].geometry.get_or_insert(child);
                    }
                } else if self.skins.contains_key(&child) {
                    if let Some(geometry) = self.geometries.get_mut(&parent) {
                        geometry.skin.get_or_insert(child);
                    }
                } else if self.clusters.contains_key(&child) {
                    if let Some(skin) = self.skins.get_mut(&parent) {
                        skin.clusters.push(child);
                    }
                } else if self.model_lookup.contains_key(&child) {
                    if let Some(cluster) = self.clusters.get_mut(&parent) {
                        cluster.bone.get_or_insert(child);
                    }
                } else if self.layers.contains_key(&child) {
                    if let Some(&s) = stack_ids.get(&parent) {
                        self.stacks[s].layers.push(child);
                    }
                } else if self.curve_nodes.contains_key(&child) {
                    if let Some(layer) = self.layers.get_mut(&parent) {
                        layer.curve_nodes.push(child);
                    }
                }
            }
            "OP" => {
                let Some(property) = property else {
                    return;
                };
                if self.curve_nodes.contains_key(&child) && self.model_lookup.contains_key(&parent) {
                    let target = match property {
                        "Lcl Translation" => AnimatedProperty::Translation,
                        "Lcl Rotation" => AnimatedProperty::Rotation,
                        "Lcl Scaling" => AnimatedProperty::Scaling,
                        _ => return,
                    };
                    if let Some(node) = self.curve_nodes.get_mut(&child) {
                        node.target = Some((parent, target));
                    }
                } else if self.curves.contains_key(&child) {
                    let axis = match property {
                        "d|X" => 0,
                        "d|Y" => 1,
                        "d|Z" => 2,
                        _ => return,
                    };
                    if let Some(node) = self.curve_nodes.get_mut(&parent) {
                        node.curves[axis] = Some(child);
                    }
                }
            }
            _ => {}
        }
    }
}

fn read_model(id: i64, name: String, node: &FbxNode, warnings: &mut Vec<String>) -> Model {
    let degrees = |prop: &str| vec3_or(node.property70_values(prop), Vec3::ZERO);
    let order = node
        .property70_values("RotationOrder")
        .and_then(|v| v.first().copied())
        .map_or(RotationOrder::Xyz, |v| RotationOrder::from_fbx(v as i64));
    if node
        .property70_values("RotationPivot")
        .is_some_and(|v| v.iter().any(|&c| c != 0.0))
    {
        warnings.push(format!("model '{name}': rotation pivots are ignored"));
    }

    let geometric = Mat4::from_scale_rotation_translation(
        vec3_or(node.property70_values("GeometricScaling"), Vec3::ONE),
        RotationOrder::Xyz.quat(degrees("GeometricRotation")),
        degrees("GeometricTranslation"),
    );

    Model {
        id,
        translation: degrees("Lcl Translation"),
        rotation: degrees("Lcl Rotation"),
        scaling: vec3_or(node.property70_values("Lcl Scaling"), Vec3::ONE),
        pre_rotation: RotationOrder::Xyz.quat(degrees("PreRotation")),
        post_rotation: RotationOrder::Xyz.quat(degrees("PostRotation")),
        rotation_order: order,
        geometric,
        parent: None,
        children: Vec::new(),
        geometry: None,
        name,
    }
}

fn read_geometry(node: &FbxNode, name: &str, warnings: &mut Vec<String>) -> Geometry {
    let mut geometry = Geometry {
        vertices: vec3_array(&node.f64_array("Vertices").unwrap_or_default()),
        polygon_vertex_index: node.i64_array("PolygonVertexIndex").unwrap_or_default(),
        ..Default::default()
    };

    if let Some(&element) = layer_elements(node, "LayerElementNormal").first() {
        let normals = layer_element(element, "Normals", "NormalsIndex", vec3_array);
        geometry.normals = accept_layer(normals, name, warnings);
    }
    if let Some(&element) = layer_elements(node, "LayerElementTangent").first() {
        let tangents = layer_element(element, "Tangents", "TangentsIndex", vec3_array);
        geometry.tangents = accept_layer(tangents, name, warnings);
    }
    if let Some(&element) = layer_elements(node, "LayerElementBinormal").first() {
        let binormals = layer_element(element, "Binormals", "BinormalsIndex", vec3_array);
        geometry.binormals = accept_layer(binormals, name, warnings);
    }
    for element in layer_elements(node, "LayerElementUV").into_iter().take(2) {
        let uv = layer_element(element, "UV", "UVIndex", vec2_array);
        if let Some(uv) = accept_layer(uv, name, warnings) {
            geometry.uv_sets.push(uv);
        }
    }
    if let Some(&element) = layer_elements(node, "LayerElementMaterial").first() {
        // the Materials array holds slot numbers directly whatever the reference type says
        let materials = layer_element(element, "Materials", "", |v| {
            v.iter().map(|&m| m as i64).collect()
        });
        geometry.materials = accept_layer(materials, name, warnings).map(|mut element| {
            element.indices = None;
            element
        });
    }
    geometry
}

fn accept_layer<T>(
    result: Result<LayerElement<T>, String>,
    geometry: &str,
    warnings: &mut Vec<String>,
) -> Option<LayerElement<T>> {
    match result {
        Ok(element) => Some(element),
        Err(message) => {
            warnings.push(format!("geometry '{geometry}': {message}, ignored"));
            None
        }
    }
}

fn read_cluster(node: &FbxNode) -> Cluster {
    Cluster {
        indexes: node.i64_array("Indexes").unwrap_or_default(),
        weights: node.f64_array("Weights").unwrap_or_default(),
        transform: matrix(node, "Transform").unwrap_or(Mat4::IDENTITY),
        transform_link: matrix(node, "TransformLink").unwrap_or(Mat4::IDENTITY),
        bone: None,
    }
}

fn read_stack(name: String, node: &FbxNode) -> AnimStack {
    let time = |a: &str, b: &str| {
        node.property70(a)
            .or_else(|| node.property70(b))
            .and_then(|p| p.i64_at(4))
    };
    AnimStack {
        name,
        start: time("LocalStart", "ReferenceStart").unwrap_or(0),
        stop: time("LocalStop", "ReferenceStop").unwrap_or(0),
        layers: Vec::new(),
    }
}

/// `KeyAttrFlags` bit for constant interpolation
const KEY_CONSTANT: i64 = 0x0000_0002;

fn read_curve(node: &FbxNode) -> Curve {
    let times = node.i64_array("KeyTime").unwrap_or_default();
    let values: Vec<f32> = node
        .f64_array("KeyValueFloat")
        .unwrap_or_default()
        .into_iter()
        .map(|v| v as f32)
        .collect();

    // flags are run-length encoded through KeyAttrRefCount
    let flags = node.i64_array("KeyAttrFlags").unwrap_or_default();
    let counts = node.i64_array("KeyAttrRefCount").unwrap_or_default();
    let mut constant = Vec::with_capacity(times.len());
    for (flag, count) in flags.iter().zip(&counts) {
        let run = usize::try_from(*count).unwrap_or(0);
        constant.extend(std::iter::repeat_n(flag & KEY_CONSTANT != 0, run));
    }
    constant.resize(times.len(), false);

    Curve {
        times,
        values,
        constant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_class_tags() {
        assert_eq!(object_name("Model::Hips"), "Hips");
        assert_eq!(object_name("Hips\u{0}\u{1}Model"), "Hips");
        assert_eq!(object_name("plain"), "plain");
    }

    #[test]
    fn xyz_order_composes_z_y_x() {
        let q = RotationOrder::Xyz.quat(Vec3::new(90.0, 0.0, 90.0));
        // X first: +Y goes to +Z, then Z about Z stays +Z
        assert!((q * Vec3::Y).abs_diff_eq(Vec3::Z, 1e-5));
        // +Z goes to -Y, then to +X
        assert!((q * Vec3::Z).abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn curve_interpolation() {
        let second = KTIME_PER_SECOND as i64;
        let curve = Curve {
            times: vec![0, second, 2 * second],
            values: vec![0.0, 10.0, 20.0],
            constant: vec![false, true, false],
        };
        assert_eq!(curve.evaluate(-5), Some(0.0));
        assert_eq!(curve.evaluate(second / 2), Some(5.0));
        // held until the next key
        assert_eq!(curve.evaluate(second + second / 2), Some(10.0));
        assert_eq!(curve.evaluate(3 * second), Some(20.0));
        assert_eq!(Curve::default().evaluate(0), None);
    }

    #[test]
    fn layer_element_index_to_direct() {
        let element = LayerElement {
            mapping: Mapping::ByPolygonVertex,
            values: vec![Vec2::ZERO, Vec2::ONE],
            indices: Some(vec![1, 0, 1]),
        };
        assert_eq!(element.get(0, 0, 5), Some(Vec2::ONE));
        assert_eq!(element.get(0, 1, 5), Some(Vec2::ZERO));
        assert_eq!(element.get(0, 3, 5), None);
    }
}
