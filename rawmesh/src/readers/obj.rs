//! Wavefront OBJ reader
//!
//! Faces are grouped by `usemtl` (first-appearance order, faces before any
//! `usemtl` go to a default group) and each group becomes one surface.
//! Material libraries are never opened. Triangles and quads only; quads are
//! split `{0, 1, 2, 2, 3, 0}`.

use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use smallvec::SmallVec;

use super::{MeshFormat, MeshReader};
use crate::model::{flip_v, Surface};
use crate::report::ImportLog;
use crate::settings::ObjSettings;
use crate::stream::{self, SourceStream};
use crate::{LoadError, LoadFlags, RawMesh};

/// Fan used to split a quad into two triangles
const QUAD_FAN: [usize; 6] = [0, 1, 2, 2, 3, 0];

/// One face corner, indices already resolved to 0-based
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Corner {
    position: usize,
    tex_coord: Option<usize>,
    normal: Option<usize>,
}

/// Triangulated corners of one material group
#[derive(Debug, Default)]
struct Group {
    corners: Vec<Corner>,
}

#[derive(Debug, Default)]
struct ObjData {
    positions: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    normals: Vec<Vec3>,
    groups: Vec<Group>,
    group_names: HashMap<String, usize>,
    current_group: Option<usize>,
    has_tex_coords: bool,
    has_normals: bool,
    malformed_lines: usize,
    unsupported_faces: usize,
    out_of_range_faces: usize,
}

impl ObjData {
    fn group(&mut self) -> &mut Group {
        let index = match self.current_group {
            Some(index) => index,
            None => self.select_group(""),
        };
        &mut self.groups[index]
    }

    fn select_group(&mut self, name: &str) -> usize {
        let next = self.groups.len();
        let index = *self.group_names.entry(name.to_string()).or_insert(next);
        if index == next {
            self.groups.push(Group::default());
        }
        self.current_group = Some(index);
        index
    }

    /// Resolve a 1-based or negative (relative) OBJ index
    fn resolve(index: i64, len: usize) -> Option<usize> {
        let resolved = if index < 0 {
            len as i64 + index
        } else {
            index - 1
        };
        (0..len as i64).contains(&resolved).then_some(resolved as usize)
    }

    /// Parse `v`, `v/vt`, `v//vn` or `v/vt/vn`
    ///
    /// `Err(())` marks a reference outside the lists read so far.
    fn parse_corner(&self, token: &str) -> Result<Option<Corner>, ()> {
        let mut parts = token.split('/');
        let Some(Ok(v)) = parts.next().map(str::parse::<i64>) else {
            return Ok(None);
        };
        let position = Self::resolve(v, self.positions.len()).ok_or(())?;

        let optional = |part: Option<&str>, len: usize| -> Result<Option<usize>, ()> {
            match part.filter(|p| !p.is_empty()).map(str::parse::<i64>) {
                None | Some(Ok(0)) => Ok(None),
                Some(Ok(i)) => Self::resolve(i, len).map(Some).ok_or(()),
                Some(Err(_)) => Err(()),
            }
        };
        let tex_coord = optional(parts.next(), self.tex_coords.len())?;
        let normal = optional(parts.next(), self.normals.len())?;

        Ok(Some(Corner {
            position,
            tex_coord,
            normal,
        }))
    }

    fn parse_face(&mut self, tokens: &[&str]) {
        let mut corners: SmallVec<[Corner; 4]> = SmallVec::new();
        for token in tokens {
            match self.parse_corner(token) {
                Ok(Some(corner)) => corners.push(corner),
                Ok(None) => {
                    self.malformed_lines += 1;
                    return;
                }
                Err(()) => {
                    self.out_of_range_faces += 1;
                    return;
                }
            }
        }

        let fan: &[usize] = match corners.len() {
            3 => &QUAD_FAN[..3],
            4 => &QUAD_FAN,
            _ => {
                self.unsupported_faces += 1;
                return;
            }
        };

        self.has_tex_coords |= corners.iter().any(|c| c.tex_coord.is_some());
        self.has_normals |= corners.iter().any(|c| c.normal.is_some());
        let group = self.group();
        group.corners.extend(fan.iter().map(|&i| corners[i]));
    }

    fn parse_floats<const N: usize>(&mut self, tokens: &[&str]) -> [f32; N] {
        let mut out = [0.0; N];
        let mut ok = tokens.len() >= N;
        for (value, token) in out.iter_mut().zip(tokens) {
            match token.parse::<f32>() {
                Ok(v) => *value = v,
                Err(_) => ok = false,
            }
        }
        if !ok {
            self.malformed_lines += 1;
        }
        out
    }

    fn parse(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };
            let args: SmallVec<[&str; 8]> = tokens.collect();

            match keyword {
                "v" => {
                    let [x, y, z] = self.parse_floats::<3>(&args);
                    self.positions.push(Vec3::new(x, y, z));
                }
                "vt" => {
                    // the optional w coordinate is ignored
                    let [u, v] = self.parse_floats::<2>(&args);
                    self.tex_coords.push(Vec2::new(u, v));
                }
                "vn" => {
                    let [x, y, z] = self.parse_floats::<3>(&args);
                    self.normals.push(Vec3::new(x, y, z));
                }
                "f" => self.parse_face(&args),
                "usemtl" => {
                    self.select_group(args.first().copied().unwrap_or(""));
                }
                // mtllib, o, g, s and anything else carry nothing we import
                _ => {}
            }
        }
    }
}

/// Spatial hash of a quantized position
fn spatial_hash(position: Vec3, quantization: f32) -> u64 {
    let q = (position * quantization).to_array().map(|c| c as i64 as u64);
    q[0].wrapping_mul(73_856_093) ^ q[1].wrapping_mul(19_349_663) ^ q[2].wrapping_mul(83_492_791)
}

/// OBJ reader
#[derive(Debug, Clone)]
pub struct ObjReader {
    settings: ObjSettings,
}

impl ObjReader {
    pub fn new(settings: &ObjSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Deduplicate one group's corners into an indexed surface
    fn build_surface(&self, data: &ObjData, group: &Group) -> Surface {
        let mut surface = Surface::default();
        let mut buckets: HashMap<u64, SmallVec<[u32; 4]>> = HashMap::new();

        for corner in &group.corners {
            let position = data.positions[corner.position];
            let tex_coord = corner
                .tex_coord
                .map_or(Vec2::ZERO, |i| flip_v(data.tex_coords[i]));
            let normal = corner.normal.map_or(Vec3::ZERO, |i| data.normals[i]);

            let bucket = buckets
                .entry(spatial_hash(position, self.settings.position_quantization))
                .or_default();
            let existing = bucket.iter().copied().find(|&v| {
                let v = v as usize;
                surface.positions[v] == position
                    && (!data.has_tex_coords || surface.tex_coords[v] == tex_coord)
                    && (!data.has_normals || surface.normals[v] == normal)
            });

            let index = match existing {
                Some(index) => index,
                None => {
                    let index = surface.positions.len() as u32;
                    surface.positions.push(position);
                    if data.has_tex_coords {
                        surface.tex_coords.push(tex_coord);
                    }
                    if data.has_normals {
                        surface.normals.push(normal);
                    }
                    bucket.push(index);
                    index
                }
            };
            surface.indices.push(index);
        }

        surface.compute_bounds();
        surface
    }
}

impl MeshReader for ObjReader {
    fn format(&self) -> MeshFormat {
        MeshFormat::Obj
    }

    fn read(
        &self,
        stream: &mut dyn SourceStream,
        flags: LoadFlags,
        mesh: &mut RawMesh,
        log: &mut ImportLog,
    ) -> Result<(), LoadError> {
        let bytes = stream::read_to_end(stream).map_err(|e| LoadError::io(log.stream(), e))?;
        if !flags.contains(LoadFlags::SURFACES) {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&bytes);

        let mut data = ObjData::default();
        data.parse(&text);

        if data.malformed_lines > 0 {
            log.warn(format!("{} malformed lines ignored", data.malformed_lines));
        }
        if data.unsupported_faces > 0 {
            log.warn(format!(
                "{} faces with unsupported vertex counts skipped (only triangles and quads)",
                data.unsupported_faces
            ));
        }
        if data.out_of_range_faces > 0 {
            log.warn(format!(
                "{} faces referencing missing vertices skipped",
                data.out_of_range_faces
            ));
        }

        for group in data.groups.iter().filter(|g| !g.corners.is_empty()) {
            mesh.surfaces.push(self.build_surface(&data, group));
        }

        tracing::debug!(
            "OBJ {}: {} positions, {} groups, uvs={}, normals={}",
            log.stream(),
            data.positions.len(),
            mesh.surfaces.len(),
            data.has_tex_coords,
            data.has_normals
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    fn load(text: &str) -> (RawMesh, Vec<String>) {
        let mut stream = MemoryStream::new("test.obj", text.as_bytes().to_vec());
        let mut mesh = RawMesh::default();
        let mut log = ImportLog::new("test.obj");
        ObjReader::new(&ObjSettings::default())
            .read(&mut stream, LoadFlags::ALL, &mut mesh, &mut log)
            .unwrap();
        (mesh, log.warnings().to_vec())
    }

    #[test]
    fn single_triangle_with_uvs() {
        let (mesh, warnings) = load(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 0 1\n\
             f 1/1 2/2 3/3\n",
        );
        assert!(warnings.is_empty());
        assert_eq!(mesh.surfaces.len(), 1);
        let surface = &mesh.surfaces[0];
        assert_eq!(surface.positions.len(), 3);
        assert_eq!(surface.tex_coords.len(), 3);
        assert!(surface.normals.is_empty());
        assert!(surface.tangents.is_empty());
        assert_eq!(surface.indices, vec![0, 1, 2]);
        // V is flipped
        assert_eq!(surface.tex_coords[0], Vec2::new(0.0, 1.0));
        assert_eq!(surface.tex_coords[2], Vec2::new(0.0, 0.0));
    }

    #[test]
    fn quad_is_split_with_fixed_fan() {
        let (mesh, _) = load("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n");
        assert_eq!(mesh.surfaces[0].indices, vec![0, 1, 2, 2, 3, 0]);
        assert_eq!(mesh.surfaces[0].positions.len(), 4);
    }

    #[test]
    fn ngons_are_counted_and_skipped() {
        let (mesh, warnings) = load(
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 0 2 0\n\
             f 1 2 3 4 5\nf 1 2 3 4 5\nf 1 2 3\n",
        );
        assert_eq!(mesh.surfaces[0].triangle_count(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("2 faces"));
    }

    #[test]
    fn negative_indices_are_relative() {
        let (mesh, warnings) = load("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n");
        assert!(warnings.is_empty());
        assert_eq!(mesh.surfaces[0].positions[2], Vec3::Y);
    }

    #[test]
    fn out_of_range_faces_are_skipped() {
        let (mesh, warnings) = load("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\nf 1 2 3\n");
        assert_eq!(mesh.surfaces[0].triangle_count(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn materials_group_faces_without_sharing_vertices() {
        let (mesh, _) = load(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\n\
             usemtl a\nf 1 2 3\n\
             usemtl b\nf 2 4 3\n\
             usemtl a\nf 3 2 4\n",
        );
        assert_eq!(mesh.surfaces.len(), 2);
        // group a: vertices 1,2,3,4 shared between its two faces
        assert_eq!(mesh.surfaces[0].positions.len(), 4);
        assert_eq!(mesh.surfaces[0].indices, vec![0, 1, 2, 2, 1, 3]);
        // group b duplicates positions 2,3,4
        assert_eq!(mesh.surfaces[1].positions.len(), 3);
    }

    #[test]
    fn vertices_with_different_normals_stay_apart() {
        let (mesh, _) = load(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvn 0 0 -1\n\
             f 1//1 2//1 3//1\nf 1//2 3//2 2//2\n",
        );
        let surface = &mesh.surfaces[0];
        assert_eq!(surface.positions.len(), 6);
        assert_eq!(surface.normals.len(), 6);
        assert!(surface.tex_coords.is_empty());
        assert!(surface.validate().is_ok());
    }

    #[test]
    fn surfaces_flag_off_reads_nothing() {
        let text = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mut stream = MemoryStream::new("t.obj", text.to_vec());
        let mut mesh = RawMesh::default();
        let mut log = ImportLog::new("t.obj");
        ObjReader::new(&ObjSettings::default())
            .read(&mut stream, LoadFlags::SKELETON, &mut mesh, &mut log)
            .unwrap();
        assert!(mesh.is_empty());
    }
}
