//! Mesh extraction bridge
//!
//! Converts registered shapes into renderable buffers: triangle meshes
//! for shaded display, line meshes for wireframes, tube meshes for
//! emphasized edges, and binary STL for export. All extraction happens
//! on the transformed read path, so what comes out is what the scene
//! shows.

use std::collections::HashSet;
use std::f32::consts::TAU;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use truck_meshalgo::prelude::*;

use crate::error::{CadError, CadResult};
use crate::registry::{Handle, Shape, ShapeRegistry};

/// Ring segments used when thickening an edge into a tube.
const TUBE_SEGMENTS: u32 = 12;

/// Renderable triangle buffers: positions, per-vertex normals and a
/// triangle index list, three indices per triangle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Line-primitive buffers: positions and an index list, two indices per
/// segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl LineMesh {
    pub fn segment_count(&self) -> usize {
        self.indices.len() / 2
    }
}

fn to_array(p: Point3) -> [f32; 3] {
    [p.x as f32, p.y as f32, p.z as f32]
}

fn flatten_triangles(mesh: &PolygonMesh) -> TriangleMesh {
    let positions = mesh.positions();
    let normals = mesh.normals();
    let mut out = TriangleMesh::default();
    for triangle in mesh.faces().triangle_iter() {
        let corners = [
            positions[triangle[0].pos],
            positions[triangle[1].pos],
            positions[triangle[2].pos],
        ];
        let fallback = {
            let cross = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
            if cross.magnitude2() > f64::EPSILON {
                let n = cross.normalize();
                [n.x as f32, n.y as f32, n.z as f32]
            } else {
                [0.0, 1.0, 0.0]
            }
        };
        for (vertex, corner) in triangle.iter().zip(corners) {
            out.indices.push(out.positions.len() as u32);
            out.positions.push(to_array(corner));
            let normal = vertex
                .nor
                .map(|i| {
                    let n = normals[i];
                    [n.x as f32, n.y as f32, n.z as f32]
                })
                .unwrap_or(fallback);
            out.normals.push(normal);
        }
    }
    out
}

/// Tessellate the transformed shape under `handle` into a triangle
/// mesh. The tolerance is the kernel's surface deviation bound; equal
/// input produces equal output.
pub fn triangle_mesh(
    registry: &ShapeRegistry,
    handle: &Handle,
    tolerance: f64,
) -> CadResult<TriangleMesh> {
    match registry.retrieve_transformed(handle)? {
        Shape::Solid(solid) => {
            let polygon = solid.triangulation(tolerance).to_polygon();
            Ok(flatten_triangles(&polygon))
        }
        Shape::Wire(_) => Err(CadError::InvalidParameter(format!(
            "{handle} is a path; only solids can be triangulated"
        ))),
    }
}

/// Axis-aligned bounds of a shape, from tessellated vertices for
/// solids and edge endpoints for wires. `None` for degenerate shapes.
pub(crate) fn shape_bounds(shape: &Shape, tolerance: f64) -> Option<(Vec3, Vec3)> {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    let mut any = false;
    let mut visit = |p: [f32; 3]| {
        min = min.min(Vec3::from(p));
        max = max.max(Vec3::from(p));
        any = true;
    };
    match shape {
        Shape::Solid(solid) => {
            let polygon = solid.triangulation(tolerance).to_polygon();
            for p in polygon.positions() {
                visit(to_array(*p));
            }
        }
        Shape::Wire(wire) => {
            for edge in wire.edge_iter() {
                visit(to_array(edge.front().point()));
                visit(to_array(edge.back().point()));
            }
        }
    }
    any.then_some((min, max))
}

/// Straight segments approximating every edge of the shape.
///
/// Solid edges come from the tessellated edge polylines; path wires
/// contribute one chord per edge.
fn edge_segments(shape: &Shape, tolerance: f64) -> Vec<(Vec3, Vec3)> {
    let mut segments = Vec::new();
    match shape {
        Shape::Solid(solid) => {
            let meshed = solid.triangulation(tolerance);
            let mut seen = HashSet::new();
            for shell in meshed.boundaries() {
                for edge in shell.edge_iter() {
                    if !seen.insert(edge.id()) {
                        continue;
                    }
                    let polyline = edge.curve();
                    for pair in polyline.windows(2) {
                        let a = to_array(pair[0]);
                        let b = to_array(pair[1]);
                        segments.push((Vec3::from(a), Vec3::from(b)));
                    }
                }
            }
        }
        Shape::Wire(wire) => {
            for edge in wire.edge_iter() {
                let a = to_array(edge.front().point());
                let b = to_array(edge.back().point());
                segments.push((Vec3::from(a), Vec3::from(b)));
            }
        }
    }
    segments
}

/// Extract all edges of the transformed shape as a line mesh for
/// wireframe display.
pub fn line_mesh(registry: &ShapeRegistry, handle: &Handle, tolerance: f64) -> CadResult<LineMesh> {
    let shape = registry.retrieve_transformed(handle)?;
    let mut mesh = LineMesh::default();
    for (a, b) in edge_segments(&shape, tolerance) {
        let base = mesh.positions.len() as u32;
        mesh.positions.push(a.to_array());
        mesh.positions.push(b.to_array());
        mesh.indices.push(base);
        mesh.indices.push(base + 1);
    }
    Ok(mesh)
}

/// Append a capped cylinder along `start -> end` to `mesh`.
fn append_tube(mesh: &mut TriangleMesh, start: Vec3, end: Vec3, radius: f32) {
    let axis = end - start;
    let length = axis.length();
    if length < f32::EPSILON {
        return;
    }
    let axis = axis / length;
    let helper = if axis.y.abs() < 0.9 { Vec3::Y } else { Vec3::X };
    let u = axis.cross(helper).normalize();
    let v = axis.cross(u);

    // Side rings.
    let side_base = mesh.positions.len() as u32;
    for i in 0..=TUBE_SEGMENTS {
        let theta = (i as f32 / TUBE_SEGMENTS as f32) * TAU;
        let radial = u * theta.cos() + v * theta.sin();
        let offset = radial * radius;
        mesh.positions.push((start + offset).to_array());
        mesh.normals.push(radial.to_array());
        mesh.positions.push((end + offset).to_array());
        mesh.normals.push(radial.to_array());
    }
    for i in 0..TUBE_SEGMENTS {
        let ring = side_base + i * 2;
        mesh.indices.extend([ring, ring + 2, ring + 1]);
        mesh.indices.extend([ring + 1, ring + 2, ring + 3]);
    }

    // End caps, flat-shaded.
    for (center, normal) in [(start, -axis), (end, axis)] {
        let center_index = mesh.positions.len() as u32;
        mesh.positions.push(center.to_array());
        mesh.normals.push(normal.to_array());
        let rim_start = mesh.positions.len() as u32;
        for i in 0..=TUBE_SEGMENTS {
            let theta = (i as f32 / TUBE_SEGMENTS as f32) * TAU;
            let radial = u * theta.cos() + v * theta.sin();
            mesh.positions.push((center + radial * radius).to_array());
            mesh.normals.push(normal.to_array());
        }
        for i in 0..TUBE_SEGMENTS {
            if normal.dot(axis) > 0.0 {
                mesh.indices
                    .extend([center_index, rim_start + i, rim_start + i + 1]);
            } else {
                mesh.indices
                    .extend([center_index, rim_start + i + 1, rim_start + i]);
            }
        }
    }
}

/// Like [`line_mesh`], but every edge segment is thickened into a small
/// cylinder of the given radius, for visually emphasized edges and
/// paths.
pub fn tube_mesh(
    registry: &ShapeRegistry,
    handle: &Handle,
    tolerance: f64,
    radius: f32,
) -> CadResult<TriangleMesh> {
    if !(radius > 0.0) {
        return Err(CadError::InvalidParameter(format!(
            "tube radius must be positive, got {radius}"
        )));
    }
    let shape = registry.retrieve_transformed(handle)?;
    let mut mesh = TriangleMesh::default();
    for (a, b) in edge_segments(&shape, tolerance) {
        append_tube(&mut mesh, a, b, radius);
    }
    Ok(mesh)
}

/// Triangulate the transformed shape and write it as binary STL.
pub fn export_stl(
    registry: &ShapeRegistry,
    handle: &Handle,
    path: impl AsRef<Path>,
    tolerance: f64,
) -> CadResult<()> {
    let mesh = triangle_mesh(registry, handle, tolerance)?;
    let triangles: Vec<stl_io::Triangle> = mesh
        .indices
        .chunks_exact(3)
        .map(|corner| {
            let a = Vec3::from(mesh.positions[corner[0] as usize]);
            let b = Vec3::from(mesh.positions[corner[1] as usize]);
            let c = Vec3::from(mesh.positions[corner[2] as usize]);
            let normal = (b - a).cross(c - a).normalize_or(Vec3::Y);
            stl_io::Triangle {
                normal: stl_io::Normal::new(normal.to_array()),
                vertices: [
                    stl_io::Vertex::new(a.to_array()),
                    stl_io::Vertex::new(b.to_array()),
                    stl_io::Vertex::new(c.to_array()),
                ],
            }
        })
        .collect();

    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    stl_io::write_stl(&mut writer, triangles.into_iter())?;
    tracing::debug!(handle = %handle, path = %path.as_ref().display(), "exported STL");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{CornerStyle, create_box, create_path};
    use glam::Mat4;

    const MESH_TOL: f64 = 0.01;

    fn bounds(positions: &[[f32; 3]]) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for p in positions {
            min = min.min(Vec3::from(*p));
            max = max.max(Vec3::from(*p));
        }
        (min, max)
    }

    fn unique_positions(positions: &[[f32; 3]], tolerance: f32) -> usize {
        let mut unique: Vec<Vec3> = Vec::new();
        for p in positions {
            let p = Vec3::from(*p);
            if !unique.iter().any(|q| q.distance(p) < tolerance) {
                unique.push(p);
            }
        }
        unique.len()
    }

    #[test]
    fn test_unit_box_triangulation() {
        let mut registry = ShapeRegistry::new();
        let cube = create_box(&mut registry, 1.0, 1.0, 1.0).unwrap();
        let mesh = triangle_mesh(&registry, &cube, MESH_TOL).unwrap();

        // Two triangles per face, corner vertices only.
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(unique_positions(&mesh.positions, 1e-4), 8);
        assert_eq!(mesh.positions.len(), mesh.normals.len());

        let (min, max) = bounds(&mesh.positions);
        let size = max - min;
        assert!((size - Vec3::ONE).abs().max_element() < 1e-4);
    }

    #[test]
    fn test_sphere_bounds_match_diameter() {
        let mut registry = ShapeRegistry::new();
        let ball = crate::builders::create_sphere(&mut registry, 0.5).unwrap();
        let mesh = triangle_mesh(&registry, &ball, MESH_TOL).unwrap();
        assert!(!mesh.is_empty());

        // Vertices lie on the exact surface, so the bounds come in at
        // the diameter minus at most the chord tolerance.
        let (min, max) = bounds(&mesh.positions);
        let size = max - min;
        for extent in [size.x, size.y, size.z] {
            assert!(extent <= 1.0 + 1e-4 && extent >= 1.0 - 0.05, "{extent}");
        }
    }

    #[test]
    fn test_transform_moves_mesh() {
        let mut registry = ShapeRegistry::new();
        let cube = create_box(&mut registry, 1.0, 1.0, 1.0).unwrap();
        registry
            .set_transform(&cube, Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)))
            .unwrap();
        let mesh = triangle_mesh(&registry, &cube, MESH_TOL).unwrap();
        let (min, max) = bounds(&mesh.positions);
        assert!((min.x - 2.5).abs() < 1e-4);
        assert!((max.x - 3.5).abs() < 1e-4);
    }

    #[test]
    fn test_box_wireframe() {
        let mut registry = ShapeRegistry::new();
        let cube = create_box(&mut registry, 1.0, 1.0, 1.0).unwrap();
        let mesh = line_mesh(&registry, &cube, MESH_TOL).unwrap();
        assert_eq!(mesh.segment_count(), 12);
    }

    #[test]
    fn test_path_line_and_tube_mesh() {
        let mut registry = ShapeRegistry::new();
        let path = create_path(
            &mut registry,
            &[Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0)],
            &[CornerStyle::Sharp; 3],
            false,
        )
        .unwrap();

        let lines = line_mesh(&registry, &path, MESH_TOL).unwrap();
        assert_eq!(lines.segment_count(), 2);

        let tubes = tube_mesh(&registry, &path, MESH_TOL, 0.002).unwrap();
        assert!(!tubes.is_empty());
        assert_eq!(tubes.indices.len() % 3, 0);
        assert_eq!(tubes.positions.len(), tubes.normals.len());
    }

    #[test]
    fn test_triangle_mesh_rejects_wire() {
        let mut registry = ShapeRegistry::new();
        let path = create_path(
            &mut registry,
            &[Vec3::ZERO, Vec3::X],
            &[CornerStyle::Sharp; 2],
            false,
        )
        .unwrap();
        assert!(matches!(
            triangle_mesh(&registry, &path, MESH_TOL),
            Err(CadError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_mesh_of_freed_handle_fails() {
        let mut registry = ShapeRegistry::new();
        let cube = create_box(&mut registry, 1.0, 1.0, 1.0).unwrap();
        registry.free(&cube);
        assert!(matches!(
            triangle_mesh(&registry, &cube, MESH_TOL),
            Err(CadError::NotFound(_))
        ));
    }

    #[test]
    fn test_stl_export() {
        let mut registry = ShapeRegistry::new();
        let cube = create_box(&mut registry, 1.0, 1.0, 1.0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        export_stl(&registry, &cube, &path, MESH_TOL).unwrap();

        // Binary STL: 80-byte header + 4-byte count + 50 bytes per
        // triangle.
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, 80 + 4 + 50 * 12);
    }

    #[test]
    fn test_stl_export_to_bad_path_fails() {
        let mut registry = ShapeRegistry::new();
        let cube = create_box(&mut registry, 1.0, 1.0, 1.0).unwrap();
        let result = export_stl(
            &registry,
            &cube,
            "/nonexistent-dir/never/cube.stl",
            MESH_TOL,
        );
        assert!(matches!(result, Err(CadError::Io(_))));
    }
}
