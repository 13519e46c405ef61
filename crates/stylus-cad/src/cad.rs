//! Flat CAD facade
//!
//! [`Cad`] bundles a [`ShapeRegistry`] with the tolerances the rest of
//! the crate takes as parameters, and exposes every modeling operation
//! as a single method taking and returning handles and plain buffers.
//! Host applications that do not want to compose the modules directly
//! talk to this type alone.

use std::path::Path;

use glam::{Mat3, Mat4, Vec3};

use crate::builders;
use crate::builders::CornerStyle;
use crate::error::{CadError, CadResult};
use crate::fitting;
use crate::mesh::{self, LineMesh, TriangleMesh};
use crate::registry::{Handle, Shape, ShapeRegistry};

/// Tolerances and display parameters shared by facade calls.
#[derive(Debug, Clone, Copy)]
pub struct CadConfig {
    /// Surface deviation bound for tessellation.
    pub mesh_tolerance: f64,
    /// Tolerance handed to the boolean kernel.
    pub boolean_tolerance: f64,
    /// Cylinder radius for tube meshes, in scene units.
    pub tube_radius: f32,
    /// Coincidence threshold for dimension classification.
    pub fitting_tolerance: f32,
}

impl Default for CadConfig {
    fn default() -> Self {
        Self {
            mesh_tolerance: 0.01,
            boolean_tolerance: 0.05,
            tube_radius: 0.002,
            fitting_tolerance: 0.005,
        }
    }
}

/// The full modeling surface behind one flat API.
#[derive(Debug)]
pub struct Cad {
    registry: ShapeRegistry,
    config: CadConfig,
}

impl Default for Cad {
    fn default() -> Self {
        Self::new()
    }
}

impl Cad {
    pub fn new() -> Self {
        Self::with_config(CadConfig::default())
    }

    pub fn with_config(config: CadConfig) -> Self {
        Self {
            registry: ShapeRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &CadConfig {
        &self.config
    }

    /// Direct access for callers mixing facade calls with module-level
    /// ones.
    pub fn registry(&self) -> &ShapeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ShapeRegistry {
        &mut self.registry
    }

    // ----- primitives -----

    pub fn create_sphere(&mut self, radius: f64) -> CadResult<Handle> {
        builders::create_sphere(&mut self.registry, radius)
    }

    pub fn create_box(&mut self, width: f64, height: f64, length: f64) -> CadResult<Handle> {
        builders::create_box(&mut self.registry, width, height, length)
    }

    pub fn create_pyramid(&mut self, width: f64, height: f64, length: f64) -> CadResult<Handle> {
        builders::create_pyramid(&mut self.registry, width, height, length)
    }

    pub fn create_cylinder(&mut self, radius: f64, height: f64) -> CadResult<Handle> {
        builders::create_cylinder(&mut self.registry, radius, height)
    }

    // ----- paths and swept shapes -----

    pub fn create_path(
        &mut self,
        points: &[Vec3],
        corners: &[CornerStyle],
        closed: bool,
    ) -> CadResult<Handle> {
        builders::create_path(&mut self.registry, points, corners, closed)
    }

    pub fn update_path(
        &mut self,
        handle: &Handle,
        points: &[Vec3],
        corners: &[CornerStyle],
        closed: bool,
    ) -> CadResult<Handle> {
        builders::update_path(&mut self.registry, handle, points, corners, closed)
    }

    pub fn sweep(&mut self, profile: &Handle, path: &Handle) -> CadResult<Handle> {
        builders::sweep(&mut self.registry, profile, path)
    }

    pub fn revolve(
        &mut self,
        profile: &Handle,
        axis_position: Vec3,
        axis_direction: Vec3,
    ) -> CadResult<Handle> {
        builders::revolve(&mut self.registry, profile, axis_position, axis_direction)
    }

    pub fn loft(&mut self, profiles: &[Handle]) -> CadResult<Handle> {
        builders::loft(&mut self.registry, profiles)
    }

    // ----- booleans -----

    pub fn boolean_cut(&mut self, a: &Handle, b: &Handle) -> CadResult<Handle> {
        builders::boolean_cut(&mut self.registry, a, b, self.config.boolean_tolerance)
    }

    pub fn boolean_join(&mut self, a: &Handle, b: &Handle) -> CadResult<Handle> {
        builders::boolean_join(&mut self.registry, a, b, self.config.boolean_tolerance)
    }

    pub fn boolean_intersect(&mut self, a: &Handle, b: &Handle) -> CadResult<Handle> {
        builders::boolean_intersect(&mut self.registry, a, b, self.config.boolean_tolerance)
    }

    // ----- placement -----

    pub fn transform_of(&self, handle: &Handle) -> CadResult<Mat4> {
        self.registry.transform_of(handle)
    }

    pub fn set_transform(&mut self, handle: &Handle, transform: Mat4) -> CadResult<()> {
        self.registry.set_transform(handle, transform)
    }

    pub fn set_general_transform(
        &mut self,
        handle: &Handle,
        affine: Mat3,
        translation: Vec3,
    ) -> CadResult<()> {
        self.registry.set_general_transform(handle, affine, translation)
    }

    pub fn set_pivot(&mut self, handle: &Handle, pivot: Mat4) -> CadResult<()> {
        self.registry.set_pivot(handle, pivot)
    }

    /// Re-anchor the shape's local origin at its bounding-box center
    /// and return the world position of that center.
    ///
    /// The shape does not move visually; only its pivot and transform
    /// change.
    pub fn center(&mut self, handle: &Handle) -> CadResult<Vec3> {
        let shape = self.registry.retrieve(handle)?;
        let (min, max) = mesh::shape_bounds(shape, self.config.mesh_tolerance)
            .ok_or_else(|| CadError::Geometry(format!("{handle} has no extent")))?;
        let local_center = (min + max) / 2.0;
        self.registry
            .set_pivot(handle, Mat4::from_translation(local_center))?;
        let transform = self.registry.transform_of(handle)?;
        Ok(transform.transform_point3(Vec3::ZERO))
    }

    // ----- lifecycle -----

    pub fn contains(&self, handle: &Handle) -> bool {
        self.registry.contains(handle)
    }

    pub fn is_path(&self, handle: &Handle) -> CadResult<bool> {
        Ok(matches!(self.registry.retrieve(handle)?, Shape::Wire(_)))
    }

    pub fn free(&mut self, handle: &Handle) {
        self.registry.free(handle);
    }

    // ----- fitting helpers -----

    pub fn flattened(&self, points: &[Vec3]) -> CadResult<Vec<Vec3>> {
        fitting::flatten(points)
    }

    pub fn circle_center(&self, points: &[Vec3]) -> CadResult<Vec3> {
        fitting::fit_circle_center(points)
    }

    pub fn principal_normal(&self, points: &[Vec3]) -> CadResult<Vec3> {
        fitting::principal_normal(points)
    }

    pub fn coincident_dimensions(&self, points: &[Vec3]) -> CadResult<u8> {
        fitting::coincident_dimensions(points, self.config.fitting_tolerance)
    }

    // ----- meshing and export -----

    pub fn triangle_mesh(&self, handle: &Handle) -> CadResult<TriangleMesh> {
        mesh::triangle_mesh(&self.registry, handle, self.config.mesh_tolerance)
    }

    pub fn line_mesh(&self, handle: &Handle) -> CadResult<LineMesh> {
        mesh::line_mesh(&self.registry, handle, self.config.mesh_tolerance)
    }

    pub fn tube_mesh(&self, handle: &Handle) -> CadResult<TriangleMesh> {
        mesh::tube_mesh(
            &self.registry,
            handle,
            self.config.mesh_tolerance,
            self.config.tube_radius,
        )
    }

    pub fn export_stl(&self, handle: &Handle, path: impl AsRef<Path>) -> CadResult<()> {
        mesh::export_stl(&self.registry, handle, path, self.config.mesh_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modeling_round_trip() {
        let mut cad = Cad::new();
        let cube = cad.create_box(1.0, 1.0, 1.0).unwrap();
        let ball = cad.create_sphere(0.4).unwrap();
        assert!(cad.contains(&cube));
        assert!(cad.contains(&ball));

        cad.set_transform(&cube, Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)))
            .unwrap();
        let mesh = cad.triangle_mesh(&cube).unwrap();
        assert!(!mesh.is_empty());

        cad.free(&ball);
        assert!(!cad.contains(&ball));
        cad.free(&ball);
        assert!(matches!(
            cad.triangle_mesh(&ball),
            Err(CadError::NotFound(_))
        ));
    }

    #[test]
    fn test_center_keeps_world_position() {
        let mut cad = Cad::new();
        // Cylinder base sits on the XZ plane, so its local bbox center
        // is halfway up the axis.
        let cylinder = cad.create_cylinder(0.5, 2.0).unwrap();
        let offset = Vec3::new(1.0, 2.0, 3.0);
        cad.set_transform(&cylinder, Mat4::from_translation(offset))
            .unwrap();

        let before = cad.triangle_mesh(&cylinder).unwrap();
        let world_center = cad.center(&cylinder).unwrap();
        assert!((world_center - (offset + Vec3::new(0.0, 1.0, 0.0))).length() < 1e-3);

        // The mesh must not have moved.
        let after = cad.triangle_mesh(&cylinder).unwrap();
        let sum = |m: &TriangleMesh| {
            m.positions
                .iter()
                .fold(Vec3::ZERO, |acc, p| acc + Vec3::from(*p))
        };
        let drift = (sum(&before) - sum(&after)).length() / before.positions.len() as f32;
        assert!(drift < 1e-3);
    }

    #[test]
    fn test_cut_preserves_outer_bounds() {
        let mut cad = Cad::new();
        let outer = cad.create_box(2.0, 2.0, 2.0).unwrap();
        // Taller than the target, so the cut is a through-hole; a tool
        // fully enclosed in the target would need a void shell the
        // kernel cannot build.
        let tool = cad.create_box(1.0, 3.0, 1.0).unwrap();
        let result = cad.boolean_cut(&outer, &tool).unwrap();

        // Punching a centered hole leaves the outer bounds intact.
        let mesh = cad.triangle_mesh(&result).unwrap();
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for p in &mesh.positions {
            min = min.min(Vec3::from(*p));
            max = max.max(Vec3::from(*p));
        }
        let size = max - min;
        assert!((size - Vec3::splat(2.0)).abs().max_element() < 1e-3);

        // Inputs stay registered, result carries no inherited transform.
        assert!(cad.contains(&outer));
        assert!(cad.contains(&tool));
        assert_eq!(cad.transform_of(&result).unwrap(), Mat4::IDENTITY);
    }

    #[test]
    fn test_path_classification() {
        let mut cad = Cad::new();
        let path = cad
            .create_path(
                &[Vec3::ZERO, Vec3::X, Vec3::new(1.0, 0.0, 1.0)],
                &[CornerStyle::Sharp; 3],
                false,
            )
            .unwrap();
        let cube = cad.create_box(1.0, 1.0, 1.0).unwrap();
        assert!(cad.is_path(&path).unwrap());
        assert!(!cad.is_path(&cube).unwrap());
    }

    #[test]
    fn test_fitting_passthrough() {
        let cad = Cad::new();
        let points = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
        ];
        let center = cad.circle_center(&points).unwrap();
        assert!(center.length() < 1e-4);

        let normal = cad.principal_normal(&points).unwrap();
        assert!(normal.y.abs() > 0.99);

        assert_eq!(cad.coincident_dimensions(&points).unwrap(), 2);
    }
}
