//! Geometry Registry Layer for Stylus-Drawn CAD
//!
//! This crate provides:
//! - Handle-keyed shape registry over the truck B-Rep kernel
//! - Point-cloud fitting helpers (planes, circles, dimensionality)
//! - Shape builders: primitives, stroked paths, sweeps, revolves,
//!   lofts and booleans
//! - Mesh extraction (triangles, wireframes, tubes) and STL export
//! - A flat [`Cad`] facade bundling the above behind one API

pub mod builders;
pub mod cad;
pub mod error;
pub mod fitting;
pub mod mesh;
pub mod registry;

// Re-exports for convenience
pub use builders::{
    CornerStyle, SAME_POINT_TOLERANCE, boolean_cut, boolean_intersect, boolean_join, create_box,
    create_cylinder, create_path, create_pyramid, create_sphere, loft, revolve, sweep, update_path,
};
pub use cad::{Cad, CadConfig};
pub use error::{CadError, CadResult};
pub use fitting::{
    Plane, coincident_dimensions, fit_circle_center, fit_plane, flatten, principal_normal, project,
};
pub use mesh::{LineMesh, TriangleMesh, export_stl, line_mesh, triangle_mesh, tube_mesh};
pub use registry::{Handle, HandleSource, Shape, ShapeRegistry, UuidHandleSource};
