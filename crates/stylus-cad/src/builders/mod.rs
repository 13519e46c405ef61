//! Constructive operators
//!
//! Every operator validates its parameters, builds a boundary
//! representation through the Truck kernel, and only then stores the
//! result, so a failed build never leaves a partial registry entry.
//! Parameter mistakes surface as [`InvalidParameter`] before any kernel
//! call; kernel rejections surface as [`Geometry`].
//!
//! [`InvalidParameter`]: crate::error::CadError::InvalidParameter
//! [`Geometry`]: crate::error::CadError::Geometry

mod ops;
mod path;
mod primitives;

pub use ops::{boolean_cut, boolean_intersect, boolean_join, loft, revolve, sweep};
pub use path::{CornerStyle, SAME_POINT_TOLERANCE, create_path, update_path};
pub use primitives::{create_box, create_cylinder, create_pyramid, create_sphere};

use glam::Vec3;
use truck_modeling::{Point3, Vector3};

pub(crate) fn point3(v: Vec3) -> Point3 {
    Point3::new(v.x as f64, v.y as f64, v.z as f64)
}

pub(crate) fn vector3(v: Vec3) -> Vector3 {
    Vector3::new(v.x as f64, v.y as f64, v.z as f64)
}

pub(crate) fn to_vec3(p: Point3) -> Vec3 {
    Vec3::new(p.x as f32, p.y as f32, p.z as f32)
}
