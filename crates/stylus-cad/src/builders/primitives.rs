//! Primitive solids
//!
//! Exact B-Rep primitives in a y-up layout: box and sphere are centered
//! at the origin, cylinder and pyramid stand on the XZ plane. Callers
//! position them afterwards through the registry transform.

use std::f64::consts::TAU;

use truck_modeling::{Edge, Point3, Rad, Shell, Solid, Vector3, Vertex, Wire, builder};

use crate::error::{CadError, CadResult};
use crate::registry::{Handle, Shape, ShapeRegistry};

fn ensure_positive(name: &str, value: f64) -> CadResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CadError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

/// Sphere of the given radius, centered at the origin.
///
/// Built by revolving a half-disk profile a full turn around the y
/// axis, the same construction the revolve operator uses.
pub fn create_sphere(registry: &mut ShapeRegistry, radius: f64) -> CadResult<Handle> {
    ensure_positive("radius", radius)?;

    let bottom = builder::vertex(Point3::new(0.0, -radius, 0.0));
    let top = builder::vertex(Point3::new(0.0, radius, 0.0));
    let axis = builder::line(&bottom, &top);
    let arc = builder::circle_arc(&top, &bottom, Point3::new(radius, 0.0, 0.0));
    let wire: Wire = vec![axis, arc].into();
    let face = builder::try_attach_plane(&[wire])
        .map_err(|e| CadError::Geometry(format!("sphere profile is not planar: {e:?}")))?;
    let solid = builder::rsweep(
        &face,
        Point3::new(0.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Rad(TAU),
    );
    Ok(registry.store(Shape::Solid(solid)))
}

/// Axis-aligned box, centered at the origin.
pub fn create_box(
    registry: &mut ShapeRegistry,
    width: f64,
    height: f64,
    length: f64,
) -> CadResult<Handle> {
    ensure_positive("width", width)?;
    ensure_positive("height", height)?;
    ensure_positive("length", length)?;

    let corner = builder::vertex(Point3::new(-width / 2.0, -height / 2.0, -length / 2.0));
    let edge = builder::tsweep(&corner, Vector3::new(width, 0.0, 0.0));
    let face = builder::tsweep(&edge, Vector3::new(0.0, height, 0.0));
    let solid = builder::tsweep(&face, Vector3::new(0.0, 0.0, length));
    Ok(registry.store(Shape::Solid(solid)))
}

/// Four-sided pyramid: a `width` × `length` base on the XZ plane
/// centered under the apex, apex at `(0, height, 0)`.
///
/// Truck has no wedge primitive, so the five faces are attached to a
/// hand-assembled shell: base edges shared between the base face and
/// the sides, side edges shared between neighboring triangles.
pub fn create_pyramid(
    registry: &mut ShapeRegistry,
    width: f64,
    height: f64,
    length: f64,
) -> CadResult<Handle> {
    ensure_positive("width", width)?;
    ensure_positive("height", height)?;
    ensure_positive("length", length)?;

    let half_w = width / 2.0;
    let half_l = length / 2.0;
    let corners: Vec<Vertex> = [
        Point3::new(-half_w, 0.0, -half_l),
        Point3::new(half_w, 0.0, -half_l),
        Point3::new(half_w, 0.0, half_l),
        Point3::new(-half_w, 0.0, half_l),
    ]
    .into_iter()
    .map(builder::vertex)
    .collect();
    let apex = builder::vertex(Point3::new(0.0, height, 0.0));

    let base_edges: Vec<Edge> = (0..4)
        .map(|i| builder::line(&corners[i], &corners[(i + 1) % 4]))
        .collect();
    let side_edges: Vec<Edge> = corners.iter().map(|c| builder::line(c, &apex)).collect();

    // Wound v0 -> v1 -> v2 -> v3 the base normal points down, out of
    // the solid.
    let base_wire: Wire = base_edges.clone().into();
    let base_face = builder::try_attach_plane(&[base_wire])
        .map_err(|e| CadError::Geometry(format!("pyramid base is not planar: {e:?}")))?;

    let mut faces = vec![base_face];
    for i in 0..4 {
        let next = (i + 1) % 4;
        let wire: Wire = vec![
            base_edges[i].inverse(),
            side_edges[i].clone(),
            side_edges[next].inverse(),
        ]
        .into();
        let face = builder::try_attach_plane(&[wire])
            .map_err(|e| CadError::Geometry(format!("pyramid side is not planar: {e:?}")))?;
        faces.push(face);
    }

    let shell: Shell = faces.into();
    let solid = Solid::try_new(vec![shell])
        .map_err(|e| CadError::Geometry(format!("pyramid shell does not close: {e:?}")))?;
    Ok(registry.store(Shape::Solid(solid)))
}

/// Cylinder of the given radius and height, base circle on the XZ
/// plane around the origin, extruded along +y.
///
/// The base circle is an exact circular wire (a vertex swept a full
/// turn around the axis), not a polygonal approximation.
pub fn create_cylinder(registry: &mut ShapeRegistry, radius: f64, height: f64) -> CadResult<Handle> {
    ensure_positive("radius", radius)?;
    ensure_positive("height", height)?;

    let seed = builder::vertex(Point3::new(radius, 0.0, 0.0));
    let circle: Wire = builder::rsweep(
        &seed,
        Point3::new(0.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Rad(TAU),
    );
    let disk = builder::try_attach_plane(&[circle])
        .map_err(|e| CadError::Geometry(format!("cylinder base is not planar: {e:?}")))?;
    let solid = builder::tsweep(&disk, Vector3::new(0.0, height, 0.0));
    Ok(registry.store(Shape::Solid(solid)))
}
