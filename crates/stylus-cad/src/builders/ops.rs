//! Sweep, revolve, loft and boolean combination
//!
//! All of these consume registered handles. Profile and path inputs are
//! read through the transformed path of the registry, so the world
//! placement of the inputs is what gets swept or combined. Inputs stay
//! registered afterwards; freeing them is the caller's decision.

use std::f64::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use truck_modeling::{Face, Rad, Shell, ShellCondition, Solid, Wire, builder};

use super::{point3, to_vec3, vector3};
use crate::error::{CadError, CadResult};
use crate::registry::{Handle, Shape, ShapeRegistry, to_kernel_matrix};

fn profile_wire(shape: Shape, handle: &Handle) -> CadResult<Wire> {
    let wire = match shape {
        Shape::Wire(wire) => wire,
        Shape::Solid(_) => {
            return Err(CadError::InvalidParameter(format!(
                "profile {handle} must be a path, not a solid"
            )));
        }
    };
    if !wire.is_closed() {
        return Err(CadError::InvalidParameter(format!(
            "profile {handle} must be a closed path"
        )));
    }
    Ok(wire)
}

fn attach_plane(wire: &Wire, what: &str) -> CadResult<Face> {
    builder::try_attach_plane(&[wire.clone()])
        .map_err(|e| CadError::Geometry(format!("{what} is not planar: {e:?}")))
}

fn transformed_solid(registry: &ShapeRegistry, handle: &Handle) -> CadResult<Solid> {
    match registry.retrieve_transformed(handle)? {
        Shape::Solid(solid) => Ok(solid),
        Shape::Wire(_) => Err(CadError::InvalidParameter(format!(
            "boolean input {handle} must be a solid"
        ))),
    }
}

/// Chord polyline of a wire: the vertex of every edge start, plus the
/// final vertex for open wires.
fn chord_points(wire: &Wire) -> Vec<Vec3> {
    let mut points: Vec<Vec3> = wire
        .edge_iter()
        .map(|edge| to_vec3(edge.front().point()))
        .collect();
    if !wire.is_closed() {
        if let Some(last) = wire.edge_iter().last() {
            points.push(to_vec3(last.back().point()));
        }
    }
    points
}

/// Ruled solid through an ordered run of wires with matching edge
/// counts. `closed` rules the last wire back onto the first instead of
/// capping the ends.
fn ruled_solid(wires: &[Wire], closed: bool) -> CadResult<Solid> {
    let count = wires.len();
    if count < 2 {
        return Err(CadError::InvalidParameter(format!(
            "ruling needs at least 2 sections, got {count}"
        )));
    }
    let spans = if closed { count } else { count - 1 };

    let mut sides: Vec<Face> = Vec::new();
    for i in 0..spans {
        let a = &wires[i];
        let b = &wires[(i + 1) % count];
        if a.len() != b.len() {
            return Err(CadError::Geometry(format!(
                "profiles must have matching edge counts ({} vs {})",
                a.len(),
                b.len()
            )));
        }
        let span: Shell = builder::try_wire_homotopy(a, b)
            .map_err(|e| CadError::Geometry(format!("profiles cannot be ruled together: {e:?}")))?;
        sides.extend(span);
    }

    if closed {
        let shell: Shell = sides.into();
        return Solid::try_new(vec![shell])
            .map_err(|e| CadError::Geometry(format!("ruled shell does not close: {e:?}")));
    }

    let cap_start = attach_plane(&wires[0].inverse(), "start profile")?;
    let cap_end = attach_plane(&wires[count - 1], "end profile")?;

    // The ruled faces fix which way the caps must wind; try the second
    // polarity if the first leaves the shell open.
    for flip in [false, true] {
        let mut faces = sides.clone();
        if flip {
            faces.push(cap_start.inverse());
            faces.push(cap_end.inverse());
        } else {
            faces.push(cap_start.clone());
            faces.push(cap_end.clone());
        }
        let shell: Shell = faces.into();
        if shell.shell_condition() == ShellCondition::Closed {
            return Solid::try_new(vec![shell])
                .map_err(|e| CadError::Geometry(format!("ruled shell is not a solid: {e:?}")));
        }
    }
    Err(CadError::Geometry(
        "ruled shell does not close over its caps".into(),
    ))
}

/// Tangent directions along a polyline, averaging the two neighbor
/// segments at interior vertices.
fn polyline_tangents(points: &[Vec3], closed: bool) -> Vec<Vec3> {
    let n = points.len();
    (0..n)
        .map(|i| {
            let incoming = if i > 0 {
                Some((points[i] - points[i - 1]).normalize())
            } else if closed {
                Some((points[0] - points[n - 1]).normalize())
            } else {
                None
            };
            let outgoing = if i + 1 < n {
                Some((points[i + 1] - points[i]).normalize())
            } else if closed {
                Some((points[0] - points[n - 1]).normalize())
            } else {
                None
            };
            match (incoming, outgoing) {
                (Some(a), Some(b)) => (a + b).normalize_or(a),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => Vec3::X,
            }
        })
        .collect()
}

/// Extrude the closed planar profile along the path.
///
/// A single-segment path is a plain translational sweep. Longer paths
/// place a rotated copy of the profile at every path vertex (rotating
/// the start tangent onto the local tangent) and rule the copies
/// together.
pub fn sweep(registry: &mut ShapeRegistry, profile: &Handle, path: &Handle) -> CadResult<Handle> {
    let profile_shape = registry.retrieve_transformed(profile)?;
    let path_shape = registry.retrieve_transformed(path)?;
    let path_wire = match &path_shape {
        Shape::Wire(wire) => wire,
        Shape::Solid(_) => {
            return Err(CadError::InvalidParameter(format!(
                "sweep path {path} must be a path, not a solid"
            )));
        }
    };

    let wire = profile_wire(profile_shape, profile)?;
    let closed = path_wire.is_closed();
    let points = chord_points(path_wire);
    if points.len() < 2 {
        return Err(CadError::InvalidParameter(
            "sweep path has no extent".into(),
        ));
    }

    let solid = if !closed && points.len() == 2 {
        let face = attach_plane(&wire, "sweep profile")?;
        builder::tsweep(&face, vector3(points[1] - points[0]))
    } else {
        let start = points[0];
        let tangents = polyline_tangents(&points, closed);
        let instances: Vec<Wire> = points
            .iter()
            .zip(&tangents)
            .map(|(&p, &tangent)| {
                let rotation = Quat::from_rotation_arc(tangents[0], tangent);
                let mat = Mat4::from_translation(p)
                    * Mat4::from_quat(rotation)
                    * Mat4::from_translation(-start);
                builder::transformed(&wire, to_kernel_matrix(mat))
            })
            .collect();
        ruled_solid(&instances, closed)?
    };

    let handle = registry.store(Shape::Solid(solid));
    tracing::debug!(handle = %handle, %profile, %path, "sweep");
    Ok(handle)
}

/// Revolve the closed planar profile a full turn around the axis
/// through `axis_position` along `axis_direction`.
pub fn revolve(
    registry: &mut ShapeRegistry,
    profile: &Handle,
    axis_position: Vec3,
    axis_direction: Vec3,
) -> CadResult<Handle> {
    if axis_direction.length_squared() < f32::EPSILON {
        return Err(CadError::InvalidParameter(
            "revolution axis direction must be non-zero".into(),
        ));
    }
    let shape = registry.retrieve_transformed(profile)?;
    let wire = profile_wire(shape, profile)?;
    let face = attach_plane(&wire, "revolve profile")?;
    let solid = builder::rsweep(
        &face,
        point3(axis_position),
        vector3(axis_direction.normalize()),
        Rad(TAU),
    );
    let handle = registry.store(Shape::Solid(solid));
    tracing::debug!(handle = %handle, %profile, "revolve");
    Ok(handle)
}

/// Ruled solid interpolating the given closed profiles in order.
///
/// Profiles need matching edge counts and consistent orientation;
/// anything the kernel cannot rule together surfaces as a geometry
/// error.
pub fn loft(registry: &mut ShapeRegistry, profiles: &[Handle]) -> CadResult<Handle> {
    if profiles.len() < 2 {
        return Err(CadError::InvalidParameter(format!(
            "loft needs at least 2 profiles, got {}",
            profiles.len()
        )));
    }
    let wires: Vec<Wire> = profiles
        .iter()
        .map(|handle| {
            let shape = registry.retrieve_transformed(handle)?;
            profile_wire(shape, handle)
        })
        .collect::<CadResult<_>>()?;
    let solid = ruled_solid(&wires, false)?;
    let handle = registry.store(Shape::Solid(solid));
    tracing::debug!(handle = %handle, profiles = profiles.len(), "loft");
    Ok(handle)
}

/// Run a boolean kernel call, containing panics.
///
/// `truck_shapeops` panics instead of returning `None` on some inputs
/// it cannot handle (a cut tool fully enclosed in the target would
/// need an inner void shell, which `Solid::new` rejects mid-operation).
/// The operands are owned clones that are discarded on unwind, so the
/// panic is contained here and reported like any other kernel
/// rejection.
fn contained_shapeop<F>(op: F) -> Option<Solid>
where
    F: FnOnce() -> Option<Solid>,
{
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(op))
        .ok()
        .flatten()
}

/// `a` minus `b`, in world space.
pub fn boolean_cut(
    registry: &mut ShapeRegistry,
    a: &Handle,
    b: &Handle,
    tolerance: f64,
) -> CadResult<Handle> {
    let solid_a = transformed_solid(registry, a)?;
    let mut solid_b = transformed_solid(registry, b)?;
    // Complement of the tool turns intersection into subtraction.
    solid_b.not();
    let Some(result) = contained_shapeop(|| truck_shapeops::and(&solid_a, &solid_b, tolerance))
    else {
        tracing::warn!(%a, %b, "boolean cut rejected by kernel");
        return Err(CadError::Geometry(format!(
            "boolean cut of {a} by {b} produced no solid"
        )));
    };
    Ok(registry.store(Shape::Solid(result)))
}

/// Union of `a` and `b`, in world space.
pub fn boolean_join(
    registry: &mut ShapeRegistry,
    a: &Handle,
    b: &Handle,
    tolerance: f64,
) -> CadResult<Handle> {
    let solid_a = transformed_solid(registry, a)?;
    let solid_b = transformed_solid(registry, b)?;
    let Some(result) = contained_shapeop(|| truck_shapeops::or(&solid_a, &solid_b, tolerance))
    else {
        tracing::warn!(%a, %b, "boolean join rejected by kernel");
        return Err(CadError::Geometry(format!(
            "boolean join of {a} and {b} produced no solid"
        )));
    };
    Ok(registry.store(Shape::Solid(result)))
}

/// Intersection of `a` and `b`, in world space.
pub fn boolean_intersect(
    registry: &mut ShapeRegistry,
    a: &Handle,
    b: &Handle,
    tolerance: f64,
) -> CadResult<Handle> {
    let solid_a = transformed_solid(registry, a)?;
    let solid_b = transformed_solid(registry, b)?;
    let Some(result) = contained_shapeop(|| truck_shapeops::and(&solid_a, &solid_b, tolerance))
    else {
        tracing::warn!(%a, %b, "boolean intersect rejected by kernel");
        return Err(CadError::Geometry(format!(
            "boolean intersection of {a} and {b} is empty"
        )));
    };
    Ok(registry.store(Shape::Solid(result)))
}
