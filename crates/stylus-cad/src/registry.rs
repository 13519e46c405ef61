//! Handle-keyed shape registry
//!
//! Every shape the layer produces lives in a [`ShapeRegistry`] and is
//! referenced exclusively through an opaque [`Handle`]; no kernel type
//! crosses the application boundary. A registry entry couples the
//! untransformed geometry with its accumulated transform, and the
//! transform is only applied on the transformed read path, so moving a
//! shape around never re-derives its geometry.

use std::collections::HashMap;
use std::fmt;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use truck_modeling::{Matrix4, Solid, Wire, builder};
use uuid::Uuid;

use crate::error::{CadError, CadResult};

/// Opaque reference to one registered shape.
///
/// A handle is a 32-character alphanumeric ASCII string, so it can be
/// passed across an FFI boundary as a plain null-terminated string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(String);

impl Handle {
    /// Wrap an existing handle string (e.g. one read back from the host
    /// application layer).
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The raw handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of fresh handles.
///
/// Injected into the registry so tests can substitute a deterministic
/// sequence for the random default.
pub trait HandleSource {
    fn next_handle(&mut self) -> Handle;
}

/// Default handle source: the 32-character lowercase-hex simple form of
/// a random v4 UUID.
#[derive(Debug, Default)]
pub struct UuidHandleSource;

impl HandleSource for UuidHandleSource {
    fn next_handle(&mut self) -> Handle {
        Handle(Uuid::new_v4().simple().to_string())
    }
}

/// A kernel shape a handle can name.
///
/// Paths are stored as wires, everything else as solids; the operators
/// that accept "a profile or a solid" look shapes up through this enum
/// and reject the wrong variant themselves.
#[derive(Clone, Debug)]
pub enum Shape {
    Solid(Solid),
    Wire(Wire),
}

impl Shape {
    /// This shape with `mat` applied to its geometry.
    pub fn transformed(&self, mat: Matrix4) -> Shape {
        match self {
            Shape::Solid(solid) => Shape::Solid(builder::transformed(solid, mat)),
            Shape::Wire(wire) => Shape::Wire(builder::transformed(wire, mat)),
        }
    }

    /// The solid behind this shape, if it is one.
    pub fn as_solid(&self) -> Option<&Solid> {
        match self {
            Shape::Solid(solid) => Some(solid),
            Shape::Wire(_) => None,
        }
    }

    /// The wire behind this shape, if it is one.
    pub fn as_wire(&self) -> Option<&Wire> {
        match self {
            Shape::Wire(wire) => Some(wire),
            Shape::Solid(_) => None,
        }
    }
}

/// One registry entry: untransformed geometry plus its accumulated
/// transform (`world = transform * local`).
#[derive(Clone, Debug)]
struct StoredShape {
    shape: Shape,
    transform: Mat4,
}

/// Handle-keyed store of shapes and their transforms.
///
/// The registry has no internal locking; all CAD operations are
/// expected to run on one logical thread of control (or behind external
/// mutual exclusion).
pub struct ShapeRegistry {
    shapes: HashMap<Handle, StoredShape>,
    source: Box<dyn HandleSource>,
}

impl fmt::Debug for ShapeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeRegistry")
            .field("shapes", &self.shapes.keys())
            .finish_non_exhaustive()
    }
}

impl ShapeRegistry {
    /// Registry with random (UUID-backed) handle generation.
    pub fn new() -> Self {
        Self::with_source(UuidHandleSource)
    }

    /// Registry with a caller-supplied handle source.
    pub fn with_source(source: impl HandleSource + 'static) -> Self {
        Self {
            shapes: HashMap::new(),
            source: Box::new(source),
        }
    }

    /// Store a shape under a fresh handle and return it.
    ///
    /// Collisions are vanishingly unlikely with 128-bit random handles,
    /// but the registry still regenerates until the handle is unused so
    /// a store can never clobber a live entry.
    pub fn store(&mut self, shape: Shape) -> Handle {
        let mut handle = self.source.next_handle();
        while self.shapes.contains_key(&handle) {
            handle = self.source.next_handle();
        }
        self.shapes.insert(
            handle.clone(),
            StoredShape {
                shape,
                transform: Mat4::IDENTITY,
            },
        );
        handle
    }

    /// Store a shape under a caller-supplied handle.
    ///
    /// Overwriting an existing entry replaces the geometry but keeps
    /// the accumulated transform, so an in-place path update does not
    /// snap the path back to the origin.
    pub fn store_with(&mut self, shape: Shape, handle: &Handle) {
        match self.shapes.get_mut(handle) {
            Some(entry) => entry.shape = shape,
            None => {
                self.shapes.insert(
                    handle.clone(),
                    StoredShape {
                        shape,
                        transform: Mat4::IDENTITY,
                    },
                );
            }
        }
    }

    /// The untransformed shape stored under `handle`.
    pub fn retrieve(&self, handle: &Handle) -> CadResult<&Shape> {
        self.shapes
            .get(handle)
            .map(|entry| &entry.shape)
            .ok_or_else(|| CadError::NotFound(handle.clone()))
    }

    /// The shape stored under `handle` with its accumulated transform
    /// applied.
    pub fn retrieve_transformed(&self, handle: &Handle) -> CadResult<Shape> {
        let entry = self
            .shapes
            .get(handle)
            .ok_or_else(|| CadError::NotFound(handle.clone()))?;
        Ok(entry.shape.transformed(to_kernel_matrix(entry.transform)))
    }

    /// The accumulated transform of `handle`.
    pub fn transform_of(&self, handle: &Handle) -> CadResult<Mat4> {
        self.shapes
            .get(handle)
            .map(|entry| entry.transform)
            .ok_or_else(|| CadError::NotFound(handle.clone()))
    }

    /// Replace the accumulated transform.
    pub fn set_transform(&mut self, handle: &Handle, transform: Mat4) -> CadResult<()> {
        let entry = self
            .shapes
            .get_mut(handle)
            .ok_or_else(|| CadError::NotFound(handle.clone()))?;
        entry.transform = transform;
        Ok(())
    }

    /// Replace the accumulated transform with an affine part plus
    /// translation. Scaling has no UI path in the host application, so
    /// this is the least exercised entry point.
    pub fn set_general_transform(
        &mut self,
        handle: &Handle,
        affine: glam::Mat3,
        translation: glam::Vec3,
    ) -> CadResult<()> {
        let mut transform = Mat4::from_mat3(affine);
        transform.w_axis = translation.extend(1.0);
        self.set_transform(handle, transform)
    }

    /// Re-anchor the local origin of `handle` at `pivot` without moving
    /// the shape visually: the geometry is rebased by the pivot inverse
    /// and the transform picks the pivot up.
    pub fn set_pivot(&mut self, handle: &Handle, pivot: Mat4) -> CadResult<()> {
        let inverse = pivot.inverse();
        let entry = self
            .shapes
            .get_mut(handle)
            .ok_or_else(|| CadError::NotFound(handle.clone()))?;
        entry.shape = entry.shape.transformed(to_kernel_matrix(inverse));
        entry.transform = entry.transform * pivot;
        Ok(())
    }

    /// Remove the shape and its transform.
    ///
    /// Freeing a handle that is not (or no longer) registered is a
    /// no-op; idempotent removal keeps caller bookkeeping simple.
    pub fn free(&mut self, handle: &Handle) {
        self.shapes.remove(handle);
    }

    /// Whether `handle` names a live entry.
    pub fn contains(&self, handle: &Handle) -> bool {
        self.shapes.contains_key(handle)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a glam column-major matrix into the kernel's f64 matrix.
pub(crate) fn to_kernel_matrix(m: Mat4) -> Matrix4 {
    let c = m.to_cols_array();
    Matrix4::new(
        c[0] as f64,
        c[1] as f64,
        c[2] as f64,
        c[3] as f64,
        c[4] as f64,
        c[5] as f64,
        c[6] as f64,
        c[7] as f64,
        c[8] as f64,
        c[9] as f64,
        c[10] as f64,
        c[11] as f64,
        c[12] as f64,
        c[13] as f64,
        c[14] as f64,
        c[15] as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use truck_modeling::Point3;

    /// Deterministic source for tests; repeats each handle `repeat + 1`
    /// times to exercise the collision loop.
    struct SequentialSource {
        counter: u64,
        repeat: u32,
        emitted: u32,
    }

    impl SequentialSource {
        fn new(repeat: u32) -> Self {
            Self {
                counter: 0,
                repeat,
                emitted: 0,
            }
        }
    }

    impl HandleSource for SequentialSource {
        fn next_handle(&mut self) -> Handle {
            let handle = Handle(format!("{:032x}", self.counter));
            if self.emitted < self.repeat {
                self.emitted += 1;
            } else {
                self.counter += 1;
                self.emitted = 0;
            }
            handle
        }
    }

    fn line_wire() -> Shape {
        let v0 = builder::vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = builder::vertex(Point3::new(1.0, 0.0, 0.0));
        Shape::Wire(vec![builder::line(&v0, &v1)].into())
    }

    #[test]
    fn test_handle_format() {
        let handle = UuidHandleSource.next_handle();
        assert_eq!(handle.as_str().len(), 32);
        assert!(handle.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_store_retrieve() {
        let mut registry = ShapeRegistry::new();
        let handle = registry.store(line_wire());
        assert!(registry.contains(&handle));
        assert!(registry.retrieve(&handle).is_ok());
        assert!(registry.retrieve_transformed(&handle).is_ok());
    }

    #[test]
    fn test_free_then_retrieve_fails() {
        let mut registry = ShapeRegistry::new();
        let handle = registry.store(line_wire());
        registry.free(&handle);
        assert!(matches!(
            registry.retrieve(&handle),
            Err(CadError::NotFound(_))
        ));
        // Double free is a no-op.
        registry.free(&handle);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_collision_regenerates() {
        let mut registry = ShapeRegistry::with_source(SequentialSource::new(1));
        let a = registry.store(line_wire());
        let b = registry.store(line_wire());
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_store_with_preserves_transform() {
        let mut registry = ShapeRegistry::new();
        let handle = registry.store(line_wire());
        let moved = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        registry.set_transform(&handle, moved).unwrap();

        registry.store_with(line_wire(), &handle);
        assert_eq!(registry.transform_of(&handle).unwrap(), moved);
    }

    #[test]
    fn test_unknown_handle_is_not_found() {
        let mut registry = ShapeRegistry::new();
        let missing = Handle::new("deadbeefdeadbeefdeadbeefdeadbeef");
        assert!(matches!(
            registry.retrieve_transformed(&missing),
            Err(CadError::NotFound(_))
        ));
        assert!(matches!(
            registry.set_transform(&missing, Mat4::IDENTITY),
            Err(CadError::NotFound(_))
        ));
    }
}
