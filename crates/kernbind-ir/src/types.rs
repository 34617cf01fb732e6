//! Type system for the kernbind IR.

use crate::arena::Handle;

/// Width of a scalar type in bytes.
pub type Bytes = u8;

/// The kind of a scalar type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    /// Boolean.
    Bool,
    /// Signed integer.
    Sint,
    /// Unsigned integer.
    Uint,
    /// Floating point.
    Float,
}

/// A scalar type: kind + byte width.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub width: Bytes,
}

impl Scalar {
    pub const BOOL: Self = Self {
        kind: ScalarKind::Bool,
        width: 1,
    };
    pub const I32: Self = Self {
        kind: ScalarKind::Sint,
        width: 4,
    };
    pub const U32: Self = Self {
        kind: ScalarKind::Uint,
        width: 4,
    };
    pub const F32: Self = Self {
        kind: ScalarKind::Float,
        width: 4,
    };
}

/// Number of components in a vector.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum VectorSize {
    /// 2 components.
    Bi = 2,
    /// 3 components.
    Tri = 3,
    /// 4 components.
    Quad = 4,
}

impl VectorSize {
    /// Converts a component count into a vector size.
    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            2 => Some(Self::Bi),
            3 => Some(Self::Tri),
            4 => Some(Self::Quad),
            _ => None,
        }
    }
}

/// Size of an array.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ArraySize {
    /// Fixed-size array.
    Constant(u32),
    /// Runtime-sized array.
    Dynamic,
}

/// Memory address space a pointer refers to.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AddressSpace {
    /// Function-local storage.
    Function,
    /// Module-scope private storage.
    Private,
    /// OpenCL `__global` memory.
    Global,
    /// OpenCL `__constant` memory.
    Constant,
    /// OpenCL `__local` (workgroup) memory.
    Local,
    /// A bound storage buffer descriptor.
    StorageBuffer,
}

/// Access qualifier of an image handle.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ImageAccess {
    /// `read_only` image.
    ReadOnly,
    /// `write_only` image.
    WriteOnly,
}

/// A member of a struct type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct StructMember {
    pub name: Option<String>,
    pub ty: Handle<Type>,
}

/// A named type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Type {
    pub name: Option<String>,
    pub inner: TypeInner,
}

impl Type {
    /// An unnamed type with the given shape.
    pub fn anonymous(inner: TypeInner) -> Self {
        Self { name: None, inner }
    }
}

/// The concrete shape of a type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum TypeInner {
    /// A single scalar value.
    Scalar(Scalar),
    /// A vector of scalars.
    Vector { size: VectorSize, scalar: Scalar },
    /// A fixed-size or runtime-sized array.
    Array { base: Handle<Type>, size: ArraySize },
    /// A composite struct type.
    Struct { members: Vec<StructMember> },
    /// A pointer to a value in a given address space.
    Pointer {
        base: Handle<Type>,
        space: AddressSpace,
    },
    /// Opaque sampler handle.
    Sampler,
    /// Opaque image handle.
    Image { access: ImageAccess },
}

impl TypeInner {
    /// Returns `true` for types passed by value as plain data.
    pub fn is_plain_data(&self) -> bool {
        matches!(
            self,
            Self::Scalar(_) | Self::Vector { .. } | Self::Array { .. } | Self::Struct { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::UniqueArena;

    #[test]
    fn scalar_constants() {
        assert_eq!(Scalar::F32.kind, ScalarKind::Float);
        assert_eq!(Scalar::F32.width, 4);
        assert_eq!(Scalar::U32.kind, ScalarKind::Uint);
        assert_eq!(Scalar::BOOL.width, 1);
    }

    #[test]
    fn type_dedup() {
        let mut types = UniqueArena::new();
        let t0 = types.insert(Type::anonymous(TypeInner::Scalar(Scalar::F32)));
        let t1 = types.insert(Type::anonymous(TypeInner::Scalar(Scalar::F32)));
        assert_eq!(t0, t1);
        assert_eq!(types.len(), 1);
    }

    #[test]
    fn pointer_spaces_are_distinct_types() {
        let mut types = UniqueArena::new();
        let f32_ty = types.insert(Type::anonymous(TypeInner::Scalar(Scalar::F32)));
        let global = types.insert(Type::anonymous(TypeInner::Pointer {
            base: f32_ty,
            space: AddressSpace::Global,
        }));
        let local = types.insert(Type::anonymous(TypeInner::Pointer {
            base: f32_ty,
            space: AddressSpace::Local,
        }));
        assert_ne!(global, local);
    }

    #[test]
    fn named_structs_not_deduped() {
        let mut types = UniqueArena::new();
        let f32_ty = types.insert(Type::anonymous(TypeInner::Scalar(Scalar::F32)));
        let members = vec![StructMember {
            name: None,
            ty: f32_ty,
        }];
        let a = types.insert(Type {
            name: Some("a".into()),
            inner: TypeInner::Struct {
                members: members.clone(),
            },
        });
        let b = types.insert(Type {
            name: Some("b".into()),
            inner: TypeInner::Struct { members },
        });
        assert_ne!(a, b);
    }

    #[test]
    fn plain_data_shapes() {
        assert!(TypeInner::Scalar(Scalar::I32).is_plain_data());
        assert!(!TypeInner::Sampler.is_plain_data());
        assert!(
            !TypeInner::Image {
                access: ImageAccess::ReadOnly
            }
            .is_plain_data()
        );
    }

    #[test]
    fn vector_size_from_count() {
        assert_eq!(VectorSize::from_count(4), Some(VectorSize::Quad));
        assert_eq!(VectorSize::from_count(5), None);
        assert_eq!(VectorSize::Tri as u32, 3);
    }
}
