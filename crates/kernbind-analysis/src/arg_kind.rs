//! Kernel argument kind classification.

use std::fmt;

use kernbind_ir::{AddressSpace, Handle, ImageAccess, Type, TypeInner, UniqueArena, format_type};

/// How a kernel argument is bound by the host API.
///
/// The discriminant values are the kind tags passed to resource accessors.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u32)]
pub enum ArgKind {
    /// Storage buffer behind a `__global` or `__constant` pointer.
    Buffer = 0,
    /// Plain-old-data passed by value.
    Pod = 1,
    /// `read_only` image.
    ReadOnlyImage = 2,
    /// `write_only` image.
    WriteOnlyImage = 3,
    /// Sampler handle.
    Sampler = 4,
    /// Workgroup array behind a `__local` pointer.
    Local = 5,
}

impl ArgKind {
    /// The numeric tag passed to resource accessors.
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Descriptor-map spelling of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Pod => "pod",
            Self::ReadOnlyImage => "ro_image",
            Self::WriteOnlyImage => "wo_image",
            Self::Sampler => "sampler",
            Self::Local => "local",
        }
    }

    /// Kinds whose parameters can be resolved to a fixed binding.
    pub fn is_resource(self) -> bool {
        matches!(
            self,
            Self::Buffer | Self::ReadOnlyImage | Self::WriteOnlyImage | Self::Sampler
        )
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type outside the kernel argument taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("unhandled kernel argument type: {ty}")]
    UnhandledType { ty: String },
}

/// Classifies a parameter type.
///
/// Pointers into function or private memory, and pointers into a storage
/// buffer that already went through allocation, are not kernel argument
/// types and are rejected.
pub fn classify(ty: Handle<Type>, types: &UniqueArena<Type>) -> Result<ArgKind, ClassifyError> {
    let inner = &types[ty].inner;
    match inner {
        TypeInner::Pointer { space, .. } => match space {
            AddressSpace::Global | AddressSpace::Constant => Ok(ArgKind::Buffer),
            AddressSpace::Local => Ok(ArgKind::Local),
            AddressSpace::Function | AddressSpace::Private | AddressSpace::StorageBuffer => {
                Err(ClassifyError::UnhandledType {
                    ty: format_type(ty, types),
                })
            }
        },
        TypeInner::Sampler => Ok(ArgKind::Sampler),
        TypeInner::Image {
            access: ImageAccess::ReadOnly,
        } => Ok(ArgKind::ReadOnlyImage),
        TypeInner::Image {
            access: ImageAccess::WriteOnly,
        } => Ok(ArgKind::WriteOnlyImage),
        _ if inner.is_plain_data() => Ok(ArgKind::Pod),
        _ => Err(ClassifyError::UnhandledType {
            ty: format_type(ty, types),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernbind_ir::{Module, Scalar, StructMember, VectorSize};

    fn pointer(module: &mut Module, space: AddressSpace) -> Handle<Type> {
        let f32_ty = module.scalar_type(Scalar::F32);
        module.anonymous_type(TypeInner::Pointer { base: f32_ty, space })
    }

    #[test]
    fn pointers_by_address_space() {
        let mut m = Module::default();
        let global = pointer(&mut m, AddressSpace::Global);
        let constant = pointer(&mut m, AddressSpace::Constant);
        let local = pointer(&mut m, AddressSpace::Local);
        assert_eq!(classify(global, &m.types).unwrap(), ArgKind::Buffer);
        assert_eq!(classify(constant, &m.types).unwrap(), ArgKind::Buffer);
        assert_eq!(classify(local, &m.types).unwrap(), ArgKind::Local);
    }

    #[test]
    fn private_pointer_is_unhandled() {
        let mut m = Module::default();
        let private = pointer(&mut m, AddressSpace::Private);
        let err = classify(private, &m.types).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unhandled kernel argument type: ptr<private, f32>"
        );
    }

    #[test]
    fn values_are_pod() {
        let mut m = Module::default();
        let i32_ty = m.scalar_type(Scalar::I32);
        let vec_ty = m.anonymous_type(TypeInner::Vector {
            size: VectorSize::Quad,
            scalar: Scalar::F32,
        });
        let struct_ty = m.anonymous_type(TypeInner::Struct {
            members: vec![StructMember {
                name: None,
                ty: i32_ty,
            }],
        });
        for ty in [i32_ty, vec_ty, struct_ty] {
            assert_eq!(classify(ty, &m.types).unwrap(), ArgKind::Pod);
        }
    }

    #[test]
    fn opaque_handles() {
        let mut m = Module::default();
        let sampler = m.anonymous_type(TypeInner::Sampler);
        let ro = m.anonymous_type(TypeInner::Image {
            access: ImageAccess::ReadOnly,
        });
        let wo = m.anonymous_type(TypeInner::Image {
            access: ImageAccess::WriteOnly,
        });
        assert_eq!(classify(sampler, &m.types).unwrap(), ArgKind::Sampler);
        assert_eq!(classify(ro, &m.types).unwrap(), ArgKind::ReadOnlyImage);
        assert_eq!(classify(wo, &m.types).unwrap(), ArgKind::WriteOnlyImage);
    }

    #[test]
    fn accessor_tags() {
        let tags: Vec<_> = [
            ArgKind::Buffer,
            ArgKind::Pod,
            ArgKind::ReadOnlyImage,
            ArgKind::WriteOnlyImage,
            ArgKind::Sampler,
            ArgKind::Local,
        ]
        .into_iter()
        .map(ArgKind::tag)
        .collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(ArgKind::Sampler.to_string(), "sampler");
    }

    #[test]
    fn resource_kinds() {
        assert!(ArgKind::Buffer.is_resource());
        assert!(ArgKind::Sampler.is_resource());
        assert!(!ArgKind::Pod.is_resource());
        assert!(!ArgKind::Local.is_resource());
    }
}
