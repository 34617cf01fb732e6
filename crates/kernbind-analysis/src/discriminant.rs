//! Kernel argument discriminants.
//!
//! Two kernel arguments with the same type at the same position share a
//! descriptor identity. Position stands in for "the host may bind a
//! different buffer here", which overcounts when unrelated kernels happen
//! to line up; that approximation is accepted.

use std::collections::HashMap;

use kernbind_ir::{Handle, Module, Type};

use crate::arg_kind::{ArgKind, ClassifyError, classify};

/// Dedup key for kernel arguments: structural type identity plus position.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Discriminant {
    pub ty: Handle<Type>,
    pub position: u32,
}

/// Dense numbering of discriminants in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct DiscriminantMap {
    indices: HashMap<Discriminant, usize>,
    order: Vec<Discriminant>,
}

impl DiscriminantMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `key` and whether it was newly assigned.
    pub fn get_or_insert(&mut self, key: Discriminant) -> (usize, bool) {
        if let Some(&index) = self.indices.get(&key) {
            return (index, false);
        }
        let index = self.order.len();
        self.indices.insert(key, index);
        self.order.push(key);
        (index, true)
    }

    /// Returns the index previously assigned to `key`.
    pub fn get(&self, key: &Discriminant) -> Option<usize> {
        self.indices.get(key).copied()
    }

    /// Number of distinct discriminants.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no discriminant was recorded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates over `(index, discriminant)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Discriminant)> + '_ {
        self.order.iter().copied().enumerate()
    }
}

/// Numbers the buffer arguments of every kernel definition.
///
/// Non-buffer arguments are skipped but still advance the position.
pub fn buffer_discriminants(module: &Module) -> Result<DiscriminantMap, ClassifyError> {
    let mut map = DiscriminantMap::new();
    for (_, func) in module.functions.iter() {
        if !func.is_kernel_definition() {
            continue;
        }
        for (position, arg) in func.arguments.iter().enumerate() {
            if classify(arg.ty, &module.types)? != ArgKind::Buffer {
                continue;
            }
            let key = Discriminant {
                ty: arg.ty,
                position: position as u32,
            };
            map.get_or_insert(key);
        }
    }
    Ok(map)
}
