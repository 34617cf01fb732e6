//! kernbind intermediate representation.
//!
//! An arena-based SSA IR for OpenCL C kernels on their way to SPIR-V.
//! Functions carry a calling convention distinguishing host-callable
//! kernels from ordinary helpers; resources are still plain typed
//! arguments until descriptor allocation rewrites them.

pub mod arena;
pub mod builtins;
mod display;
mod error;
mod expr;
mod func;
mod stmt;
mod types;

pub use arena::{Arena, Handle, UniqueArena};
pub use display::{dump_module, format_type};
pub use error::IrError;
pub use expr::{BinaryOp, Expression, Literal};
pub use func::{CallSite, CallingConvention, DirectResource, Function, FunctionArgument};
pub use stmt::{Block, Statement, walk_block, walk_block_mut};
pub use types::{
    AddressSpace, ArraySize, Bytes, ImageAccess, Scalar, ScalarKind, StructMember, Type,
    TypeInner, VectorSize,
};

/// A whole-program kernbind IR module.
///
/// Function arena order is the module declaration order.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// Deduplicated type arena.
    pub types: UniqueArena<Type>,
    /// All functions, definitions and declarations alike.
    pub functions: Arena<Function>,
}

impl Module {
    /// Looks up a function by name.
    pub fn function_by_name(&self, name: &str) -> Option<Handle<Function>> {
        self.functions
            .iter()
            .find(|(_, f)| f.name == name)
            .map(|(h, _)| h)
    }

    /// Adds a function, failing if its name is taken.
    pub fn add_function(&mut self, function: Function) -> Result<Handle<Function>, IrError> {
        if self.function_by_name(&function.name).is_some() {
            return Err(IrError::DuplicateFunction(function.name));
        }
        Ok(self.functions.append(function))
    }

    /// Returns the function named like `function`, inserting it if absent.
    pub fn get_or_insert_function(&mut self, function: Function) -> Handle<Function> {
        match self.function_by_name(&function.name) {
            Some(handle) => handle,
            None => self.functions.append(function),
        }
    }

    /// Interns an unnamed type.
    pub fn anonymous_type(&mut self, inner: TypeInner) -> Handle<Type> {
        self.types.insert(Type::anonymous(inner))
    }

    /// Interns a scalar type.
    pub fn scalar_type(&mut self, scalar: Scalar) -> Handle<Type> {
        self.anonymous_type(TypeInner::Scalar(scalar))
    }

    /// Returns every call to `callee` as `(caller, call site)`, callers in
    /// module order and calls in program order.
    pub fn call_sites_of(&self, callee: Handle<Function>) -> Vec<(Handle<Function>, CallSite<'_>)> {
        self.functions
            .iter()
            .flat_map(|(caller, f)| {
                f.calls()
                    .into_iter()
                    .filter(move |call| call.callee == callee)
                    .map(move |call| (caller, call))
            })
            .collect()
    }

    /// Removes a function that is no longer called.
    ///
    /// Every later function handle shifts down by one; all references held
    /// by the module (calls, call results, resolved arguments) are remapped.
    pub fn remove_function(&mut self, handle: Handle<Function>) -> Result<Function, IrError> {
        if handle.index() >= self.functions.len() {
            return Err(IrError::BadHandle {
                index: handle.index(),
                size: self.functions.len(),
            });
        }
        let call_sites = self.call_sites_of(handle).len();
        if call_sites > 0 {
            return Err(IrError::FunctionStillCalled {
                name: self.functions[handle].name.clone(),
                call_sites,
            });
        }

        let removed = self.functions.remove(handle);
        let remap = |h: &mut Handle<Function>| {
            if *h > handle {
                *h = Handle::new(h.index() as u32 - 1);
            }
        };
        for (_, func) in self.functions.iter_mut() {
            for (_, expr) in func.expressions.iter_mut() {
                if let Expression::CallResult(callee) = expr {
                    remap(callee);
                }
            }
            for arg in &mut func.arguments {
                if let Some(direct) = &mut arg.direct {
                    remap(&mut direct.accessor);
                }
            }
            if let Some(body) = &mut func.body {
                walk_block_mut(body, &mut |stmt| {
                    if let Statement::Call { function, .. } = stmt {
                        remap(function);
                    }
                });
            }
        }
        Ok(removed)
    }
}
