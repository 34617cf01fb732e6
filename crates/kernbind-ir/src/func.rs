//! Functions, arguments, and call sites.

use std::collections::HashMap;

use crate::arena::{Arena, Handle};
use crate::expr::{Expression, Literal};
use crate::stmt::{Block, Statement, walk_block, walk_block_mut};
use crate::types::Type;

/// Calling convention of a function.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum CallingConvention {
    /// Callable only from other IR functions.
    #[default]
    Ordinary,
    /// A kernel entry point, callable from the host.
    Kernel,
}

/// Proof that a parameter always receives the same bound resource.
///
/// Every call site passes `depth` zero-offset accesses applied to a call of
/// `accessor` with the constant `set` and `binding` operands.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct DirectResource {
    pub accessor: Handle<Function>,
    pub set: u32,
    pub binding: u32,
    pub depth: u32,
}

/// A function argument declaration.
#[derive(Clone, Debug)]
pub struct FunctionArgument {
    /// Optional argument name.
    pub name: Option<String>,
    /// The type of this argument.
    pub ty: Handle<Type>,
    /// Set once the argument is proven to have a single resource origin.
    pub direct: Option<DirectResource>,
}

impl FunctionArgument {
    /// An unresolved argument of the given type.
    pub fn new(name: Option<String>, ty: Handle<Type>) -> Self {
        Self {
            name,
            ty,
            direct: None,
        }
    }
}

/// An IR function.
#[derive(Clone, Debug)]
pub struct Function {
    /// Function name; unique within a module.
    pub name: String,
    /// Kernel entry point or ordinary function.
    pub calling_convention: CallingConvention,
    /// Formal parameters.
    pub arguments: Vec<FunctionArgument>,
    /// Return type, `None` for void.
    pub result: Option<Handle<Type>>,
    /// Whether calls have no side effects.
    pub pure: bool,
    /// Expression arena for this function.
    pub expressions: Arena<Expression>,
    /// Map from expression handles to user-defined names.
    pub named_expressions: HashMap<Handle<Expression>, String>,
    /// The function body; `None` for an external declaration.
    pub body: Option<Block>,
}

impl Function {
    /// Creates an empty ordinary function with the given name and an empty body.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calling_convention: CallingConvention::Ordinary,
            arguments: Vec::new(),
            result: None,
            pure: false,
            expressions: Arena::new(),
            named_expressions: HashMap::new(),
            body: Some(Vec::new()),
        }
    }

    /// Creates an empty kernel entry point.
    pub fn kernel(name: impl Into<String>) -> Self {
        Self {
            calling_convention: CallingConvention::Kernel,
            ..Self::new(name)
        }
    }

    /// Creates an external declaration with the given signature.
    pub fn declaration(
        name: impl Into<String>,
        arguments: Vec<Handle<Type>>,
        result: Option<Handle<Type>>,
    ) -> Self {
        Self {
            arguments: arguments
                .into_iter()
                .map(|ty| FunctionArgument::new(None, ty))
                .collect(),
            result,
            body: None,
            ..Self::new(name)
        }
    }

    /// Returns `true` if this function has no body.
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    /// Returns `true` for a kernel entry point that has a body.
    pub fn is_kernel_definition(&self) -> bool {
        self.calling_convention == CallingConvention::Kernel && !self.is_declaration()
    }

    /// Appends an argument reference expression for parameter `index`.
    pub fn argument_expression(&mut self, index: u32) -> Handle<Expression> {
        self.expressions.append(Expression::FunctionArgument(index))
    }

    /// Appends a literal expression.
    pub fn literal(&mut self, literal: Literal) -> Handle<Expression> {
        self.expressions.append(Expression::Literal(literal))
    }

    /// Returns the literal value behind `handle`, if it is a literal.
    pub fn literal_value(&self, handle: Handle<Expression>) -> Option<Literal> {
        match self.expressions.try_get(handle)? {
            Expression::Literal(lit) => Some(*lit),
            _ => None,
        }
    }

    /// Returns all call statements in the body, in program order.
    pub fn calls(&self) -> Vec<CallSite<'_>> {
        let mut calls = Vec::new();
        if let Some(body) = &self.body {
            walk_block(body, &mut |stmt| {
                if let Statement::Call {
                    function,
                    arguments,
                    result,
                } = stmt
                {
                    calls.push(CallSite {
                        callee: *function,
                        arguments,
                        result: *result,
                    });
                }
            });
        }
        calls
    }

    /// Finds the call statement whose result is `result`.
    pub fn call_producing(&self, result: Handle<Expression>) -> Option<CallSite<'_>> {
        self.calls()
            .into_iter()
            .find(|call| call.result == Some(result))
    }

    /// Redirects every use of `from` to `to`, in expressions and statements.
    ///
    /// The expression `to` itself is left untouched so that a replacement
    /// derived from `from` does not become self-referential.
    pub fn replace_uses(&mut self, from: Handle<Expression>, to: Handle<Expression>) -> bool {
        let mut changed = false;
        let mut redirect = |h: &mut Handle<Expression>| {
            if *h == from {
                *h = to;
                changed = true;
            }
        };
        for (handle, expr) in self.expressions.iter_mut() {
            if handle != to {
                expr.for_each_operand_mut(&mut redirect);
            }
        }
        if let Some(body) = &mut self.body {
            walk_block_mut(body, &mut |stmt| stmt.for_each_operand_mut(&mut redirect));
        }
        changed
    }
}

/// A borrowed view of one call statement.
#[derive(Clone, Copy, Debug)]
pub struct CallSite<'a> {
    pub callee: Handle<Function>,
    pub arguments: &'a [Handle<Expression>],
    pub result: Option<Handle<Expression>>,
}
