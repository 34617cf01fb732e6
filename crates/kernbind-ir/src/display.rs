//! Display implementations and the textual module dump.
//!
//! The dump uses the same syntax the `kernbind-parser` crate reads, so a
//! dumped module can be fed back through the pipeline.

use std::collections::HashSet;
use std::fmt::{self, Write as _};

use crate::Module;
use crate::arena::{Handle, UniqueArena};
use crate::expr::{BinaryOp, Expression, Literal};
use crate::func::{CallingConvention, Function};
use crate::stmt::Statement;
use crate::types::{AddressSpace, ArraySize, ImageAccess, Scalar, ScalarKind, Type, TypeInner};

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Sint => write!(f, "sint"),
            Self::Uint => write!(f, "uint"),
            Self::Float => write!(f, "float"),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Bool => write!(f, "bool"),
            ScalarKind::Sint => write!(f, "i{}", self.width * 8),
            ScalarKind::Uint => write!(f, "u{}", self.width * 8),
            ScalarKind::Float => write!(f, "f{}", self.width * 8),
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Function => "function",
            Self::Private => "private",
            Self::Global => "global",
            Self::Constant => "constant",
            Self::Local => "local",
            Self::StorageBuffer => "storage_buffer",
        })
    }
}

impl fmt::Display for ImageAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadOnly => "read",
            Self::WriteOnly => "write",
        })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}u"),
            Self::F32(v) => write!(f, "{v:?}"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::Multiply => "mul",
        })
    }
}

/// Formats a type using the type arena for resolving inner references.
pub fn format_type(handle: Handle<Type>, types: &UniqueArena<Type>) -> String {
    let ty = &types[handle];
    match &ty.inner {
        TypeInner::Scalar(s) => format!("{s}"),
        TypeInner::Vector { size, scalar } => format!("vec<{}, {scalar}>", *size as u32),
        TypeInner::Array { base, size } => {
            let base_str = format_type(*base, types);
            match size {
                ArraySize::Constant(n) => format!("array<{base_str}, {n}>"),
                ArraySize::Dynamic => format!("array<{base_str}>"),
            }
        }
        TypeInner::Struct { members } => {
            let fields: Vec<_> = members.iter().map(|m| format_type(m.ty, types)).collect();
            match &ty.name {
                Some(name) => format!("struct %{name}{{{}}}", fields.join(", ")),
                None => format!("struct{{{}}}", fields.join(", ")),
            }
        }
        TypeInner::Pointer { base, space } => {
            format!("ptr<{space}, {}>", format_type(*base, types))
        }
        TypeInner::Sampler => "sampler".into(),
        TypeInner::Image { access } => format!("image<{access}>"),
    }
}

/// Produces the textual form of a [`Module`].
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();
    let mut first = true;
    for (_, func) in module.functions.iter() {
        if !first && !func.is_declaration() {
            out.push('\n');
        }
        first = false;
        dump_function(&mut out, func, module);
    }
    out
}

fn dump_function(out: &mut String, func: &Function, module: &Module) {
    let types = &module.types;
    let kernel = func.calling_convention == CallingConvention::Kernel;
    let head = match (func.is_declaration(), kernel) {
        (true, true) => "declare kernel",
        (true, false) => "declare",
        (false, true) => "kernel",
        (false, false) => "fn",
    };

    let args: Vec<_> = func
        .arguments
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            let ty = format_type(arg.ty, types);
            let mut text = if func.is_declaration() && arg.name.is_none() {
                ty
            } else {
                format!("%{}: {ty}", argument_name(func, i as u32))
            };
            if let Some(direct) = &arg.direct {
                let accessor = module
                    .functions
                    .try_get(direct.accessor)
                    .map_or("?", |f| f.name.as_str());
                let _ = write!(
                    text,
                    " direct(@{accessor}, {}, {}, {})",
                    direct.set, direct.binding, direct.depth
                );
            }
            text
        })
        .collect();

    let _ = write!(out, "{head} @{}({})", func.name, args.join(", "));
    if let Some(result) = func.result {
        let _ = write!(out, " -> {}", format_type(result, types));
    }
    if func.pure {
        out.push_str(" pure");
    }

    match &func.body {
        None => out.push('\n'),
        Some(body) => {
            out.push_str(" {\n");
            let mut printer = BodyPrinter {
                func,
                module,
                printed: HashSet::new(),
                out,
            };
            printer.block(body, 2);
            printer.out.push_str("}\n");
        }
    }
}

fn argument_name(func: &Function, index: u32) -> String {
    func.arguments
        .get(index as usize)
        .and_then(|a| a.name.clone())
        .unwrap_or_else(|| format!("arg{index}"))
}

struct BodyPrinter<'a> {
    func: &'a Function,
    module: &'a Module,
    printed: HashSet<Handle<Expression>>,
    out: &'a mut String,
}

impl BodyPrinter<'_> {
    fn name(&self, handle: Handle<Expression>) -> String {
        match self.func.named_expressions.get(&handle) {
            Some(name) => name.clone(),
            None => format!("_{}", handle.index()),
        }
    }

    fn operand(&self, handle: Handle<Expression>) -> String {
        match self.func.expressions.try_get(handle) {
            Some(Expression::Literal(lit)) => format!("{lit}"),
            Some(Expression::FunctionArgument(i)) => format!("%{}", argument_name(self.func, *i)),
            _ => format!("%{}", self.name(handle)),
        }
    }

    fn callee_name(&self, handle: Handle<Function>) -> &str {
        self.module
            .functions
            .try_get(handle)
            .map_or("?", |f| f.name.as_str())
    }

    /// Prints the defining lines of `handle` and its operands, operands first.
    fn define(&mut self, handle: Handle<Expression>, indent: usize) {
        if self.printed.contains(&handle) {
            return;
        }
        let func = self.func;
        let Some(expr) = func.expressions.try_get(handle) else {
            return;
        };
        let rhs = match expr {
            Expression::Literal(_) | Expression::FunctionArgument(_) | Expression::CallResult(_) => {
                return;
            }
            Expression::Access { base, indices } => {
                let mut ops = vec![*base];
                ops.extend(indices.iter().copied());
                for op in &ops {
                    self.define(*op, indent);
                }
                let ops: Vec<_> = ops.iter().map(|h| self.operand(*h)).collect();
                format!("access {}", ops.join(", "))
            }
            Expression::Load { pointer } => {
                self.define(*pointer, indent);
                format!("load {}", self.operand(*pointer))
            }
            Expression::Binary { op, left, right } => {
                self.define(*left, indent);
                self.define(*right, indent);
                format!("{op} {}, {}", self.operand(*left), self.operand(*right))
            }
        };
        self.printed.insert(handle);
        let line = format!("{:indent$}%{} = {rhs}\n", "", self.name(handle));
        self.out.push_str(&line);
    }

    fn block(&mut self, block: &[Statement], indent: usize) {
        for stmt in block {
            self.statement(stmt, indent);
        }
    }

    fn statement(&mut self, stmt: &Statement, indent: usize) {
        let pad = " ".repeat(indent);
        match stmt {
            Statement::Store { pointer, value } => {
                self.define(*pointer, indent);
                self.define(*value, indent);
                let line = format!(
                    "{pad}store {}, {}\n",
                    self.operand(*pointer),
                    self.operand(*value)
                );
                self.out.push_str(&line);
            }
            Statement::Call {
                function,
                arguments,
                result,
            } => {
                for arg in arguments {
                    self.define(*arg, indent);
                }
                let args: Vec<_> = arguments.iter().map(|h| self.operand(*h)).collect();
                let lhs = match result {
                    Some(r) => {
                        self.printed.insert(*r);
                        format!("%{} = ", self.name(*r))
                    }
                    None => String::new(),
                };
                let line = format!(
                    "{pad}{lhs}call @{}({})\n",
                    self.callee_name(*function),
                    args.join(", ")
                );
                self.out.push_str(&line);
            }
            Statement::If {
                condition,
                accept,
                reject,
            } => {
                self.define(*condition, indent);
                let line = format!("{pad}if {} {{\n", self.operand(*condition));
                self.out.push_str(&line);
                self.block(accept, indent + 2);
                if !reject.is_empty() {
                    self.out.push_str(&format!("{pad}}} else {{\n"));
                    self.block(reject, indent + 2);
                }
                self.out.push_str(&format!("{pad}}}\n"));
            }
            Statement::Loop { body } => {
                self.out.push_str(&format!("{pad}loop {{\n"));
                self.block(body, indent + 2);
                self.out.push_str(&format!("{pad}}}\n"));
            }
            Statement::Break => self.out.push_str(&format!("{pad}break\n")),
            Statement::Return { value: None } => self.out.push_str(&format!("{pad}return\n")),
            Statement::Return { value: Some(v) } => {
                self.define(*v, indent);
                let line = format!("{pad}return {}\n", self.operand(*v));
                self.out.push_str(&line);
            }
        }
    }
}
