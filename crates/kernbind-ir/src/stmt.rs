//! Statements: side effects and control flow.

use crate::arena::Handle;
use crate::expr::Expression;

/// A block of statements.
pub type Block = Vec<Statement>;

/// A statement in the IR.
///
/// Statements have side effects and/or control flow.
/// They operate on expressions referenced by handles.
#[derive(Clone, Debug)]
pub enum Statement {
    /// Write a value through a pointer.
    Store {
        pointer: Handle<Expression>,
        value: Handle<Expression>,
    },
    /// Call a function.
    Call {
        function: Handle<crate::Function>,
        arguments: Vec<Handle<Expression>>,
        result: Option<Handle<Expression>>,
    },
    /// Conditional branch.
    If {
        condition: Handle<Expression>,
        accept: Block,
        reject: Block,
    },
    /// Loop until a `Break`.
    Loop { body: Block },
    /// Break out of the innermost loop.
    Break,
    /// Return from the function.
    Return { value: Option<Handle<Expression>> },
}

impl Statement {
    /// Calls `f` on every expression slot of this statement, not descending
    /// into nested blocks.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Handle<Expression>)) {
        match self {
            Self::Store { pointer, value } => {
                f(pointer);
                f(value);
            }
            Self::Call { arguments, .. } => arguments.iter_mut().for_each(f),
            Self::If { condition, .. } => f(condition),
            Self::Return { value: Some(v) } => f(v),
            Self::Loop { .. } | Self::Break | Self::Return { value: None } => {}
        }
    }

    /// Returns the nested blocks of a control-flow statement.
    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            Self::If { accept, reject, .. } => vec![accept, reject],
            Self::Loop { body } => vec![body],
            _ => vec![],
        }
    }

    /// Returns the nested blocks of a control-flow statement, mutably.
    pub fn blocks_mut(&mut self) -> Vec<&mut Block> {
        match self {
            Self::If { accept, reject, .. } => vec![accept, reject],
            Self::Loop { body } => vec![body],
            _ => vec![],
        }
    }
}

/// Visits every statement in `block`, depth first, in program order.
pub fn walk_block<'a>(block: &'a [Statement], f: &mut impl FnMut(&'a Statement)) {
    for stmt in block {
        f(stmt);
        for inner in stmt.blocks() {
            walk_block(inner, f);
        }
    }
}

/// Mutable counterpart of [`walk_block`].
pub fn walk_block_mut(block: &mut [Statement], f: &mut impl FnMut(&mut Statement)) {
    for stmt in block {
        f(stmt);
        for inner in stmt.blocks_mut() {
            walk_block_mut(inner, f);
        }
    }
}
