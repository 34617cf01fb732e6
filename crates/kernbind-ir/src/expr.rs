//! Expressions: pure SSA values.

use crate::arena::Handle;
use crate::types::Scalar;

/// A literal constant value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    I32(i32),
    U32(u32),
    F32(f32),
}

impl Literal {
    /// Returns the scalar type of this literal.
    pub fn scalar(&self) -> Scalar {
        match *self {
            Self::Bool(_) => Scalar::BOOL,
            Self::I32(_) => Scalar::I32,
            Self::U32(_) => Scalar::U32,
            Self::F32(_) => Scalar::F32,
        }
    }

    /// Returns the value of a non-negative integer literal.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::U32(v) => Some(v),
            Self::I32(v) => u32::try_from(v).ok(),
            Self::Bool(_) | Self::F32(_) => None,
        }
    }

    /// Returns `true` for an integer literal equal to zero.
    pub fn is_zero_index(&self) -> bool {
        self.as_u32() == Some(0)
    }
}

/// A binary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
}

/// A pure SSA value.
///
/// Expressions are stored in per-function arenas and referenced by
/// [`Handle<Expression>`].
#[derive(Clone, Debug)]
pub enum Expression {
    /// A literal constant.
    Literal(Literal),
    /// Reference to a function argument by index.
    FunctionArgument(u32),
    /// The result of a function call (paired with a `Call` statement).
    CallResult(Handle<crate::Function>),
    /// Structural address computation into an aggregate, one index per
    /// level of nesting. The first index steps over the pointer itself.
    Access {
        base: Handle<Expression>,
        indices: Vec<Handle<Expression>>,
    },
    /// Load a value through a pointer.
    Load { pointer: Handle<Expression> },
    /// Apply a binary operator.
    Binary {
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    },
}

impl Expression {
    /// Returns all expression handles directly referenced by this expression.
    pub fn operands(&self) -> Vec<Handle<Expression>> {
        match self {
            Self::Literal(_) | Self::FunctionArgument(_) | Self::CallResult(_) => vec![],
            Self::Access { base, indices } => {
                let mut ops = vec![*base];
                ops.extend(indices.iter().copied());
                ops
            }
            Self::Load { pointer } => vec![*pointer],
            Self::Binary { left, right, .. } => vec![*left, *right],
        }
    }

    /// Calls `f` on every operand slot of this expression.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Handle<Expression>)) {
        match self {
            Self::Literal(_) | Self::FunctionArgument(_) | Self::CallResult(_) => {}
            Self::Access { base, indices } => {
                f(base);
                indices.iter_mut().for_each(f);
            }
            Self::Load { pointer } => f(pointer),
            Self::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
        }
    }
}
