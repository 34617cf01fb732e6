//! Error types for the kernbind IR.

/// Errors that can occur when constructing or editing IR.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    /// A function with the same name already exists.
    #[error("function '{0}' is already defined")]
    DuplicateFunction(String),

    /// A function cannot be removed while call sites still reference it.
    #[error("function '{name}' is still called from {call_sites} site(s)")]
    FunctionStillCalled { name: String, call_sites: usize },
}
