//! Descriptor allocation and direct resource access passes for kernbind.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] that runs a fixed pipeline
//! once, and the passes that bind kernel resources to descriptor sets:
//!
//! - [`BufferDiscriminants`] reports how buffer arguments deduplicate.
//! - [`AllocateDescriptors`] binds literal samplers and kernel arguments.
//! - [`DirectResourceAccess`] proves which helper parameters always receive
//!   the same binding.

mod allocate;
mod context;
mod direct_access;
mod discriminants;
mod sampler_map;

pub use allocate::{AllocateDescriptors, AllocationReport, ArgumentBinding, LiteralSamplerBinding};
pub use context::{CompileContext, DescriptorCounter, PassOptions};
pub use direct_access::{
    DirectResourceAccess, ParameterVerdict, UnresolvedReason, Verdict, resolve_parameter,
};
pub use discriminants::BufferDiscriminants;
pub use sampler_map::{SamplerMap, SamplerMapEntry};

use std::fmt::Debug;

use kernbind_analysis::ClassifyError;
use kernbind_ir::{IrError, Module};

/// Logs at `info` when the matching `show_*` option is on, `debug` otherwise.
macro_rules! trace_if {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            log::info!($($arg)+)
        } else {
            log::debug!($($arg)+)
        }
    };
}
pub(crate) use trace_if;

/// Unrecoverable faults. Any of these aborts the compilation unit.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// A literal sampler is used but no sampler map was supplied.
    #[error("function '{function}' uses a literal sampler but no sampler map was provided")]
    MissingSamplerMap { function: String },

    /// The sampler initializer argument is not a compile-time constant.
    #[error("sampler initializer in '{function}' has a non-constant argument")]
    NonConstantSampler { function: String },

    /// A literal sampler value that the sampler map does not list.
    #[error("literal sampler value {value} in '{function}' is not in the sampler map")]
    UnregisteredSampler { value: u32, function: String },

    /// `__local` kernel arguments cannot be bound to descriptors.
    #[error("kernel '{kernel}' argument {position}: local arguments are not supported")]
    LocalArgument { kernel: String, position: u32 },

    /// A kernel argument outside the kind taxonomy.
    #[error("kernel '{kernel}' argument {position}: {source}")]
    ArgumentKind {
        kernel: String,
        position: u32,
        #[source]
        source: ClassifyError,
    },

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Ir(#[from] IrError),
}

/// A transformation or analysis over a whole module.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Run the pass on a module. Returns `true` if anything was modified.
    fn run(&self, module: &mut Module, ctx: &mut CompileContext) -> Result<bool, PassError>;
}

/// Runs passes in sequence, each exactly once.
///
/// The descriptor passes are not idempotent (the allocator deletes the
/// sampler initializer and would duplicate accessors on a second run), so
/// there is no fixed-point iteration.
#[derive(Debug, Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard binding pipeline for the given options.
    pub fn standard(options: &PassOptions) -> Self {
        let mut pm = Self::new();
        pm.add_pass(Box::new(BufferDiscriminants));
        pm.add_pass(Box::new(AllocateDescriptors));
        if options.direct_resource_access {
            pm.add_pass(Box::new(DirectResourceAccess));
        }
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Names of the scheduled passes, in order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs every pass once. Stops at the first fault.
    pub fn run(&self, module: &mut Module, ctx: &mut CompileContext) -> Result<bool, PassError> {
        let mut changed = false;
        for pass in &self.passes {
            log::debug!("running pass '{}'", pass.name());
            let modified = pass.run(module, ctx)?;
            log::debug!("pass '{}' modified module: {modified}", pass.name());
            changed |= modified;
        }
        Ok(changed)
    }
}
