//! Per-compilation state threaded through every pass.

use kernbind_analysis::DiscriminantMap;

use crate::allocate::AllocationReport;
use crate::direct_access::ParameterVerdict;
use crate::sampler_map::SamplerMap;

/// Switches controlling the pipeline and its trace output.
#[derive(Clone, Debug, Default)]
pub struct PassOptions {
    /// Run [`crate::DirectResourceAccess`] in the standard pipeline.
    pub direct_resource_access: bool,
    /// Rewrite proven parameters to call the accessor directly.
    pub rewrite_direct_access: bool,
    /// Trace discriminant to index mappings.
    pub show_discriminants: bool,
    /// Trace descriptor set and binding assignments.
    pub show_descriptors: bool,
    /// Trace resolved and unresolved parameters.
    pub show_direct_access: bool,
}

/// Hands out descriptor set numbers, never reusing one within a
/// compilation unit.
#[derive(Clone, Debug, Default)]
pub struct DescriptorCounter {
    next: u32,
}

impl DescriptorCounter {
    /// A counter starting at set 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the next unused descriptor set.
    pub fn claim(&mut self) -> u32 {
        let set = self.next;
        self.next += 1;
        set
    }

    /// The set the next [`DescriptorCounter::claim`] will return.
    pub fn next_set(&self) -> u32 {
        self.next
    }
}

/// State owned by one compiler invocation.
///
/// Independent compilations each get their own context, so descriptor
/// numbering never leaks between them.
#[derive(Clone, Debug, Default)]
pub struct CompileContext {
    pub options: PassOptions,
    /// Literal sampler values, in the order supplied.
    pub sampler_map: SamplerMap,
    pub descriptors: DescriptorCounter,
    /// Filled by [`crate::BufferDiscriminants`].
    pub buffer_discriminants: Option<DiscriminantMap>,
    /// Filled by [`crate::AllocateDescriptors`].
    pub allocation: Option<AllocationReport>,
    /// Filled by [`crate::DirectResourceAccess`], in level order.
    pub direct_access: Vec<ParameterVerdict>,
}

impl CompileContext {
    /// A fresh context with the given options and sampler map.
    pub fn new(options: PassOptions, sampler_map: SamplerMap) -> Self {
        Self {
            options,
            sampler_map,
            ..Self::default()
        }
    }
}
