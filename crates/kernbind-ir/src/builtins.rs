//! Reserved function and type names shared by the passes and the
//! downstream SPIR-V emitter.

/// OpenCL builtin that turns a literal sampler value into a sampler handle.
pub const SAMPLER_INITIALIZER: &str = "__translate_sampler_initializer";

/// Accessor for literal samplers: `(set, binding, sampler_map_index) -> sampler`.
pub const LITERAL_SAMPLER_ACCESSOR: &str = "kernbind.sampler.literal";

/// Prefix of resource accessors: `(set, binding, kind, arg_index)`.
pub const RESOURCE_ACCESSOR_PREFIX: &str = "kernbind.resource.";

/// Prefix of the carrier types returned by resource accessors.
pub const RESOURCE_TYPE_PREFIX: &str = "kernbind.resource.type.";

/// Name of the resource accessor for discriminant `index`.
pub fn resource_accessor_name(index: usize) -> String {
    format!("{RESOURCE_ACCESSOR_PREFIX}{index}")
}

/// Name of the carrier type for discriminant `index`.
pub fn resource_type_name(index: usize) -> String {
    format!("{RESOURCE_TYPE_PREFIX}{index}")
}

/// Returns `true` if `name` is a resource accessor.
pub fn is_resource_accessor(name: &str) -> bool {
    name.strip_prefix(RESOURCE_ACCESSOR_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_names() {
        assert_eq!(resource_accessor_name(3), "kernbind.resource.3");
        assert_eq!(resource_type_name(0), "kernbind.resource.type.0");
        assert!(is_resource_accessor("kernbind.resource.12"));
        assert!(!is_resource_accessor("kernbind.resource.type.0"));
        assert!(!is_resource_accessor("kernbind.resource."));
        assert!(!is_resource_accessor(LITERAL_SAMPLER_ACCESSOR));
    }
}
