//! Reports how kernel buffer arguments deduplicate, without changing the
//! module.

use kernbind_analysis::buffer_discriminants;
use kernbind_ir::{Module, format_type};

use crate::{CompileContext, Pass, PassError, trace_if};

/// Computes the buffer discriminant map and stores it in the context.
#[derive(Debug, Default)]
pub struct BufferDiscriminants;

impl Pass for BufferDiscriminants {
    fn name(&self) -> &str {
        "buffer-discriminants"
    }

    fn run(&self, module: &mut Module, ctx: &mut CompileContext) -> Result<bool, PassError> {
        let map = buffer_discriminants(module)?;
        for (index, key) in map.iter() {
            trace_if!(
                ctx.options.show_discriminants,
                "Map {} {} -> {index}",
                format_type(key.ty, &module.types),
                key.position
            );
        }
        ctx.buffer_discriminants = Some(map);
        Ok(false)
    }
}
