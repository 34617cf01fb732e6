use kernbind_ir::Module;
use kernbind_opt::{CompileContext, PassError, PassManager, PassOptions};

/// Parse IR text and a sampler map, then run the standard pipeline.
#[allow(dead_code)]
pub fn try_bind(
    source: &str,
    sampler_map: &str,
    options: PassOptions,
) -> Result<(Module, CompileContext), PassError> {
    let mut module = kernbind_parser::parse(source).expect("IR parse failed");
    let map = kernbind_parser::parse_sampler_map(sampler_map).expect("sampler map parse failed");
    let mut ctx = CompileContext::new(options.clone(), map);
    PassManager::standard(&options).run(&mut module, &mut ctx)?;
    Ok((module, ctx))
}

/// Like `try_bind` but panics on a pass error.
#[allow(dead_code)]
pub fn bind(source: &str, sampler_map: &str, options: PassOptions) -> (Module, CompileContext) {
    try_bind(source, sampler_map, options).expect("descriptor binding failed")
}

/// Options with the direct resource access pass enabled.
#[allow(dead_code)]
pub fn with_dra(rewrite: bool) -> PassOptions {
    PassOptions {
        direct_resource_access: true,
        rewrite_direct_access: rewrite,
        ..PassOptions::default()
    }
}

/// Constant operands of every call to `callee` inside `caller`.
#[allow(dead_code)]
pub fn call_operands(module: &Module, caller: &str, callee: &str) -> Vec<Vec<u32>> {
    let caller = &module.functions[module.function_by_name(caller).expect("no such caller")];
    let callee = module.function_by_name(callee).expect("no such callee");
    caller
        .calls()
        .iter()
        .filter(|call| call.callee == callee)
        .map(|call| {
            call.arguments
                .iter()
                .map(|&h| {
                    caller
                        .literal_value(h)
                        .and_then(|lit| lit.as_u32())
                        .expect("non-constant operand")
                })
                .collect()
        })
        .collect()
}
