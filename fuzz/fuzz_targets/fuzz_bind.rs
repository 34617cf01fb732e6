#![no_main]

use libfuzzer_sys::fuzz_target;

use kernbind_opt::{CompileContext, PassManager, PassOptions, SamplerMap};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(mut module) = kernbind_parser::parse(source) else {
        return;
    };
    // Every parsed module either binds or fails with an error, never a panic.
    let options = PassOptions {
        direct_resource_access: true,
        rewrite_direct_access: true,
        ..PassOptions::default()
    };
    let map = SamplerMap::from_pairs([(0x12, "a"), (0x14, "b")]);
    let mut ctx = CompileContext::new(options.clone(), map);
    let _ = PassManager::standard(&options).run(&mut module, &mut ctx);
});
